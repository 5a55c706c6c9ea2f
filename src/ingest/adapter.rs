// src/ingest/adapter.rs
//! Adapters from loosely-typed source payloads to [`Record`].
//!
//! Most sources only know a title, an organization and some date strings in
//! whatever format the board prints. [`RawProgram`] is that lowest common
//! denominator; [`RawProgram::into_record`] fills the gaps.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::normalize_text;
use super::types::Collector;
use crate::record::{Record, Source};

/// Days added to "now" when a source publishes no deadline.
pub const DEFAULT_DEADLINE_DAYS: i64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProgram {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, alias = "agency")]
    pub organization: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "target")]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "description")]
    pub memo: Option<String>,
    #[serde(default)]
    pub raw_data: Option<serde_json::Value>,
}

impl RawProgram {
    /// Convert into a record. Returns `None` when the title is empty after
    /// normalization.
    pub fn into_record(self, source: &Source, now: DateTime<Utc>) -> Option<Record> {
        let title = normalize_text(&self.title);
        if title.is_empty() {
            return None;
        }
        let organization = self
            .organization
            .as_deref()
            .map(normalize_text)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| source.to_string());

        let deadline = self
            .deadline
            .as_deref()
            .and_then(parse_date)
            .unwrap_or_else(|| now + Duration::days(DEFAULT_DEADLINE_DAYS));
        let start_date = self.start_date.as_deref().and_then(parse_date).unwrap_or(now);

        let id = self
            .id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| generated_id(source, &title, &organization));

        Some(Record {
            id,
            title,
            organization,
            category: non_empty(self.category),
            target_audience: non_empty(self.target_audience),
            deadline,
            start_date,
            source: source.clone(),
            url: non_empty(self.url),
            memo: self.memo.as_deref().map(normalize_text).filter(|s| !s.is_empty()),
            raw_data: self.raw_data,
        })
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Stable id for sources that do not assign one.
pub fn generated_id(source: &Source, title: &str, organization: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(title.as_bytes());
    hasher.update([0u8]);
    hasher.update(organization.as_bytes());
    let digest = hasher.finalize();
    let mut out = format!("{source}-");
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Parse the date formats Korean and international boards commonly print.
/// Values without an offset are taken as UTC; date-only values as midnight.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    // Anything else with a trailing weekday or note: keep the date part.
    let head = s.split_whitespace().next().unwrap_or(s).trim_end_matches('.');
    for fmt in ["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d", "%Y%m%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(head, fmt) {
            let midnight = d.and_hms_opt(0, 0, 0)?;
            return Some(Utc.from_utc_datetime(&midnight));
        }
    }
    None
}

/// A source that yields loosely-typed programs rather than records.
#[async_trait::async_trait]
pub trait ProgramSource: Send + Sync {
    async fn fetch_programs(&self) -> Result<Vec<RawProgram>>;
}

/// Exposes any [`ProgramSource`] as a [`Collector`].
pub struct ProgramCollectorAdapter<P> {
    source: Source,
    inner: P,
}

impl<P: ProgramSource> ProgramCollectorAdapter<P> {
    pub fn new(source: impl Into<Source>, inner: P) -> Self {
        Self {
            source: source.into(),
            inner,
        }
    }
}

#[async_trait::async_trait]
impl<P: ProgramSource> Collector for ProgramCollectorAdapter<P> {
    async fn collect(&self) -> Result<Vec<Record>> {
        let programs = self.inner.fetch_programs().await?;
        let now = Utc::now();
        let total = programs.len();
        let records: Vec<Record> = programs
            .into_iter()
            .filter_map(|p| p.into_record(&self.source, now))
            .collect();
        if records.len() < total {
            tracing::debug!(
                target: "ingest",
                source = %self.source,
                skipped = total - records.len(),
                "programs without a title skipped"
            );
        }
        Ok(records)
    }
}
