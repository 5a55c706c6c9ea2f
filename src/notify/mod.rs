// src/notify/mod.rs
//! Downstream sinks and the dispatcher that fans records out to them.
//!
//! Detecting which records a sink has already seen is the sink's job; the
//! dispatcher only filters by score and isolates sink failures from each other.

pub mod calendar;
pub mod discord;
pub mod email;
pub mod sheets;
pub mod slack;

use anyhow::Result;
use chrono::{FixedOffset, Offset, Utc};
use futures::future::join_all;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::record::{AnalyzedRecord, Priority, Recommendation};

pub use calendar::CalendarSink;
pub use discord::DiscordSink;
pub use email::EmailSink;
pub use sheets::SheetsSink;
pub use slack::SlackSink;

#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    /// Append records the sink has not seen yet. Returns how many were sent.
    async fn append_new(&self, records: &[AnalyzedRecord]) -> Result<usize>;
}

pub type DynSink = Arc<dyn Sink>;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("sync_records_total", "Records handed to sinks after filtering.");
        describe_counter!("sync_sink_errors_total", "Sink calls that failed.");
        describe_counter!(
            "sync_calendar_event_errors_total",
            "Calendar events that could not be inserted."
        );
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SinkOutcome {
    Ok { sent: usize },
    /// Nothing passed the filter, so the sink was not called.
    Skipped,
    Failed { error: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub dispatched: usize,
    pub filtered_out: usize,
    /// One entry per sink, in registration order.
    pub sinks: Vec<(String, SinkOutcome)>,
}

impl SyncReport {
    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.sinks
            .iter()
            .filter(|(_, o)| matches!(o, SinkOutcome::Failed { .. }))
            .map(|(n, _)| n.as_str())
    }
}

pub struct SyncDispatcher {
    sinks: Vec<DynSink>,
    min_score: u8,
}

impl SyncDispatcher {
    pub fn new(min_score: u8) -> Self {
        Self {
            sinks: Vec::new(),
            min_score,
        }
    }

    pub fn with_sink(mut self, sink: DynSink) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Every sink whose environment is configured. Missing variables disable
    /// a sink; a half-configured sink is an error.
    pub fn from_env(min_score: u8) -> Result<Self> {
        let client = reqwest::Client::new();
        let mut d = Self::new(min_score);
        if let Some(s) = SheetsSink::from_env(client.clone()) {
            d = d.with_sink(Arc::new(s));
        }
        if let Some(s) = CalendarSink::from_env(client.clone()) {
            d = d.with_sink(Arc::new(s));
        }
        if let Some(s) = SlackSink::from_env(client.clone()) {
            d = d.with_sink(Arc::new(s));
        }
        if let Some(s) = DiscordSink::from_env(client) {
            d = d.with_sink(Arc::new(s));
        }
        if let Some(s) = EmailSink::from_env()? {
            d = d.with_sink(Arc::new(s));
        }
        let names: Vec<&str> = d.sinks.iter().map(|s| s.name()).collect();
        info!(target: "notify", sinks = ?names, "sinks configured");
        Ok(d)
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Re-apply the score threshold, then call every sink concurrently.
    /// One sink failing never stops the others.
    pub async fn sync(&self, records: &[AnalyzedRecord]) -> SyncReport {
        ensure_metrics_described();
        let passing: Vec<AnalyzedRecord> = records
            .iter()
            .filter(|r| r.passes_threshold(self.min_score))
            .cloned()
            .collect();
        let mut report = SyncReport {
            dispatched: passing.len(),
            filtered_out: records.len() - passing.len(),
            sinks: Vec::with_capacity(self.sinks.len()),
        };

        if passing.is_empty() {
            report.sinks = self
                .sinks
                .iter()
                .map(|s| (s.name().to_string(), SinkOutcome::Skipped))
                .collect();
            info!(target: "notify", filtered_out = report.filtered_out, "nothing to sync");
            return report;
        }
        counter!("sync_records_total").increment(passing.len() as u64);

        let passing = &passing;
        let calls = self.sinks.iter().map(|sink| async move {
            let outcome = match sink.append_new(passing).await {
                Ok(sent) => {
                    info!(target: "notify", sink = sink.name(), sent, "sink synced");
                    SinkOutcome::Ok { sent }
                }
                Err(e) => {
                    counter!("sync_sink_errors_total").increment(1);
                    warn!(target: "notify", sink = sink.name(), error = %format!("{e:#}"), "sink failed");
                    SinkOutcome::Failed {
                        error: format!("{e:#}"),
                    }
                }
            };
            (sink.name().to_string(), outcome)
        });
        report.sinks = join_all(calls).await;
        report
    }
}

/// Korea Standard Time; every source board publishes dates in it.
pub(crate) fn kst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap_or_else(|| Utc.fix())
}

/// Records sorted by score (highest first) with the summary counts the
/// chat and mail sinks print.
pub(crate) struct Summary<'a> {
    pub by_score: Vec<&'a AnalyzedRecord>,
    pub high_priority: usize,
    pub recommended: usize,
    pub needs_review: usize,
}

impl<'a> Summary<'a> {
    pub fn new(records: &'a [AnalyzedRecord]) -> Self {
        let mut by_score: Vec<&AnalyzedRecord> = records.iter().collect();
        by_score.sort_by(|a, b| b.analysis.score.cmp(&a.analysis.score));
        Self {
            high_priority: records
                .iter()
                .filter(|r| r.analysis.priority == Priority::High)
                .count(),
            recommended: records
                .iter()
                .filter(|r| r.analysis.recommendation.is_positive())
                .count(),
            needs_review: records
                .iter()
                .filter(|r| {
                    r.is_auto_analysis_failed() || r.analysis.recommendation == Recommendation::Review
                })
                .count(),
            by_score,
        }
    }

    /// One line per record: `[8/10 HIGH] Title (Org, due 2025-03-31)`.
    pub fn line(r: &AnalyzedRecord) -> String {
        let flag = if r.is_auto_analysis_failed() { " (needs manual review)" } else { "" };
        format!(
            "[{}/10 {}] {} ({}, due {}){}",
            r.analysis.score,
            r.analysis.priority,
            r.record.title,
            r.record.organization,
            r.record.deadline.format("%Y-%m-%d"),
            flag
        )
    }
}
