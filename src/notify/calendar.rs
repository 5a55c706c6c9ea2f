// src/notify/calendar.rs
//! Google Calendar sink: one all-day event on each record's deadline.
//! Events carry the record id as a private extended property; ids already on
//! the calendar inside the deadline window are skipped. A failed insert is
//! logged and counted; the remaining events still go out.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use reqwest::{Client, Url};
use serde_json::{json, Value};
use std::collections::HashSet;

use super::Sink;
use crate::record::{AnalyzedRecord, Priority};

const CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3";
const RECORD_ID_KEY: &str = "recordId";
/// Guards against a runaway `nextPageToken` loop.
const MAX_LIST_PAGES: usize = 20;

pub struct CalendarSink {
    client: Client,
    access_token: String,
    calendar_id: String,
    base_url: String,
}

impl CalendarSink {
    pub fn new(client: Client, access_token: String, calendar_id: String) -> Self {
        Self {
            client,
            access_token,
            calendar_id,
            base_url: CALENDAR_API_URL.to_string(),
        }
    }

    /// Needs `GOOGLE_ACCESS_TOKEN` and `CALENDAR_ID`.
    pub fn from_env(client: Client) -> Option<Self> {
        let token = std::env::var("GOOGLE_ACCESS_TOKEN").ok()?;
        let id = std::env::var("CALENDAR_ID").ok()?;
        Some(Self::new(client, token, id))
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn events_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).context("invalid calendar base url")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("calendar base url cannot be a base"))?
            .push("calendars")
            .push(&self.calendar_id)
            .push("events");
        Ok(url)
    }

    /// Record ids of events already on the calendar between `from` and `to`.
    async fn existing_ids(
        &self,
        url: &Url,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<HashSet<String>> {
        let mut ids = HashSet::new();
        let mut page_token: Option<String> = None;
        for _ in 0..MAX_LIST_PAGES {
            let mut list = url.clone();
            {
                let mut q = list.query_pairs_mut();
                q.append_pair("timeMin", &from.to_rfc3339())
                    .append_pair("timeMax", &to.to_rfc3339())
                    .append_pair("singleEvents", "true")
                    .append_pair("maxResults", "250");
                if let Some(t) = &page_token {
                    q.append_pair("pageToken", t);
                }
            }
            let page: Value = self
                .client
                .get(list)
                .bearer_auth(&self.access_token)
                .send()
                .await
                .context("calendar list")?
                .error_for_status()
                .context("calendar list non-2xx")?
                .json()
                .await
                .context("decoding calendar list")?;
            ids.extend(recorded_ids(&page));
            page_token = page["nextPageToken"].as_str().map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }
        Ok(ids)
    }

    async fn insert(&self, url: &Url, event: &Value) -> Result<()> {
        self.client
            .post(url.clone())
            .bearer_auth(&self.access_token)
            .json(event)
            .send()
            .await
            .context("calendar insert")?
            .error_for_status()
            .context("calendar insert non-2xx")?;
        Ok(())
    }
}

/// Days before the deadline at which an email reminder fires.
pub fn reminder_days(priority: Priority) -> &'static [i64] {
    match priority {
        Priority::High => &[14, 7, 3, 1],
        Priority::Medium => &[7, 3, 1],
        Priority::Low => &[7, 1],
    }
}

/// Google Calendar colour ids: red, yellow, green.
pub fn color_id(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "11",
        Priority::Medium => "5",
        Priority::Low => "10",
    }
}

fn describe(r: &AnalyzedRecord) -> String {
    let a = &r.analysis;
    let mut parts = vec![
        format!("Score: {}/10 ({})", a.score, a.recommendation),
        format!("Priority: {}", a.priority),
        String::new(),
        format!("Organization: {}", r.record.organization),
    ];
    if let Some(c) = &r.record.category {
        parts.push(format!("Category: {c}"));
    }
    if let Some(t) = &r.record.target_audience {
        parts.push(format!("Target: {t}"));
    }
    if let Some(b) = &a.estimated_budget {
        parts.push(format!("Estimated budget: {b}"));
    }
    if !a.match_reasons.is_empty() {
        parts.push(String::new());
        parts.push("Why it matches:".into());
        parts.extend(a.match_reasons.iter().map(|m| format!("  • {m}")));
    }
    if !a.preparation_tips.is_empty() {
        parts.push(String::new());
        parts.push("Preparation:".into());
        parts.extend(a.preparation_tips.iter().map(|t| format!("  • {t}")));
    }
    if let Some(url) = &r.record.url {
        parts.push(String::new());
        parts.push(url.clone());
    }
    parts.join("\n")
}

pub(crate) fn event_for(r: &AnalyzedRecord) -> Value {
    let day = r.record.deadline.with_timezone(&super::kst()).date_naive();
    let overrides: Vec<Value> = reminder_days(r.analysis.priority)
        .iter()
        .map(|d| json!({ "method": "email", "minutes": d * 24 * 60 }))
        .collect();
    let mut event = json!({
        "summary": format!("📌 {}", r.record.title),
        "description": describe(r),
        "start": { "date": day.to_string(), "timeZone": "Asia/Seoul" },
        "end": { "date": (day + Duration::days(1)).to_string(), "timeZone": "Asia/Seoul" },
        "reminders": { "useDefault": false, "overrides": overrides },
        "colorId": color_id(r.analysis.priority),
    });
    event["extendedProperties"] = json!({ "private": { RECORD_ID_KEY: r.record.id } });
    if let Some(url) = &r.record.url {
        event["source"] = json!({ "title": r.record.organization, "url": url });
    }
    event
}

/// Record ids tagged on the events of one `events.list` page.
pub(crate) fn recorded_ids(page: &Value) -> impl Iterator<Item = String> + '_ {
    page["items"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|e| e["extendedProperties"]["private"][RECORD_ID_KEY].as_str())
        .map(str::to_string)
}

/// Records whose id is not already on the calendar, in input order.
pub(crate) fn unseen<'a>(
    records: &'a [AnalyzedRecord],
    existing: &HashSet<String>,
) -> Vec<&'a AnalyzedRecord> {
    records
        .iter()
        .filter(|r| !existing.contains(&r.record.id))
        .collect()
}

/// Listing window covering every record's all-day event.
fn deadline_window(records: &[AnalyzedRecord]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let min = records.iter().map(|r| r.record.deadline).min()?;
    let max = records.iter().map(|r| r.record.deadline).max()?;
    Some((min - Duration::days(1), max + Duration::days(2)))
}

#[async_trait::async_trait]
impl Sink for CalendarSink {
    fn name(&self) -> &str {
        "calendar"
    }

    async fn append_new(&self, records: &[AnalyzedRecord]) -> Result<usize> {
        let Some((from, to)) = deadline_window(records) else {
            return Ok(0);
        };
        let url = &self.events_url()?;
        let existing = self.existing_ids(url, from, to).await?;
        let fresh = unseen(records, &existing);
        if fresh.is_empty() {
            tracing::info!(target: "notify", "calendar: no new events");
            return Ok(0);
        }

        let results = futures::future::join_all(
            fresh
                .iter()
                .map(|r| async move { (*r, self.insert(url, &event_for(r)).await) }),
        )
        .await;

        let mut added = 0;
        let mut last_err = None;
        for (r, res) in results {
            match res {
                Ok(()) => added += 1,
                Err(e) => {
                    counter!("sync_calendar_event_errors_total").increment(1);
                    tracing::warn!(
                        target: "notify",
                        record = %crate::analyze::record_tag(&r.record),
                        error = %format!("{e:#}"),
                        "calendar event failed"
                    );
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) if added == 0 => Err(e.context("every calendar event failed")),
            _ => Ok(added),
        }
    }
}
