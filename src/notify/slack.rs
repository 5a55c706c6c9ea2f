// src/notify/slack.rs
use anyhow::{Context, Result};
use reqwest::Client;

use super::{Sink, Summary};
use crate::record::AnalyzedRecord;

/// Records listed per message; the rest is summarized as a count.
const MAX_LINES: usize = 15;

pub struct SlackSink {
    webhook_url: String,
    client: Client,
}

impl SlackSink {
    /// `None` when `SLACK_WEBHOOK_URL` is unset.
    pub fn from_env(client: Client) -> Option<Self> {
        let url = std::env::var("SLACK_WEBHOOK_URL").ok()?;
        if url.trim().is_empty() {
            tracing::debug!(target: "notify", "Slack disabled (empty SLACK_WEBHOOK_URL)");
            return None;
        }
        Some(Self::new(url, client))
    }

    pub fn new(webhook_url: String, client: Client) -> Self {
        Self {
            webhook_url,
            client,
        }
    }
}

pub(crate) fn render(records: &[AnalyzedRecord]) -> String {
    let s = Summary::new(records);
    let mut text = format!(
        "*{} new announcements* (recommended {}, HIGH priority {})\n",
        records.len(),
        s.recommended,
        s.high_priority
    );
    for r in s.by_score.iter().take(MAX_LINES) {
        let line = Summary::line(r);
        match &r.record.url {
            Some(url) => text.push_str(&format!("• <{url}|{line}>\n")),
            None => text.push_str(&format!("• {line}\n")),
        }
    }
    if records.len() > MAX_LINES {
        text.push_str(&format!("…and {} more\n", records.len() - MAX_LINES));
    }
    text
}

#[async_trait::async_trait]
impl Sink for SlackSink {
    fn name(&self) -> &str {
        "slack"
    }

    async fn append_new(&self, records: &[AnalyzedRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let body = serde_json::json!({ "text": render(records) });
        self.client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::test_support::analyzed;
    use crate::record::Priority;

    #[test]
    fn render_lists_best_first_and_truncates() {
        let mut recs: Vec<_> = (0..20)
            .map(|i| analyzed(&format!("r{i}"), 7, Priority::Medium))
            .collect();
        recs.push(analyzed("top", 10, Priority::High));
        let text = render(&recs);
        assert!(text.starts_with("*21 new announcements* (recommended 21, HIGH priority 1)"));
        let first_item = text.lines().nth(1).unwrap();
        assert!(first_item.contains("공고 top"));
        assert!(first_item.contains("<https://example.invalid/top|"));
        assert!(text.ends_with("…and 6 more\n"));
    }
}
