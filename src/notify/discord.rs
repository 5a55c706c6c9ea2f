// src/notify/discord.rs
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::Sink;
use crate::record::{AnalyzedRecord, Priority};

/// Discord rejects messages carrying more than ten embeds.
const EMBEDS_PER_MESSAGE: usize = 10;

#[derive(Clone)]
pub struct DiscordSink {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordSink {
    pub fn new(webhook: String, client: Client) -> Self {
        Self {
            webhook,
            client,
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    /// `None` when `DISCORD_WEBHOOK_URL` is unset.
    pub fn from_env(client: Client) -> Option<Self> {
        std::env::var("DISCORD_WEBHOOK_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .map(|u| Self::new(u, client))
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    async fn post(&self, payload: &DiscordWebhookPayload) -> Result<()> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("Discord webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("Discord webhook request failed: {e}"),
            };
            if attempt >= self.max_retries {
                return Err(err);
            }
            tracing::debug!(target: "notify", attempt, error = %err, "discord retry");
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }
}

#[async_trait::async_trait]
impl Sink for DiscordSink {
    fn name(&self) -> &str {
        "discord"
    }

    async fn append_new(&self, records: &[AnalyzedRecord]) -> Result<usize> {
        let mut sent = 0;
        for chunk in records.chunks(EMBEDS_PER_MESSAGE) {
            let payload = DiscordWebhookPayload::for_records(chunk);
            self.post(&payload).await?;
            sent += chunk.len();
        }
        Ok(sent)
    }
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    color: u32,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn for_records(records: &[AnalyzedRecord]) -> Self {
        Self {
            content: None,
            embeds: records.iter().map(embed).collect(),
        }
    }
}

fn embed(r: &AnalyzedRecord) -> DiscordEmbed {
    let reasons = if r.analysis.match_reasons.is_empty() {
        "-".to_string()
    } else {
        r.analysis.match_reasons.join(" · ")
    };
    let mut description = format!(
        "**Score:** {}/10 ({})\n**Priority:** {}\n**Organization:** {}\n**Deadline:** {}\n**Reasons:** {}",
        r.analysis.score,
        r.analysis.recommendation,
        r.analysis.priority,
        r.record.organization,
        r.record.deadline.format("%Y-%m-%d"),
        reasons
    );
    if r.is_auto_analysis_failed() {
        description.push_str("\n**Automatic analysis failed, review manually.**");
    }
    DiscordEmbed {
        title: r.record.title.clone(),
        description,
        url: r.record.url.clone(),
        color: match r.analysis.priority {
            Priority::High => 0xE74C3C,
            Priority::Medium => 0xF1C40F,
            Priority::Low => 0x2ECC71,
        },
    }
}
