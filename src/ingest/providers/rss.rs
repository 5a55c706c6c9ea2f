// src/ingest/providers/rss.rs
//! RSS board collector. Many public agencies publish their announcement list
//! as a plain RSS 2.0 feed; title, link, pubDate and description are all we use.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::adapter::{generated_id, parse_date, DEFAULT_DEADLINE_DAYS};
use crate::ingest::normalize_text;
use crate::ingest::types::Collector;
use crate::record::{Record, Source};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    author: Option<String>,
    category: Option<String>,
}

pub struct RssCollector {
    source: Source,
    organization: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssCollector {
    /// Parse a fixed document instead of fetching.
    pub fn from_fixture_str(source: impl Into<Source>, organization: impl Into<String>, s: &str) -> Self {
        Self {
            source: source.into(),
            organization: organization.into(),
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_url(
        source: impl Into<Source>,
        organization: impl Into<String>,
        url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            source: source.into(),
            organization: organization.into(),
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        }
    }

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<Record>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing rss from {}", self.source))?;

        let now = Utc::now();
        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let title = normalize_text(it.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }
            let organization = it
                .author
                .as_deref()
                .map(normalize_text)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| self.organization.clone());
            let start_date = it.pub_date.as_deref().and_then(parse_date).unwrap_or(now);
            let id = it
                .link
                .clone()
                .filter(|l| !l.trim().is_empty())
                .map(|l| format!("{}-{}", self.source, l.trim()))
                .unwrap_or_else(|| generated_id(&self.source, &title, &organization));

            let mut rec = Record::new(
                id,
                title,
                organization,
                self.source.clone(),
                start_date,
                // Feeds carry no deadline; treat as open for the default window.
                start_date.max(now) + Duration::days(DEFAULT_DEADLINE_DAYS),
            );
            rec.url = it.link;
            rec.category = it.category.map(|c| normalize_text(&c)).filter(|c| !c.is_empty());
            rec.memo = it
                .description
                .as_deref()
                .map(normalize_text)
                .filter(|s| !s.is_empty());
            out.push(rec);
        }

        histogram!("collect_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(out)
    }
}

#[async_trait]
impl Collector for RssCollector {
    async fn collect(&self) -> Result<Vec<Record>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s),
            Mode::Http { url, client } => {
                let body = client
                    .get(url.as_str())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .with_context(|| format!("{} http get()", self.source))?
                    .text()
                    .await
                    .with_context(|| format!("{} http .text()", self.source))?;
                self.parse_items_from_str(&body)
            }
        }
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&middot;", "·")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
