// src/notify/sheets.rs
//! Google Sheets sink: one row per record on a fixed 16-column layout.
//! Column B holds the record id and is what "already synced" is checked against.

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;

use super::Sink;
use crate::record::AnalyzedRecord;

const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
pub const DEFAULT_SHEET_NAME: &str = "공고목록";

pub const HEADER: [&str; 16] = [
    "분석일시",
    "공고ID",
    "공고명",
    "기관",
    "카테고리",
    "대상",
    "마감일",
    "적합도 점수",
    "추천도",
    "우선순위",
    "예상 지원금",
    "매칭 이유",
    "준비 팁",
    "주의사항",
    "공고 URL",
    "비고",
];

pub struct SheetsSink {
    client: Client,
    access_token: String,
    spreadsheet_id: String,
    sheet: String,
    base_url: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl SheetsSink {
    pub fn new(client: Client, access_token: String, spreadsheet_id: String) -> Self {
        Self {
            client,
            access_token,
            spreadsheet_id,
            sheet: DEFAULT_SHEET_NAME.to_string(),
            base_url: SHEETS_API_URL.to_string(),
        }
    }

    /// Needs `GOOGLE_ACCESS_TOKEN` and `SHEETS_SPREADSHEET_ID`; `SHEETS_SHEET_NAME`
    /// is optional.
    pub fn from_env(client: Client) -> Option<Self> {
        let token = std::env::var("GOOGLE_ACCESS_TOKEN").ok()?;
        let id = std::env::var("SHEETS_SPREADSHEET_ID").ok()?;
        let mut s = Self::new(client, token, id);
        if let Ok(name) = std::env::var("SHEETS_SHEET_NAME") {
            s.sheet = name;
        }
        Some(s)
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn values_url(&self, range: &str, suffix: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).context("invalid sheets base url")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("sheets base url cannot be a base"))?
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&format!("{range}{suffix}"));
        Ok(url)
    }

    async fn get_range(&self, range: &str) -> Result<Vec<Vec<Value>>> {
        let url = self.values_url(range, "")?;
        let vr: ValueRange = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("sheets get")?
            .error_for_status()
            .context("sheets get non-2xx")?
            .json()
            .await
            .context("sheets get body")?;
        Ok(vr.values)
    }

    async fn ensure_header(&self) -> Result<()> {
        let range = format!("{}!A1:P1", self.sheet);
        if !self.get_range(&range).await?.is_empty() {
            return Ok(());
        }
        let mut url = self.values_url(&range, "")?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        self.client
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "values": [HEADER] }))
            .send()
            .await
            .context("sheets header")?
            .error_for_status()
            .context("sheets header non-2xx")?;
        tracing::info!(target: "notify", sheet = %self.sheet, "sheet header written");
        Ok(())
    }

    async fn existing_ids(&self) -> Result<HashSet<String>> {
        let rows = self.get_range(&format!("{}!B:B", self.sheet)).await?;
        Ok(rows
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect())
    }
}

pub(crate) fn row_for(r: &AnalyzedRecord) -> Vec<Value> {
    let kst = super::kst();
    let a = &r.analysis;
    vec![
        json!(r.analyzed_at.with_timezone(&kst).format("%Y-%m-%d %H:%M").to_string()),
        json!(r.record.id),
        json!(r.record.title),
        json!(r.record.organization),
        json!(r.record.category.clone().unwrap_or_default()),
        json!(r.record.target_audience.clone().unwrap_or_default()),
        json!(r.record.deadline.with_timezone(&kst).format("%Y-%m-%d").to_string()),
        json!(a.score),
        json!(a.recommendation.to_string()),
        json!(a.priority.to_string()),
        json!(a.estimated_budget.clone().unwrap_or_default()),
        json!(a.match_reasons.join("\n")),
        json!(a.preparation_tips.join("\n")),
        json!(a.concerns.join("\n")),
        json!(r.record.url.clone().unwrap_or_default()),
        json!(r.analysis_error.clone().or_else(|| r.record.memo.clone()).unwrap_or_default()),
    ]
}

#[async_trait::async_trait]
impl Sink for SheetsSink {
    fn name(&self) -> &str {
        "sheets"
    }

    async fn append_new(&self, records: &[AnalyzedRecord]) -> Result<usize> {
        self.ensure_header().await?;
        let existing = self.existing_ids().await?;
        let rows: Vec<Vec<Value>> = records
            .iter()
            .filter(|r| !existing.contains(&r.record.id))
            .map(row_for)
            .collect();
        if rows.is_empty() {
            tracing::info!(target: "notify", "sheets: no new rows");
            return Ok(0);
        }

        let mut url = self.values_url(&format!("{}!A:P", self.sheet), ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        self.client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "values": rows }))
            .send()
            .await
            .context("sheets append")?
            .error_for_status()
            .context("sheets append non-2xx")?;
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::test_support::analyzed;
    use crate::record::Priority;

    #[test]
    fn row_matches_header() {
        let r = analyzed("bizinfo-1", 8, Priority::High);
        let row = row_for(&r);
        assert_eq!(row.len(), HEADER.len());
        assert_eq!(row[1], "bizinfo-1");
        assert_eq!(row[6], "2025-03-31");
        assert_eq!(row[7], 8);
        assert_eq!(row[9], "HIGH");
        assert_eq!(row[11], "AI\n초기");
    }

    #[test]
    fn degraded_rows_carry_the_error() {
        let r = analyzed("x", 8, Priority::High);
        let d = AnalyzedRecord::degraded(r.record, "timeout".into(), r.analyzed_at);
        assert_eq!(row_for(&d)[15], "timeout");
    }

    #[test]
    fn urls_are_escaped() {
        let s = SheetsSink::new(Client::new(), "t".into(), "sheet123".into())
            .with_base_url("https://sheets.example/v4/spreadsheets/");
        let url = s.values_url("공고목록!A:P", ":append").unwrap();
        assert!(url.as_str().starts_with("https://sheets.example/v4/spreadsheets/sheet123/values/"));
        assert!(url.as_str().ends_with(":append"));
        assert!(!url.as_str().contains("공고"));
    }
}
