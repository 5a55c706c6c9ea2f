// src/ingest/providers/fixture.rs
//! In-memory collectors: the dev-mode stand-in for real boards, and a
//! collector that always fails for exercising partial-failure paths.

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};

use crate::ingest::types::Collector;
use crate::record::Record;

pub struct FixtureCollector {
    records: Vec<Record>,
}

impl FixtureCollector {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// A handful of plausible announcements relative to now, used when the
    /// binary runs with `GRANT_RADAR_ENV=dev`.
    pub fn sample() -> Self {
        let now = Utc::now();
        let mk = |id: &str, title: &str, org: &str, days: i64| {
            let mut r = Record::new(id, title, org, "mock", now, now + Duration::days(days));
            r.category = Some("창업지원".into());
            r.target_audience = Some("예비창업자, 초기창업자".into());
            r.url = Some(format!("https://example.invalid/{id}"));
            r
        };
        Self::new(vec![
            mk("mock-1", "2025 초기창업패키지 모집", "창업진흥원", 14),
            mk("mock-2", "AI 바우처 지원사업", "정보통신산업진흥원", 21),
            mk("mock-3", "지역 스타트업 육성 프로그램", "서울경제진흥원", 7),
            mk("mock-4", "글로벌 액셀러레이팅 참가기업 모집", "중소벤처기업부", 30),
        ])
    }
}

#[async_trait::async_trait]
impl Collector for FixtureCollector {
    async fn collect(&self) -> Result<Vec<Record>> {
        Ok(self.records.clone())
    }
}

pub struct FailingCollector {
    reason: String,
}

impl FailingCollector {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait::async_trait]
impl Collector for FailingCollector {
    async fn collect(&self) -> Result<Vec<Record>> {
        Err(anyhow!("{}", self.reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sample_has_future_deadlines() {
        let recs = FixtureCollector::sample().collect().await.unwrap();
        assert_eq!(recs.len(), 4);
        assert!(recs.iter().all(|r| r.deadline > r.start_date));
    }

    #[tokio::test]
    async fn failing_reports_reason() {
        let err = FailingCollector::new("HTTP 503").collect().await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 503");
    }
}
