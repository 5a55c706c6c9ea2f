// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use grant_radar::error::ScoreError;
use grant_radar::notify::Sink;
use grant_radar::{Analysis, AnalyzedRecord, Collector, Priority, Profile, Recommendation, Record};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
}

pub fn rec(id: &str, title: &str, org: &str) -> Record {
    Record::new(id, title, org, "test", t0(), t0() + chrono::Duration::days(30))
}

pub fn analysis(score: u8, priority: Priority) -> Analysis {
    Analysis {
        score,
        recommendation: if score >= 7 {
            Recommendation::Recommend
        } else {
            Recommendation::Reject
        },
        match_reasons: vec![],
        concerns: vec![],
        key_evaluation_criteria: vec![],
        preparation_tips: vec![],
        estimated_budget: None,
        priority,
    }
}

/// Returns its records after an optional delay.
pub struct Static {
    pub records: Vec<Record>,
    pub delay: Duration,
}

#[async_trait]
impl Collector for Static {
    async fn collect(&self) -> anyhow::Result<Vec<Record>> {
        tokio::time::sleep(self.delay).await;
        Ok(self.records.clone())
    }
}

pub struct Rejecting(pub &'static str);

#[async_trait]
impl Collector for Rejecting {
    async fn collect(&self) -> anyhow::Result<Vec<Record>> {
        Err(anyhow::anyhow!("{}", self.0))
    }
}

/// Scores by title; unknown titles fail transiently. Counts calls per title.
#[derive(Default)]
pub struct TitleScorer {
    pub scores: HashMap<String, u8>,
    pub calls: Mutex<HashMap<String, u32>>,
}

impl TitleScorer {
    pub fn new(pairs: &[(&str, u8)]) -> Self {
        Self {
            scores: pairs.iter().map(|(t, s)| (t.to_string(), *s)).collect(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn calls_for(&self, title: &str) -> u32 {
        self.calls.lock().get(title).copied().unwrap_or(0)
    }
}

#[async_trait]
impl grant_radar::Scorer for TitleScorer {
    async fn score(&self, r: &Record, _p: &Profile) -> Result<Analysis, ScoreError> {
        *self.calls.lock().entry(r.title.clone()).or_default() += 1;
        match self.scores.get(&r.title) {
            Some(s) => Ok(analysis(*s, Priority::Medium)),
            None => Err(ScoreError::transient("503 service unavailable")),
        }
    }

    fn name(&self) -> &'static str {
        "title"
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub batches: Mutex<Vec<Vec<AnalyzedRecord>>>,
}

#[async_trait]
impl Sink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn append_new(&self, records: &[AnalyzedRecord]) -> anyhow::Result<usize> {
        self.batches.lock().push(records.to_vec());
        Ok(records.len())
    }
}
