// src/record.rs
//! Normalized announcement records and the analysis attached to them.
//!
//! All timestamps are `DateTime<Utc>` so deadline/start ordering never has to
//! think about time zones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the collector that produced a record (e.g. `"bizinfo"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Source(String);

impl Source {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Source {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A normalized announcement, immutable once a collector has produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub title: String,
    pub organization: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub target_audience: Option<String>,
    pub deadline: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub source: Source,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    /// Source-specific payload. Never inspected, only carried along.
    #[serde(default)]
    pub raw_data: Option<serde_json::Value>,
}

impl Record {
    /// Minimal record with the required fields; optional fields start empty.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        organization: impl Into<String>,
        source: impl Into<Source>,
        start_date: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            organization: organization.into(),
            category: None,
            target_audience: None,
            deadline,
            start_date,
            source: source.into(),
            url: None,
            memo: None,
            raw_data: None,
        }
    }

    /// Natural key used for deduplication: trimmed title and organization,
    /// compared case-sensitively.
    pub fn dedup_key(&self) -> (&str, &str) {
        (self.title.trim(), self.organization.trim())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Strong,
    Recommend,
    Review,
    Reject,
}

impl Recommendation {
    /// Accepts the English labels and the Korean labels used by the prompt.
    pub fn parse_label(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STRONG" | "STRONG_RECOMMEND" | "강력추천" => Some(Self::Strong),
            "RECOMMEND" | "RECOMMENDED" | "추천" => Some(Self::Recommend),
            "REVIEW" | "검토필요" | "검토" => Some(Self::Review),
            "REJECT" | "NOT_RECOMMENDED" | "비추천" => Some(Self::Reject),
            _ => None,
        }
    }

    pub fn is_positive(self) -> bool {
        matches!(self, Self::Strong | Self::Recommend)
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Strong => "STRONG",
            Self::Recommend => "RECOMMEND",
            Self::Review => "REVIEW",
            Self::Reject => "REJECT",
        };
        f.write_str(s)
    }
}

/// Urgency tier. Declaration order is the ranking order: `High < Medium < Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn parse_label(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" | "높음" => Some(Self::High),
            "MEDIUM" | "MID" | "보통" => Some(Self::Medium),
            "LOW" | "낮음" => Some(Self::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        };
        f.write_str(s)
    }
}

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;

/// Scoring output. `score` and `priority` are set independently by the scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub score: u8,
    pub recommendation: Recommendation,
    #[serde(default)]
    pub match_reasons: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub key_evaluation_criteria: Vec<String>,
    #[serde(default)]
    pub preparation_tips: Vec<String>,
    #[serde(default)]
    pub estimated_budget: Option<String>,
    pub priority: Priority,
}

impl Analysis {
    pub const FALLBACK_SCORE: u8 = 5;

    /// Neutral analysis used when scoring could not be completed.
    pub fn fallback(reason: &str) -> Self {
        Self {
            score: Self::FALLBACK_SCORE,
            recommendation: Recommendation::Review,
            match_reasons: Vec::new(),
            concerns: vec![format!("Automatic analysis failed: {reason}")],
            key_evaluation_criteria: Vec::new(),
            preparation_tips: vec!["Review this announcement manually.".to_string()],
            estimated_budget: None,
            priority: Priority::Medium,
        }
    }
}

/// A record plus its analysis. Terminal data: sinks only read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedRecord {
    #[serde(flatten)]
    pub record: Record,
    pub analysis: Analysis,
    pub analyzed_at: DateTime<Utc>,
    /// Set when every scoring attempt failed and `analysis` is the fallback.
    #[serde(default)]
    pub analysis_error: Option<String>,
}

impl AnalyzedRecord {
    pub fn scored(record: Record, analysis: Analysis, analyzed_at: DateTime<Utc>) -> Self {
        Self {
            record,
            analysis,
            analyzed_at,
            analysis_error: None,
        }
    }

    pub fn degraded(record: Record, error: String, analyzed_at: DateTime<Utc>) -> Self {
        Self {
            record,
            analysis: Analysis::fallback(&error),
            analyzed_at,
            analysis_error: Some(error),
        }
    }

    pub fn is_auto_analysis_failed(&self) -> bool {
        self.analysis_error.is_some()
    }

    /// Shared admission rule for analyzer output and sink dispatch.
    pub fn passes_threshold(&self, min_score: u8) -> bool {
        self.is_auto_analysis_failed() || self.analysis.score >= min_score
    }
}

/// Target profile the scorer evaluates each record against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub exclusions: Vec<String>,
}
