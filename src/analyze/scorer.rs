// src/analyze/scorer.rs
//! Scoring collaborator: rates one record against the target profile.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ai::ScorerConfig;
use crate::error::ScoreError;
use crate::record::{Analysis, Priority, Profile, Recommendation, Record, MAX_SCORE, MIN_SCORE};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, record: &Record, profile: &Profile) -> Result<Analysis, ScoreError>;

    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynScorer = Arc<dyn Scorer>;

/// Build the scorer described by `config/ai.json`.
pub fn build_scorer(cfg: &ScorerConfig) -> anyhow::Result<DynScorer> {
    if !cfg.enabled {
        tracing::warn!(target: "analyze", "scorer disabled; every record will be flagged for review");
        return Ok(Arc::new(DisabledScorer));
    }
    Ok(Arc::new(ClaudeScorer::new(cfg)?))
}

/// Fails every call fatally, so each record degrades to the flagged fallback.
pub struct DisabledScorer;

#[async_trait]
impl Scorer for DisabledScorer {
    async fn score(&self, _record: &Record, _profile: &Profile) -> Result<Analysis, ScoreError> {
        Err(ScoreError::fatal("scorer disabled in config"))
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

pub struct ClaudeScorer {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct Resp {
    content: Vec<Block>,
}

#[derive(Deserialize)]
struct Block {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

const SYSTEM_PROMPT: &str = "You evaluate public funding and procurement announcements for one applicant. \
Reply with a single JSON object and nothing else.";

impl ClaudeScorer {
    pub fn new(cfg: &ScorerConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("grant-radar/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building scorer http client")?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            base_url: cfg
                .base_url
                .clone()
                .unwrap_or_else(|| ANTHROPIC_API_URL.to_string()),
        })
    }

    fn headers(&self) -> Result<HeaderMap, ScoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key).map_err(|e| ScoreError::Fatal(e.into()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl Scorer for ClaudeScorer {
    async fn score(&self, record: &Record, profile: &Profile) -> Result<Analysis, ScoreError> {
        let prompt = build_prompt(record, profile);
        let req = Req {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: SYSTEM_PROMPT,
            messages: vec![Msg {
                role: "user",
                content: &prompt,
            }],
            temperature: 0.2,
        };

        let resp = self
            .http
            .post(format!("{}/messages", self.base_url))
            .headers(self.headers()?)
            .json(&req)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| ScoreError::Transient(anyhow!(e).context("decoding messages response")))?;
        let text: String = body
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");
        parse_analysis(&text)
    }

    fn name(&self) -> &'static str {
        "claude"
    }
}

fn classify_transport(e: reqwest::Error) -> ScoreError {
    if e.is_builder() {
        ScoreError::Fatal(e.into())
    } else {
        // Timeouts, connection resets and DNS hiccups are all worth another try.
        ScoreError::Transient(e.into())
    }
}

pub(crate) fn classify_status(status: u16, body: &str) -> ScoreError {
    let snippet: String = body.chars().take(200).collect();
    let err = anyhow!("scoring api returned {status}: {snippet}");
    match status {
        408 | 429 | 500..=599 => ScoreError::Transient(err),
        _ => ScoreError::Fatal(err),
    }
}

pub(crate) fn build_prompt(record: &Record, profile: &Profile) -> String {
    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    let list = |v: &[String]| if v.is_empty() { "-".to_string() } else { v.join(", ") };
    format!(
        "## Applicant\n\
         name: {name}\n\
         description: {desc}\n\
         industry: {industry}\n\
         stage: {stage}\n\
         region: {region}\n\
         strengths: {strengths}\n\
         interests: {interests}\n\
         exclusions: {exclusions}\n\n\
         ## Announcement\n\
         title: {title}\n\
         organization: {org}\n\
         category: {category}\n\
         target audience: {target}\n\
         deadline: {deadline}\n\
         details: {memo}\n\n\
         ## Task\n\
         Rate how well the announcement fits the applicant. Return JSON with keys:\n\
         score (integer 1-10), recommendation (STRONG | RECOMMEND | REVIEW | REJECT), \
         matchReasons (string[]), concerns (string[]), keyEvaluationCriteria (string[]), \
         preparationTips (string[]), estimatedBudget (string or null), \
         priority (HIGH | MEDIUM | LOW, by deadline urgency and fit).",
        name = profile.name,
        desc = profile.description,
        industry = opt(&profile.industry),
        stage = opt(&profile.stage),
        region = opt(&profile.region),
        strengths = list(profile.strengths.as_slice()),
        interests = list(profile.interests.as_slice()),
        exclusions = list(profile.exclusions.as_slice()),
        title = record.title,
        org = record.organization,
        category = opt(&record.category),
        target = opt(&record.target_audience),
        deadline = record.deadline.format("%Y-%m-%d"),
        memo = opt(&record.memo),
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    score: serde_json::Value,
    #[serde(default)]
    recommendation: Option<String>,
    #[serde(default)]
    match_reasons: Vec<String>,
    #[serde(default)]
    concerns: Vec<String>,
    #[serde(default)]
    key_evaluation_criteria: Vec<String>,
    #[serde(default)]
    preparation_tips: Vec<String>,
    #[serde(default)]
    estimated_budget: Option<String>,
    #[serde(default)]
    priority: Option<String>,
}

/// Pull the JSON object out of a model reply (code fences and prose around
/// it are tolerated) and turn it into an [`Analysis`].
pub fn parse_analysis(text: &str) -> Result<Analysis, ScoreError> {
    let mut first_err = None;
    let mut raw = None;
    for (i, _) in text.match_indices('{') {
        // Reads one object and ignores whatever follows it.
        match serde_json::Deserializer::from_str(&text[i..])
            .into_iter::<RawAnalysis>()
            .next()
        {
            Some(Ok(parsed)) => {
                raw = Some(parsed);
                break;
            }
            Some(Err(e)) => {
                first_err.get_or_insert(e);
            }
            None => {}
        }
    }
    let raw = match (raw, first_err) {
        (Some(raw), _) => raw,
        (None, Some(e)) => {
            return Err(ScoreError::Transient(anyhow!(e).context("parsing scorer JSON")))
        }
        (None, None) => return Err(ScoreError::transient("no JSON object in scorer reply")),
    };

    let score = match &raw.score {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite())
    .ok_or_else(|| ScoreError::transient("score missing or not a number"))?;
    let score = score.round().clamp(MIN_SCORE as f64, MAX_SCORE as f64) as u8;

    let recommendation = raw
        .recommendation
        .as_deref()
        .and_then(Recommendation::parse_label)
        .unwrap_or_else(|| recommendation_for(score));
    let priority = raw
        .priority
        .as_deref()
        .and_then(Priority::parse_label)
        .unwrap_or(Priority::Medium);

    Ok(Analysis {
        score,
        recommendation,
        match_reasons: raw.match_reasons,
        concerns: raw.concerns,
        key_evaluation_criteria: raw.key_evaluation_criteria,
        preparation_tips: raw.preparation_tips,
        estimated_budget: raw.estimated_budget.filter(|s| !s.trim().is_empty()),
        priority,
    })
}

fn recommendation_for(score: u8) -> Recommendation {
    match score {
        9..=10 => Recommendation::Strong,
        7..=8 => Recommendation::Recommend,
        4..=6 => Recommendation::Review,
        _ => Recommendation::Reject,
    }
}
