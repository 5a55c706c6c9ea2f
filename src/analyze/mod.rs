// src/analyze/mod.rs
//! Analysis stage: score records one at a time, pace calls, admit by threshold.
//!
//! Per record: `Pending -> Scoring (retried) -> Admitted | Rejected | Failed`.
//! `Failed` records are not dropped; they carry the fallback analysis and
//! an explicit error so a human reviews them.

pub mod retry;
pub mod scorer;

use chrono::Utc;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{PipelineConfig, RetryPolicy};
use crate::error::ScoreError;
use crate::record::{AnalyzedRecord, Profile, Record};
pub use retry::{retry_with_backoff, RetryError};
pub use scorer::{build_scorer, ClaudeScorer, DisabledScorer, DynScorer, Scorer};

pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("analyze_calls_total", "Scoring calls made (every attempt).");
        describe_counter!("analyze_retries_total", "Scoring retries after a transient error.");
        describe_counter!("analyze_admitted_total", "Records at or above the score threshold.");
        describe_counter!("analyze_rejected_total", "Records dropped below the score threshold.");
        describe_counter!(
            "analyze_failed_total",
            "Records emitted with the fallback analysis after scoring failed."
        );
    });
}

/// Short anonymized id for logs; record text never goes to info-level logs.
pub(crate) fn record_tag(record: &Record) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(record.id.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Terminal state of one record.
#[derive(Debug)]
pub enum RecordOutcome {
    Admitted(AnalyzedRecord),
    Rejected { record: Record, score: u8 },
    Failed(AnalyzedRecord),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisStats {
    pub input: usize,
    pub admitted: usize,
    pub rejected: usize,
    pub failed: usize,
    /// Records never reached because the run was cancelled.
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub struct AnalysisRun {
    /// Admitted and failed records, in input order.
    pub records: Vec<AnalyzedRecord>,
    pub stats: AnalysisStats,
    pub cancelled: bool,
}

pub struct Analyzer {
    scorer: DynScorer,
    profile: Profile,
    min_score: u8,
    retry: RetryPolicy,
    inter_record_delay: Duration,
}

impl Analyzer {
    pub fn new(scorer: DynScorer, profile: Profile, cfg: &PipelineConfig) -> Self {
        Self {
            scorer,
            profile,
            min_score: cfg.min_score_threshold,
            retry: cfg.retry,
            inter_record_delay: cfg.inter_record_delay,
        }
    }

    pub fn min_score(&self) -> u8 {
        self.min_score
    }

    pub async fn analyze(&self, records: Vec<Record>) -> Vec<AnalyzedRecord> {
        self.analyze_with_cancel(records, &CancellationToken::new())
            .await
            .records
    }

    /// Score records strictly one after another with a fixed pause between
    /// scoring calls. Stops early (keeping what is done) when `cancel` fires.
    pub async fn analyze_with_cancel(
        &self,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> AnalysisRun {
        ensure_metrics_described();
        let mut run = AnalysisRun {
            stats: AnalysisStats {
                input: records.len(),
                ..Default::default()
            },
            ..Default::default()
        };
        info!(
            target: "analyze",
            records = records.len(),
            scorer = self.scorer.name(),
            min_score = self.min_score,
            "analysis started"
        );

        let total = records.len();
        for (i, record) in records.into_iter().enumerate() {
            if i > 0 && !self.inter_record_delay.is_zero() {
                let cancelled = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => true,
                    _ = tokio::time::sleep(self.inter_record_delay) => false,
                };
                if cancelled {
                    run.cancelled = true;
                    run.stats.skipped = total - i;
                    break;
                }
            }

            match self.analyze_one(record, cancel).await {
                Some(RecordOutcome::Admitted(a)) => {
                    run.stats.admitted += 1;
                    run.records.push(a);
                }
                Some(RecordOutcome::Failed(a)) => {
                    run.stats.failed += 1;
                    run.records.push(a);
                }
                Some(RecordOutcome::Rejected { .. }) => run.stats.rejected += 1,
                None => {
                    run.cancelled = true;
                    run.stats.skipped = total - i;
                    break;
                }
            }
        }

        if run.cancelled {
            warn!(target: "analyze", stats = ?run.stats, "analysis cancelled");
        } else {
            info!(target: "analyze", stats = ?run.stats, "analysis finished");
        }
        run
    }

    /// Drive one record to a terminal state. `None` means cancelled mid-way.
    pub async fn analyze_one(
        &self,
        record: Record,
        cancel: &CancellationToken,
    ) -> Option<RecordOutcome> {
        ensure_metrics_described();
        let tag = record_tag(&record);
        let scorer: &dyn Scorer = self.scorer.as_ref();
        let profile = &self.profile;
        let rec = &record;
        let tag_ref = tag.as_str();

        let res = retry_with_backoff(
            &self.retry,
            cancel,
            move |attempt| {
                counter!("analyze_calls_total").increment(1);
                debug!(target: "analyze", record = tag_ref, attempt, "scoring");
                scorer.score(rec, profile)
            },
            ScoreError::is_retryable,
        )
        .await;

        let now = Utc::now();
        match res {
            Ok(analysis) => {
                let score = analysis.score;
                if score >= self.min_score {
                    counter!("analyze_admitted_total").increment(1);
                    debug!(target: "analyze", record = %tag, score, "admitted");
                    Some(RecordOutcome::Admitted(AnalyzedRecord::scored(
                        record, analysis, now,
                    )))
                } else {
                    counter!("analyze_rejected_total").increment(1);
                    debug!(target: "analyze", record = %tag, score, "below threshold");
                    Some(RecordOutcome::Rejected { record, score })
                }
            }
            Err(e) if e.is_cancelled() => None,
            Err(e) => {
                counter!("analyze_failed_total").increment(1);
                warn!(
                    target: "analyze",
                    record = %tag,
                    attempts = e.attempts(),
                    error = %e,
                    "scoring failed; emitting fallback analysis"
                );
                Some(RecordOutcome::Failed(AnalyzedRecord::degraded(
                    record,
                    e.to_string(),
                    now,
                )))
            }
        }
    }
}
