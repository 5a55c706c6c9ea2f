// src/pipeline/mod.rs
//! Collect -> analyze -> rank -> dispatch, wired from explicit parts.

pub mod scheduler;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::analyze::{AnalysisStats, Analyzer};
use crate::error::CollectionError;
use crate::ingest::{CollectionStats, Orchestrator};
use crate::notify::{SyncDispatcher, SyncReport};
use crate::rank::rank_by_priority;
use crate::record::AnalyzedRecord;

pub use scheduler::spawn_scheduler;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Pipeline runs by outcome.");
        describe_gauge!("pipeline_last_run_ts", "Unix time of the last finished run.");
    });
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub collection: CollectionStats,
    /// `"<collector>: <error>"` for every collector that failed.
    pub collector_failures: Vec<String>,
    pub analysis: AnalysisStats,
    /// Dispatched records, ranked by priority then score.
    pub records: Vec<AnalyzedRecord>,
    /// `None` when the run was cancelled before dispatch.
    pub sync: Option<SyncReport>,
    pub cancelled: bool,
    pub duration_ms: u64,
}

pub struct Pipeline {
    orchestrator: Orchestrator,
    analyzer: Analyzer,
    dispatcher: SyncDispatcher,
}

impl Pipeline {
    pub fn new(orchestrator: Orchestrator, analyzer: Analyzer, dispatcher: SyncDispatcher) -> Self {
        Self {
            orchestrator,
            analyzer,
            dispatcher,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// One full pass. Only a collection where every collector failed is an
    /// error; anything less is reported and the run carries on.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<RunReport, CollectionError> {
        ensure_metrics_described();
        let t0 = Instant::now();

        let collection = match self.orchestrator.collect_all_with_cancel(cancel).await {
            Ok(c) => c,
            Err(e) => {
                counter!("pipeline_runs_total", "outcome" => "collection_failed").increment(1);
                return Err(e);
            }
        };
        let collector_failures: Vec<String> = collection
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.collector, f.kind))
            .collect();

        let run = self
            .analyzer
            .analyze_with_cancel(collection.records, cancel)
            .await;
        let records = rank_by_priority(run.records);

        let sync = if run.cancelled || cancel.is_cancelled() {
            warn!(target: "pipeline", "run cancelled; skipping dispatch");
            None
        } else {
            Some(self.dispatcher.sync(&records).await)
        };

        let cancelled = sync.is_none();
        let outcome = if cancelled { "cancelled" } else { "ok" };
        counter!("pipeline_runs_total", "outcome" => outcome).increment(1);
        gauge!("pipeline_last_run_ts").set(chrono::Utc::now().timestamp() as f64);

        let report = RunReport {
            collection: collection.stats,
            collector_failures,
            analysis: run.stats,
            records,
            sync,
            cancelled,
            duration_ms: t0.elapsed().as_millis() as u64,
        };
        info!(
            target: "pipeline",
            unique = report.collection.unique_records,
            admitted = report.analysis.admitted,
            flagged = report.analysis.failed,
            dispatched = report.sync.as_ref().map(|s| s.dispatched).unwrap_or(0),
            duration_ms = report.duration_ms,
            "run finished"
        );
        Ok(report)
    }
}
