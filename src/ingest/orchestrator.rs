// src/ingest/orchestrator.rs
//! Bounded fan-out over the registered collectors and fan-in of their results.
//!
//! Every collector runs in its own task with its own timeout, so an error,
//! hang or panic in one source never touches its siblings. Results are folded
//! by the single task driving the stream, in completion order, and then
//! deduplicated (first seen wins).

use futures::stream::{self, StreamExt};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::registry::{CollectorRegistry, RegisteredCollector};
use super::types::Category;
use crate::config::PipelineConfig;
use crate::error::{CollectionError, CollectorFailure, FailureKind};
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceStat {
    pub id: String,
    pub name: String,
    pub count: usize,
    pub status: SourceStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionStats {
    pub total_sources: usize,
    pub successful_sources: usize,
    pub failed_sources: usize,
    /// Records returned by collectors, before dedup.
    pub total_records: usize,
    pub unique_records: usize,
    pub duration: Duration,
    /// In completion order.
    pub sources: Vec<SourceStat>,
}

/// Outcome of a collection run that produced something (or legitimately nothing).
#[derive(Debug)]
pub struct Collection {
    /// Unique by `(trim(title), trim(organization))`.
    pub records: Vec<Record>,
    pub failures: Vec<CollectorFailure>,
    pub stats: CollectionStats,
}

pub struct Orchestrator {
    registry: CollectorRegistry,
    concurrency_cap: usize,
    collector_timeout: Duration,
}

impl Orchestrator {
    pub fn new(registry: CollectorRegistry, cfg: &PipelineConfig) -> Self {
        Self {
            registry,
            concurrency_cap: cfg.concurrency_cap.max(1),
            collector_timeout: cfg.collector_timeout,
        }
    }

    pub fn registry(&self) -> &CollectorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CollectorRegistry {
        &mut self.registry
    }

    /// Run every enabled collector and return the deduplicated union.
    pub async fn collect_all(&self) -> Result<Collection, CollectionError> {
        self.collect_all_with_cancel(&CancellationToken::new()).await
    }

    pub async fn collect_all_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Collection, CollectionError> {
        self.run(self.registry.enabled(), cancel).await
    }

    /// Same contract as [`Self::collect_all`], restricted to one category.
    pub async fn collect_by_category(
        &self,
        category: Category,
        cancel: &CancellationToken,
    ) -> Result<Collection, CollectionError> {
        info!(target: "ingest", %category, "category collection requested");
        self.run(self.registry.enabled_in(category), cancel).await
    }

    async fn run(
        &self,
        selected: Vec<RegisteredCollector>,
        cancel: &CancellationToken,
    ) -> Result<Collection, CollectionError> {
        super::ensure_metrics_described();
        counter!("collect_runs_total").increment(1);

        let t0 = Instant::now();
        let total_sources = selected.len();
        info!(
            target: "ingest",
            sources = total_sources,
            concurrency = self.concurrency_cap,
            "collection started"
        );

        let timeout = self.collector_timeout;
        let mut outcomes = stream::iter(
            selected
                .into_iter()
                .map(|entry| run_collector(entry, timeout, cancel.clone())),
        )
        .buffer_unordered(self.concurrency_cap);

        let mut all: Vec<Record> = Vec::new();
        let mut failures: Vec<CollectorFailure> = Vec::new();
        let mut sources: Vec<SourceStat> = Vec::with_capacity(total_sources);
        let mut invalid = 0usize;

        while let Some((entry, result)) = outcomes.next().await {
            match result {
                Ok(records) => {
                    let before = records.len();
                    let valid: Vec<Record> = records
                        .into_iter()
                        .filter(|r| !r.title.trim().is_empty())
                        .collect();
                    invalid += before - valid.len();
                    info!(
                        target: "ingest",
                        collector = %entry.meta.id,
                        records = valid.len(),
                        "collector finished"
                    );
                    sources.push(SourceStat {
                        id: entry.meta.id.clone(),
                        name: entry.meta.name.clone(),
                        count: valid.len(),
                        status: SourceStatus::Success,
                        error: None,
                    });
                    all.extend(valid);
                }
                Err(failure) => {
                    warn!(
                        target: "ingest",
                        collector = %entry.meta.id,
                        error = %failure.kind,
                        "collector failed"
                    );
                    counter!("collect_collector_errors_total").increment(1);
                    sources.push(SourceStat {
                        id: entry.meta.id.clone(),
                        name: entry.meta.name.clone(),
                        count: 0,
                        status: SourceStatus::Failed,
                        error: Some(failure.kind.to_string()),
                    });
                    failures.push(failure);
                }
            }
        }

        let total_records = all.len();
        let (records, dedup_cnt) = super::dedup_counted(all);

        let duration = t0.elapsed();
        counter!("collect_records_total").increment(total_records as u64);
        counter!("collect_invalid_total").increment(invalid as u64);
        counter!("collect_dedup_total").increment(dedup_cnt as u64);
        histogram!("collect_duration_ms").record(duration.as_secs_f64() * 1_000.0);

        let stats = CollectionStats {
            total_sources,
            successful_sources: total_sources - failures.len(),
            failed_sources: failures.len(),
            total_records,
            unique_records: records.len(),
            duration,
            sources,
        };
        log_stats(&stats);

        // An abandoned run is not a broken pipeline; the caller sees it as cancelled.
        if cancel.is_cancelled() {
            warn!(target: "ingest", failed = failures.len(), "collection cancelled");
        } else if total_sources > 0 && failures.len() == total_sources {
            return Err(CollectionError::AllFailed(failures));
        }

        gauge!("collect_last_unique_records").set(records.len() as f64);
        Ok(Collection {
            records,
            failures,
            stats,
        })
    }
}

/// Runs one collector on its own task so that a panic stays contained.
async fn run_collector(
    entry: RegisteredCollector,
    timeout: Duration,
    cancel: CancellationToken,
) -> (RegisteredCollector, Result<Vec<Record>, CollectorFailure>) {
    let collector = entry.collector.clone();
    let task = tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FailureKind::Cancelled),
            res = tokio::time::timeout(timeout, collector.collect()) => match res {
                Ok(Ok(records)) => Ok(records),
                Ok(Err(e)) => Err(FailureKind::Error(e)),
                Err(_) => Err(FailureKind::Timeout(timeout)),
            },
        }
    });

    let result = match task.await {
        Ok(r) => r,
        Err(join) => Err(FailureKind::Error(anyhow::anyhow!("collector task aborted: {join}"))),
    };
    let id = entry.meta.id.clone();
    (entry, result.map_err(|kind| CollectorFailure::new(id, kind)))
}

fn log_stats(stats: &CollectionStats) {
    info!(
        target: "ingest",
        duration_ms = stats.duration.as_millis() as u64,
        ok = stats.successful_sources,
        failed = stats.failed_sources,
        total = stats.total_sources,
        records = stats.total_records,
        unique = stats.unique_records,
        duplicates = stats.total_records - stats.unique_records,
        "collection finished"
    );

    let mut by_count: Vec<&SourceStat> = stats.sources.iter().collect();
    by_count.sort_by(|a, b| b.count.cmp(&a.count));
    for s in by_count {
        match s.status {
            SourceStatus::Success => {
                tracing::debug!(target: "ingest", source = %s.name, count = s.count, "source ok")
            }
            SourceStatus::Failed => warn!(
                target: "ingest",
                source = %s.name,
                error = s.error.as_deref().unwrap_or("unknown"),
                "source failed"
            ),
        }
    }
}
