// src/pipeline/scheduler.rs
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::Pipeline;

/// Run the pipeline on a fixed interval (first run immediately) until
/// `cancel` fires. A run that is in progress is cancelled with it.
pub fn spawn_scheduler(
    pipeline: Arc<Pipeline>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match pipeline.run_once(&cancel).await {
                Ok(report) => tracing::info!(
                    target: "pipeline",
                    dispatched = report.sync.as_ref().map(|s| s.dispatched).unwrap_or(0),
                    "scheduled run done"
                ),
                Err(e) => tracing::error!(target: "pipeline", error = %e, "scheduled run failed"),
            }
        }
        tracing::info!(target: "pipeline", "scheduler stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{Analyzer, DisabledScorer};
    use crate::config::PipelineConfig;
    use crate::ingest::{Category, Collector, CollectorMeta, CollectorRegistry, Orchestrator};
    use crate::notify::SyncDispatcher;
    use crate::record::{Profile, Record};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl Collector for Counting {
        async fn collect(&self) -> anyhow::Result<Vec<Record>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_until_cancelled() {
        let cfg = PipelineConfig {
            inter_record_delay: Duration::ZERO,
            ..PipelineConfig::default()
        };
        let mut reg = CollectorRegistry::new();
        let runs = Arc::new(AtomicUsize::new(0));
        reg.register(
            CollectorMeta::new("count", "Count", Category::Platform),
            Counting(runs.clone()),
        )
        .unwrap();
        let pipeline = Arc::new(Pipeline::new(
            Orchestrator::new(reg, &cfg),
            Analyzer::new(Arc::new(DisabledScorer), Profile::default(), &cfg),
            SyncDispatcher::new(cfg.min_score_threshold),
        ));

        let cancel = CancellationToken::new();
        let handle = spawn_scheduler(pipeline, Duration::from_secs(60), cancel.clone());
        tokio::time::sleep(Duration::from_secs(150)).await;
        cancel.cancel();
        handle.await.unwrap();
        // t = 0s, 60s, 120s
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
