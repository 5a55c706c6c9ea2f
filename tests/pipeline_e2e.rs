// tests/pipeline_e2e.rs
mod common;

use common::{rec, RecordingSink, Static, TitleScorer};
use grant_radar::config::{PipelineConfig, RetryPolicy};
use grant_radar::ingest::{Category, CollectorMeta};
use grant_radar::notify::SinkOutcome;
use grant_radar::pipeline::spawn_scheduler;
use grant_radar::{Analyzer, CollectorRegistry, Orchestrator, Pipeline, Profile, SyncDispatcher};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn cfg() -> PipelineConfig {
    PipelineConfig {
        retry: RetryPolicy::immediate(3),
        inter_record_delay: Duration::ZERO,
        ..PipelineConfig::default()
    }
}

fn pipeline(scorer: Arc<TitleScorer>, sink: Arc<RecordingSink>) -> Pipeline {
    let mut reg = CollectorRegistry::new();
    reg.register(
        CollectorMeta::new("one", "One", Category::Government),
        Static {
            records: vec![rec("a-1", "Grant A", "Gov")],
            delay: Duration::ZERO,
        },
    )
    .unwrap();
    reg.register(
        CollectorMeta::new("two", "Two", Category::Local),
        Static {
            records: vec![rec("a-2", "Grant A", "Gov"), rec("b-2", "Grant B", "Corp")],
            delay: Duration::from_millis(30),
        },
    )
    .unwrap();

    let cfg = cfg();
    Pipeline::new(
        Orchestrator::new(reg, &cfg),
        Analyzer::new(scorer, Profile::default(), &cfg),
        SyncDispatcher::new(cfg.min_score_threshold).with_sink(sink),
    )
}

#[tokio::test]
async fn only_the_qualifying_grant_reaches_the_sink() {
    let scorer = Arc::new(TitleScorer::new(&[("Grant A", 8), ("Grant B", 3)]));
    let sink = Arc::new(RecordingSink::default());
    let p = pipeline(scorer.clone(), sink.clone());

    let report = p.run_once(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.collection.total_records, 3);
    assert_eq!(report.collection.unique_records, 2);
    // The duplicate from the slower collector is never scored.
    assert_eq!(scorer.calls_for("Grant A"), 1);
    assert_eq!(report.analysis.admitted, 1);
    assert_eq!(report.analysis.rejected, 1);

    let batches = sink.batches.lock();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[0][0].record.id, "a-1");
    assert_eq!(batches[0][0].analysis.score, 8);

    let sync = report.sync.as_ref().unwrap();
    assert_eq!(sync.dispatched, 1);
    assert_eq!(sync.sinks[0].1, SinkOutcome::Ok { sent: 1 });
    assert!(!report.cancelled);
}

#[tokio::test]
async fn cancelled_run_skips_dispatch() {
    let scorer = Arc::new(TitleScorer::new(&[("Grant A", 8), ("Grant B", 9)]));
    let sink = Arc::new(RecordingSink::default());
    let p = pipeline(scorer.clone(), sink.clone());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = p.run_once(&cancel).await.unwrap();
    assert!(report.cancelled);
    assert!(report.sync.is_none());
    assert_eq!(report.collector_failures.len(), 2);
    assert_eq!(scorer.calls_for("Grant A"), 0);
    assert!(sink.batches.lock().is_empty());
}

#[tokio::test]
async fn cancelling_mid_collection_reports_a_cancelled_run() {
    let mut reg = CollectorRegistry::new();
    reg.register(
        CollectorMeta::new("slow", "Slow", Category::Government),
        Static {
            records: vec![rec("a-1", "Grant A", "Gov")],
            delay: Duration::from_millis(200),
        },
    )
    .unwrap();
    let cfg = cfg();
    let sink = Arc::new(RecordingSink::default());
    let p = Pipeline::new(
        Orchestrator::new(reg, &cfg),
        Analyzer::new(
            Arc::new(TitleScorer::new(&[("Grant A", 8)])),
            Profile::default(),
            &cfg,
        ),
        SyncDispatcher::new(cfg.min_score_threshold).with_sink(sink.clone()),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let report = p.run_once(&cancel).await.unwrap();
    assert!(report.cancelled);
    assert!(report.sync.is_none());
    assert!(report.records.is_empty());
    assert_eq!(report.collector_failures, vec!["slow: cancelled".to_string()]);
    assert!(sink.batches.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn scheduler_runs_until_cancelled() {
    let scorer = Arc::new(TitleScorer::new(&[("Grant A", 8), ("Grant B", 8)]));
    let sink = Arc::new(RecordingSink::default());
    let p = Arc::new(pipeline(scorer, sink.clone()));

    let cancel = CancellationToken::new();
    let handle = spawn_scheduler(p, Duration::from_secs(60), cancel.clone());
    tokio::time::sleep(Duration::from_secs(130)).await;
    cancel.cancel();
    handle.await.unwrap();

    assert_eq!(sink.batches.lock().len(), 3);
}
