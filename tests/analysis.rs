// tests/analysis.rs
mod common;

use common::{rec, TitleScorer};
use grant_radar::analyze::RecordOutcome;
use grant_radar::config::{PipelineConfig, RetryPolicy};
use grant_radar::{Analyzer, Priority, Profile, Recommendation};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn fast_cfg() -> PipelineConfig {
    PipelineConfig {
        retry: RetryPolicy::immediate(3),
        inter_record_delay: Duration::ZERO,
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn exhausted_retries_emit_a_flagged_fallback() {
    let scorer = Arc::new(TitleScorer::new(&[]));
    let a = Analyzer::new(scorer.clone(), Profile::default(), &fast_cfg());

    let out = a.analyze(vec![rec("1", "Unreachable", "Gov")]).await;
    assert_eq!(scorer.calls_for("Unreachable"), 3);
    assert_eq!(out.len(), 1);

    let r = &out[0];
    assert!(r.is_auto_analysis_failed());
    assert_eq!(r.analysis.score, 5);
    assert_eq!(r.analysis.recommendation, Recommendation::Review);
    assert_eq!(r.analysis.priority, Priority::Medium);
    assert!(r.analysis_error.as_deref().unwrap().contains("503"));
}

#[tokio::test]
async fn threshold_admits_seven_and_above() {
    let scorer = Arc::new(TitleScorer::new(&[("six", 6), ("seven", 7), ("ten", 10)]));
    let a = Analyzer::new(scorer, Profile::default(), &fast_cfg());
    let out = a
        .analyze(vec![
            rec("1", "six", "o"),
            rec("2", "seven", "o"),
            rec("3", "ten", "o"),
        ])
        .await;
    let titles: Vec<_> = out.iter().map(|r| r.record.title.as_str()).collect();
    assert_eq!(titles, vec!["seven", "ten"]);
    assert!(out.iter().all(|r| !r.is_auto_analysis_failed()));
}

#[tokio::test]
async fn rejected_outcome_reports_the_score() {
    let scorer = Arc::new(TitleScorer::new(&[("low", 2)]));
    let a = Analyzer::new(scorer, Profile::default(), &fast_cfg());
    match a
        .analyze_one(rec("1", "low", "o"), &CancellationToken::new())
        .await
    {
        Some(RecordOutcome::Rejected { record, score }) => {
            assert_eq!(record.id, "1");
            assert_eq!(score, 2);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn default_backoff_waits_one_then_two_seconds() {
    let scorer = Arc::new(TitleScorer::new(&[]));
    let cfg = PipelineConfig {
        inter_record_delay: Duration::ZERO,
        ..PipelineConfig::default()
    };
    let a = Analyzer::new(scorer.clone(), Profile::default(), &cfg);
    let start = tokio::time::Instant::now();
    let out = a.analyze(vec![rec("1", "down", "o")]).await;
    assert_eq!(out.len(), 1);
    assert_eq!(scorer.calls_for("down"), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(3));
}
