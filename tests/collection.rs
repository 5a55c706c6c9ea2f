// tests/collection.rs
mod common;

use common::{rec, Rejecting, Static};
use grant_radar::config::PipelineConfig;
use grant_radar::ingest::{Category, CollectorMeta};
use grant_radar::{CollectionError, CollectorRegistry, Orchestrator};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn meta(id: &str, category: Category) -> CollectorMeta {
    CollectorMeta::new(id, id, category)
}

#[tokio::test]
async fn one_failing_collector_does_not_hide_the_others() {
    let mut reg = CollectorRegistry::new();
    reg.register(
        meta("a", Category::Government),
        Static {
            records: vec![rec("x", "x", "Gov")],
            delay: Duration::ZERO,
        },
    )
    .unwrap();
    reg.register(meta("b", Category::Local), Rejecting("connection refused"))
        .unwrap();
    reg.register(
        meta("c", Category::Private),
        Static {
            records: vec![rec("y", "y", "Gov")],
            delay: Duration::from_millis(5),
        },
    )
    .unwrap();

    let out = Orchestrator::new(reg, &PipelineConfig::default())
        .collect_all()
        .await
        .unwrap();

    let mut ids: Vec<_> = out.records.iter().map(|r| r.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["x", "y"]);
    assert_eq!(out.failures.len(), 1);
    assert_eq!(out.failures[0].collector, "b");
    assert_eq!(out.stats.successful_sources, 2);
    assert_eq!(out.stats.failed_sources, 1);
}

#[tokio::test]
async fn every_collector_failing_is_an_aggregate_error() {
    let mut reg = CollectorRegistry::new();
    for (id, why) in [("a", "dns"), ("b", "http 500"), ("c", "bad json")] {
        reg.register(meta(id, Category::Government), Rejecting(why))
            .unwrap();
    }

    let err = Orchestrator::new(reg, &PipelineConfig::default())
        .collect_all()
        .await
        .unwrap_err();

    let CollectionError::AllFailed(failures) = &err;
    assert_eq!(failures.len(), 3);
    let msg = err.to_string();
    for why in ["dns", "http 500", "bad json"] {
        assert!(msg.contains(why), "{msg}");
    }
}

#[tokio::test]
async fn duplicates_across_collectors_keep_the_first_to_complete() {
    let mut reg = CollectorRegistry::new();
    reg.register(
        meta("slow", Category::Government),
        Static {
            records: vec![rec("slow-1", "창업지원", "중기부")],
            delay: Duration::from_millis(40),
        },
    )
    .unwrap();
    reg.register(
        meta("fast", Category::Platform),
        Static {
            records: vec![rec("fast-1", " 창업지원 ", "중기부")],
            delay: Duration::ZERO,
        },
    )
    .unwrap();

    let out = Orchestrator::new(reg, &PipelineConfig::default())
        .collect_all()
        .await
        .unwrap();
    assert_eq!(out.records.len(), 1);
    assert_eq!(out.records[0].id, "fast-1");
    assert_eq!(out.stats.total_records, 2);
    assert_eq!(out.stats.unique_records, 1);
}

#[tokio::test]
async fn category_selection_only_runs_matching_collectors() {
    let mut reg = CollectorRegistry::new();
    reg.register(
        meta("gov", Category::Government),
        Static {
            records: vec![rec("g", "g", "Gov")],
            delay: Duration::ZERO,
        },
    )
    .unwrap();
    reg.register(meta("local", Category::Local), Rejecting("unreachable"))
        .unwrap();

    let orch = Orchestrator::new(reg, &PipelineConfig::default());
    let out = orch
        .collect_by_category(Category::Government, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(out.records.len(), 1);
    assert!(out.failures.is_empty());
    assert_eq!(out.stats.total_sources, 1);

    // Only failing collectors in the category: aggregate error.
    assert!(orch
        .collect_by_category(Category::Local, &CancellationToken::new())
        .await
        .is_err());
}
