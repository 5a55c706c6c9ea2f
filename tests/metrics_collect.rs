// tests/metrics_collect.rs
#![cfg(feature = "strict-metrics")]
use grant_radar::config::PipelineConfig;
use grant_radar::ingest::providers::RssCollector;
use grant_radar::ingest::{Category, CollectorMeta};
use grant_radar::{CollectorRegistry, Orchestrator};
use metrics_exporter_prometheus::PrometheusBuilder;

#[tokio::test]
async fn metrics_exposed_after_collection() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("recorder");

    let xml = std::fs::read_to_string("tests/fixtures/sba_rss.xml").expect("fixture");
    let mut reg = CollectorRegistry::new();
    reg.register(
        CollectorMeta::new("sba", "SBA", Category::Local),
        RssCollector::from_fixture_str("sba", "서울경제진흥원", &xml),
    )
    .unwrap();
    let out = Orchestrator::new(reg, &PipelineConfig::default())
        .collect_all()
        .await
        .unwrap();
    assert_eq!(out.records.len(), 2);

    let text = handle.render();
    for needle in [
        "collect_runs_total",
        "collect_records_total",
        "collect_dedup_total",
        "collect_duration_ms",
        "collect_parse_ms",
    ] {
        assert!(text.contains(needle), "missing {needle}");
    }
}
