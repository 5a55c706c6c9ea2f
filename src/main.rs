//! grant-radar binary entrypoint.
//!
//! Runs the pipeline once and prints the run report as JSON. With `--serve`
//! it runs on a schedule instead and exposes `/metrics` and `/health`.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use grant_radar::analyze::{build_scorer, Analyzer};
use grant_radar::config::ai::ScorerConfig;
use grant_radar::config::profile::load_profile_default;
use grant_radar::config::PipelineConfig;
use grant_radar::ingest::catalog::{build_registry, load_sources_default};
use grant_radar::ingest::providers::FixtureCollector;
use grant_radar::ingest::{Category, CollectorMeta, CollectorRegistry, Orchestrator};
use grant_radar::metrics::{metrics_addr, Metrics};
use grant_radar::notify::SyncDispatcher;
use grant_radar::pipeline::{spawn_scheduler, Pipeline};

const ENV_INTERVAL_SECS: &str = "PIPELINE_INTERVAL_SECS";
const DEFAULT_INTERVAL_SECS: u64 = 6 * 60 * 60;

/// `RUST_LOG` filter (default `grant_radar=info,warn`); `LOG_FORMAT=json`
/// switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("grant_radar=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn build_collectors(client: &reqwest::Client) -> Result<CollectorRegistry> {
    let registry = if grant_radar::is_dev_mode() {
        tracing::info!(target: "ingest", "development mode: using fixture collector");
        let mut r = CollectorRegistry::new();
        r.register(
            CollectorMeta::new("mock", "Fixture announcements", Category::Platform)
                .with_description("Static sample data for local runs"),
            FixtureCollector::sample(),
        )?;
        r
    } else {
        build_registry(load_sources_default()?, client)?
    };

    for meta in registry.list() {
        tracing::info!(
            target: "ingest",
            id = %meta.id,
            category = %meta.category,
            priority = meta.priority,
            enabled = meta.enabled,
            "collector registered"
        );
    }
    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let serve = std::env::args().skip(1).any(|a| a == "--serve");

    let cfg = PipelineConfig::load_default()?;
    let profile = load_profile_default()?;
    let scorer = build_scorer(&ScorerConfig::load_default()?)?;
    let client = reqwest::Client::builder()
        .user_agent(concat!("grant-radar/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .build()
        .context("building http client")?;

    let pipeline = Pipeline::new(
        Orchestrator::new(build_collectors(&client)?, &cfg),
        Analyzer::new(scorer, profile, &cfg),
        SyncDispatcher::from_env(cfg.min_score_threshold)?,
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!(target: "pipeline", "ctrl-c received; shutting down");
                cancel.cancel();
            }
        });
    }

    if serve {
        let metrics = Metrics::init()?;
        let interval = std::env::var(ENV_INTERVAL_SECS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        let scheduler = spawn_scheduler(
            Arc::new(pipeline),
            Duration::from_secs(interval),
            cancel.clone(),
        );
        let served = metrics.serve(metrics_addr()?, cancel.clone()).await;
        cancel.cancel();
        scheduler.await.context("scheduler task")?;
        served?;
    } else {
        let report = pipeline.run_once(&cancel).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
