// src/metrics.rs
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9464";

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder process-wide.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        Ok(Self { handle })
    }

    /// Wrap an existing handle (tests build one without installing it).
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// `/metrics` in Prometheus exposition format, plus a plain `/health`.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new()
            .route(
                "/metrics",
                get(move || {
                    let h = handle.clone();
                    async move { h.render() }
                }),
            )
            .route("/health", get(|| async { "ok" }))
    }

    /// Serve the router until `cancel` fires.
    pub async fn serve(&self, addr: SocketAddr, cancel: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding metrics listener on {addr}"))?;
        tracing::info!(target: "pipeline", %addr, "metrics server listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
            .context("metrics server")
    }
}

/// `$METRICS_ADDR`, else `0.0.0.0:9464`.
pub fn metrics_addr() -> Result<SocketAddr> {
    let raw = std::env::var(ENV_METRICS_ADDR).unwrap_or_else(|_| DEFAULT_METRICS_ADDR.to_string());
    raw.parse()
        .with_context(|| format!("invalid {ENV_METRICS_ADDR} `{raw}`"))
}
