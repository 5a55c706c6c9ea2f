// src/config/mod.rs
//! Explicit pipeline configuration, loaded once and handed to constructors.
//!
//! TOML shape (`config/pipeline.toml`), every key optional:
//! ```toml
//! concurrency_cap = 5
//! collector_timeout_ms = 15000
//! min_score_threshold = 7
//! inter_record_delay_ms = 1000
//!
//! [retry]
//! attempts = 3
//! min_delay_ms = 1000
//! max_delay_ms = 5000
//! factor = 2.0
//! ```

pub mod ai;
pub mod profile;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::record::{MAX_SCORE, MIN_SCORE};

pub const DEFAULT_PIPELINE_CONFIG_PATH: &str = "config/pipeline.toml";
pub const ENV_PIPELINE_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const ENV_MIN_SCORE_THRESHOLD: &str = "MIN_SCORE_THRESHOLD";
pub const ENV_COLLECT_CONCURRENCY: &str = "COLLECT_CONCURRENCY";

/// Exponential backoff: attempt `n` (1-based) waits `min_delay * factor^(n-1)`,
/// capped at `max_delay`, before attempt `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            min_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Zero-delay policy, handy for tests.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            factor: 1.0,
        }
    }

    /// Delay after the failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31) as i32;
        let base = self.min_delay.as_secs_f64() * self.factor.powi(exp);
        let capped = base.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }

    fn sanitized(mut self) -> Self {
        self.attempts = self.attempts.max(1);
        if self.min_delay > self.max_delay {
            std::mem::swap(&mut self.min_delay, &mut self.max_delay);
        }
        if !self.factor.is_finite() || self.factor < 1.0 {
            self.factor = 1.0;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub concurrency_cap: usize,
    pub collector_timeout: Duration,
    pub min_score_threshold: u8,
    pub retry: RetryPolicy,
    pub inter_record_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency_cap: 5,
            collector_timeout: Duration::from_secs(15),
            min_score_threshold: 7,
            retry: RetryPolicy::default(),
            inter_record_delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRetry {
    attempts: Option<u32>,
    min_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    factor: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPipelineConfig {
    concurrency_cap: Option<usize>,
    collector_timeout_ms: Option<u64>,
    min_score_threshold: Option<u8>,
    inter_record_delay_ms: Option<u64>,
    #[serde(default)]
    retry: RawRetry,
}

impl PipelineConfig {
    /// Parse a TOML document; absent keys fall back to defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let raw: RawPipelineConfig = toml::from_str(s).context("parsing pipeline config")?;
        let d = Self::default();
        let cfg = Self {
            concurrency_cap: raw.concurrency_cap.unwrap_or(d.concurrency_cap),
            collector_timeout: raw
                .collector_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(d.collector_timeout),
            min_score_threshold: raw.min_score_threshold.unwrap_or(d.min_score_threshold),
            retry: RetryPolicy {
                attempts: raw.retry.attempts.unwrap_or(d.retry.attempts),
                min_delay: raw
                    .retry
                    .min_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(d.retry.min_delay),
                max_delay: raw
                    .retry
                    .max_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(d.retry.max_delay),
                factor: raw.retry.factor.unwrap_or(d.retry.factor),
            },
            inter_record_delay: raw
                .inter_record_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(d.inter_record_delay),
        };
        Ok(cfg.sanitized())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Resolve config the same way everywhere:
    /// 1) `$PIPELINE_CONFIG_PATH` (must exist)
    /// 2) `config/pipeline.toml` if present
    /// 3) defaults
    ///
    /// then apply `MIN_SCORE_THRESHOLD` / `COLLECT_CONCURRENCY` overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = match std::env::var(ENV_PIPELINE_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(ConfigError::MissingPath {
                        var: ENV_PIPELINE_CONFIG_PATH,
                        path: pb.display().to_string(),
                    }
                    .into());
                }
                Self::load_from(&pb)?
            }
            Err(_) => {
                let pb = PathBuf::from(DEFAULT_PIPELINE_CONFIG_PATH);
                if pb.exists() {
                    Self::load_from(&pb)?
                } else {
                    Self::default()
                }
            }
        };

        if let Some(t) = parse_env::<u8>(ENV_MIN_SCORE_THRESHOLD) {
            cfg.min_score_threshold = t;
        }
        if let Some(c) = parse_env::<usize>(ENV_COLLECT_CONCURRENCY) {
            cfg.concurrency_cap = c;
        }
        Ok(cfg.sanitized())
    }

    fn sanitized(mut self) -> Self {
        self.concurrency_cap = self.concurrency_cap.max(1);
        self.min_score_threshold = self.min_score_threshold.clamp(MIN_SCORE, MAX_SCORE);
        if self.collector_timeout.is_zero() {
            self.collector_timeout = Self::default().collector_timeout;
        }
        self.retry = self.retry.sanitized();
        self
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn backoff_grows_and_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(1), Duration::from_secs(1));
        assert_eq!(p.delay_for(2), Duration::from_secs(2));
        assert_eq!(p.delay_for(3), Duration::from_secs(4));
        assert_eq!(p.delay_for(4), Duration::from_secs(5));
        assert_eq!(p.delay_for(30), Duration::from_secs(5));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = PipelineConfig::from_toml_str(
            r#"
min_score_threshold = 8
[retry]
attempts = 5
"#,
        )
        .unwrap();
        assert_eq!(cfg.min_score_threshold, 8);
        assert_eq!(cfg.retry.attempts, 5);
        assert_eq!(cfg.concurrency_cap, 5);
        assert_eq!(cfg.retry.max_delay, Duration::from_secs(5));
    }

    #[test]
    fn nonsense_values_are_sanitized() {
        let cfg = PipelineConfig::from_toml_str(
            r#"
concurrency_cap = 0
min_score_threshold = 42
[retry]
attempts = 0
min_delay_ms = 9000
max_delay_ms = 10
factor = 0.1
"#,
        )
        .unwrap();
        assert_eq!(cfg.concurrency_cap, 1);
        assert_eq!(cfg.min_score_threshold, 10);
        assert_eq!(cfg.retry.attempts, 1);
        assert!(cfg.retry.min_delay <= cfg.retry.max_delay);
        assert_eq!(cfg.retry.factor, 1.0);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(PipelineConfig::from_toml_str("concurency_cap = 3").is_err());
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_file() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("pipeline.toml");
        fs::write(&p, "min_score_threshold = 6\nconcurrency_cap = 2").unwrap();

        env::set_var(ENV_PIPELINE_CONFIG_PATH, p.display().to_string());
        env::set_var(ENV_MIN_SCORE_THRESHOLD, "9");
        env::remove_var(ENV_COLLECT_CONCURRENCY);
        let cfg = PipelineConfig::load_default().unwrap();
        assert_eq!(cfg.min_score_threshold, 9);
        assert_eq!(cfg.concurrency_cap, 2);

        env::remove_var(ENV_MIN_SCORE_THRESHOLD);
        env::set_var(ENV_PIPELINE_CONFIG_PATH, tmp.path().join("missing.toml"));
        assert!(PipelineConfig::load_default().is_err());
        env::remove_var(ENV_PIPELINE_CONFIG_PATH);
    }
}
