// src/config/ai.rs
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

use crate::error::ConfigError;

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_tokens() -> u32 {
    2048
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    pub enabled: bool,
    /// Only "claude" is supported (case-insensitive).
    pub provider: String,
    /// "ENV" means: read from ANTHROPIC_API_KEY
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Optional endpoint override (proxies, tests).
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "claude".to_string(),
            api_key: "ENV".to_string(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            base_url: None,
        }
    }
}

impl ScorerConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading scorer config from {}", path.display()))?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> anyhow::Result<Self> {
        let mut cfg: ScorerConfig =
            serde_json::from_str(data).context("parsing scorer config json")?;

        cfg.provider = cfg.provider.to_lowercase();
        if cfg.provider != "claude" {
            return Err(ConfigError::UnsupportedProvider(cfg.provider).into());
        }

        // Resolve api key if "ENV"; a disabled scorer may go without one.
        if cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = match env::var("ANTHROPIC_API_KEY") {
                Ok(k) => k,
                Err(_) if !cfg.enabled => String::new(),
                Err(_) => return Err(ConfigError::MissingEnv("ANTHROPIC_API_KEY").into()),
            };
        }

        if cfg.timeout_secs == 0 {
            cfg.timeout_secs = default_timeout_secs();
        }
        if cfg.max_tokens == 0 {
            cfg.max_tokens = default_max_tokens();
        }

        Ok(cfg)
    }

    /// Load `config/ai.json`; a missing file yields the disabled default.
    pub fn load_default() -> anyhow::Result<Self> {
        let path = Path::new(DEFAULT_AI_CONFIG_PATH);
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[serial_test::serial]
    #[test]
    fn env_key_is_resolved() {
        env::set_var("ANTHROPIC_API_KEY", "sk-test");
        let cfg = ScorerConfig::from_json_str(
            r#"{"enabled": true, "provider": "Claude", "api_key": "ENV"}"#,
        )
        .unwrap();
        assert_eq!(cfg.api_key, "sk-test");
        assert_eq!(cfg.provider, "claude");
        assert_eq!(cfg.model, DEFAULT_MODEL);
        env::remove_var("ANTHROPIC_API_KEY");
    }

    #[serial_test::serial]
    #[test]
    fn enabled_without_key_is_an_error() {
        env::remove_var("ANTHROPIC_API_KEY");
        let err = ScorerConfig::from_json_str(
            r#"{"enabled": true, "provider": "claude", "api_key": "env"}"#,
        );
        assert!(err.is_err());
        let ok = ScorerConfig::from_json_str(
            r#"{"enabled": false, "provider": "claude", "api_key": "env"}"#,
        )
        .unwrap();
        assert!(ok.api_key.is_empty());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = ScorerConfig::from_json_str(
            r#"{"enabled": true, "provider": "openai", "api_key": "x"}"#,
        );
        assert!(err.is_err());
    }
}
