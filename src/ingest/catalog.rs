// src/ingest/catalog.rs
//! Declarative source list (`config/sources.toml`) turned into a registry.
//!
//! ```toml
//! [[source]]
//! id = "sba"
//! name = "서울경제진흥원"
//! category = "local"
//! priority = 8
//! kind = "rss"
//! url = "https://example.org/sba/rss"
//! organization = "서울경제진흥원"
//!
//! [[source]]
//! id = "bizinfo"
//! name = "기업마당"
//! category = "government"
//! kind = "json"
//! url = "https://example.org/bizinfo/api"
//! items_pointer = "/jsonArray"
//! api_key_param = "crtfcKey"
//! api_key_env = "BIZINFO_API_KEY"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::adapter::ProgramCollectorAdapter;
use super::providers::{JsonApiCollector, RssCollector};
use super::registry::CollectorRegistry;
use super::types::{Category, CollectorMeta};
use crate::error::ConfigError;

pub const DEFAULT_SOURCES_PATH: &str = "config/sources.toml";
pub const ENV_SOURCES_PATH: &str = "SOURCES_PATH";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceKind {
    Rss {
        url: String,
        organization: String,
    },
    Json {
        url: String,
        #[serde(default)]
        items_pointer: Option<String>,
        #[serde(default)]
        api_key_param: Option<String>,
        /// Env var holding the key. Unset means the source is registered disabled.
        #[serde(default)]
        api_key_env: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: SourceKind,
}

fn default_priority() -> u8 {
    5
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct SourcesFile {
    #[serde(default, rename = "source")]
    sources: Vec<SourceSpec>,
}

pub fn parse_sources(s: &str) -> Result<Vec<SourceSpec>> {
    let f: SourcesFile = toml::from_str(s).context("parsing sources toml")?;
    Ok(f.sources)
}

pub fn load_sources_from(path: &Path) -> Result<Vec<SourceSpec>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    parse_sources(&content)
}

/// `$SOURCES_PATH` (must exist), else `config/sources.toml`, else no sources.
pub fn load_sources_default() -> Result<Vec<SourceSpec>> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(ConfigError::MissingPath {
                var: ENV_SOURCES_PATH,
                path: pb.display().to_string(),
            }
            .into());
        }
        return load_sources_from(&pb);
    }
    let pb = PathBuf::from(DEFAULT_SOURCES_PATH);
    if pb.exists() {
        load_sources_from(&pb)
    } else {
        Ok(Vec::new())
    }
}

/// Register one collector per source entry; duplicate ids are an error.
pub fn build_registry(specs: Vec<SourceSpec>, client: &reqwest::Client) -> Result<CollectorRegistry> {
    let mut reg = CollectorRegistry::new();
    for spec in specs {
        let mut meta = CollectorMeta::new(spec.id.clone(), spec.name.clone(), spec.category)
            .with_priority(spec.priority)
            .with_description(spec.description.clone());
        if !spec.enabled {
            meta = meta.disabled();
        }
        match spec.kind {
            SourceKind::Rss { url, organization } => {
                let c = RssCollector::from_url(spec.id.as_str(), organization, url, client.clone());
                reg.register(meta, c)?;
            }
            SourceKind::Json {
                url,
                items_pointer,
                api_key_param,
                api_key_env,
            } => {
                let mut c = JsonApiCollector::new(spec.name.clone(), url, client.clone());
                if let Some(p) = items_pointer {
                    c = c.with_items_pointer(p);
                }
                if let Some(var) = api_key_env {
                    match std::env::var(&var) {
                        Ok(key) => {
                            let param = api_key_param.unwrap_or_else(|| "serviceKey".to_string());
                            c = c.with_api_key(param, key);
                        }
                        Err(_) => {
                            tracing::warn!(
                                target: "ingest",
                                collector = %spec.id,
                                env = %var,
                                "api key not set; collector disabled"
                            );
                            meta = meta.disabled();
                        }
                    }
                }
                reg.register(meta, ProgramCollectorAdapter::new(spec.id.as_str(), c))?;
            }
        }
    }
    Ok(reg)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCES: &str = r#"
[[source]]
id = "sba"
name = "SBA"
category = "local"
priority = 8
kind = "rss"
url = "https://example.org/rss"
organization = "서울경제진흥원"

[[source]]
id = "bizinfo"
name = "기업마당"
category = "government"
kind = "json"
url = "https://example.org/api"
items_pointer = "/jsonArray"
api_key_env = "GRANT_RADAR_TEST_MISSING_KEY"

[[source]]
id = "off"
name = "Off"
category = "private"
enabled = false
kind = "rss"
url = "https://example.org/off"
organization = "Off"
"#;

    #[test]
    fn parses_both_kinds() {
        let specs = parse_sources(SOURCES).unwrap();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].category, Category::Local);
        assert!(matches!(specs[1].kind, SourceKind::Json { .. }));
        assert_eq!(specs[1].priority, 5);
    }

    #[serial_test::serial]
    #[test]
    fn missing_key_and_disabled_flag_disable_collectors() {
        std::env::remove_var("GRANT_RADAR_TEST_MISSING_KEY");
        let reg = build_registry(parse_sources(SOURCES).unwrap(), &reqwest::Client::new()).unwrap();
        assert_eq!(reg.len(), 3);
        let enabled: Vec<_> = reg.enabled().into_iter().map(|e| e.meta.id).collect();
        assert_eq!(enabled, vec!["sba"]);
    }

    #[test]
    fn duplicate_ids_fail() {
        let twice = format!("{SOURCES}\n{}", &SOURCES[..SOURCES.find("[[source]]\nid = \"bizinfo\"").unwrap()]);
        assert!(build_registry(parse_sources(&twice).unwrap(), &reqwest::Client::new()).is_err());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let bad = "[[source]]\nid='x'\nname='x'\ncategory='local'\nkind='ftp'\nurl='u'";
        assert!(parse_sources(bad).is_err());
    }
}
