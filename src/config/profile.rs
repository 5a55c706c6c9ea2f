// src/config/profile.rs
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::record::Profile;

pub const DEFAULT_PROFILE_PATH: &str = "config/profile.toml";
pub const ENV_PROFILE_PATH: &str = "PROFILE_PATH";

pub fn load_profile_from(path: &Path) -> Result<Profile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading profile from {}", path.display()))?;
    let profile: Profile = toml::from_str(&content).context("parsing profile toml")?;
    if profile.name.trim().is_empty() {
        return Err(ConfigError::EmptyProfileName.into());
    }
    Ok(profile)
}

/// `$PROFILE_PATH`, else `config/profile.toml`. The profile is required.
pub fn load_profile_default() -> Result<Profile> {
    let path = std::env::var(ENV_PROFILE_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_PROFILE_PATH));
    load_profile_from(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_profile_toml() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("profile.toml");
        std::fs::write(
            &p,
            r#"
name = "Acme AI"
description = "Seed-stage AI startup"
industry = "software"
interests = ["R&D grants", "export vouchers"]
"#,
        )
        .unwrap();
        let profile = load_profile_from(&p).unwrap();
        assert_eq!(profile.name, "Acme AI");
        assert_eq!(profile.interests.len(), 2);
        assert!(profile.exclusions.is_empty());
    }

    #[test]
    fn empty_name_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("profile.toml");
        std::fs::write(&p, "name = \"  \"").unwrap();
        assert!(load_profile_from(&p).is_err());
    }
}
