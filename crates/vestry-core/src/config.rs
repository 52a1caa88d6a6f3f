//! Application configuration management.
//!
//! Holds the hosted backend's project URL and public anon key plus cache
//! and HTTP tuning. Configuration is stored at
//! `~/.config/vestry/config.json`; `VESTRY_*` environment variables
//! override the file.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::cache::manager::DEFAULT_TTL_MINUTES;

/// Application name used for config directory paths
const APP_NAME: &str = "vestry";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_URL: &str = "VESTRY_URL";
const ENV_ANON_KEY: &str = "VESTRY_ANON_KEY";
const ENV_CACHE_TTL: &str = "VESTRY_CACHE_TTL_SECS";

/// Longest accepted cache TTL: one week.
pub const MAX_CACHE_TTL_SECS: u64 = 7 * 86_400;

fn default_cache_ttl_secs() -> u64 {
    (DEFAULT_TTL_MINUTES * 60) as u64
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub project_url: Option<String>,
    pub anon_key: Option<String>,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_url: None,
            anon_key: None,
            cache_ttl_secs: default_cache_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Load from the default location and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Override fields from `lookup` (normally the process environment)
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_URL) {
            self.project_url = Some(url);
        }
        if let Some(key) = lookup(ENV_ANON_KEY) {
            self.anon_key = Some(key);
        }
        if let Some(ttl) = lookup(ENV_CACHE_TTL) {
            self.cache_ttl_secs = ttl
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds", ENV_CACHE_TTL))?;
        }
        Ok(())
    }

    /// Check that everything needed to reach the backend is present
    pub fn validate(&self) -> Result<()> {
        let url = self.project_url()?;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            bail!("Project URL must start with http:// or https://: {}", url);
        }
        self.anon_key()?;
        if self.cache_ttl_secs == 0 {
            bail!("Cache TTL must be at least one second");
        }
        if self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            bail!(
                "Cache TTL of {}s exceeds the maximum of {}s",
                self.cache_ttl_secs,
                MAX_CACHE_TTL_SECS
            );
        }
        if self.request_timeout_secs == 0 {
            bail!("Request timeout must be at least one second");
        }
        Ok(())
    }

    pub fn project_url(&self) -> Result<&str> {
        self.project_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("Project URL not configured (set {})", ENV_URL))
    }

    pub fn anon_key(&self) -> Result<&str> {
        self.anon_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("Anon key not configured (set {})", ENV_ANON_KEY))
    }

    /// Cache TTL, capped at [`MAX_CACHE_TTL_SECS`]
    pub fn cache_ttl(&self) -> Duration {
        let secs = self.cache_ttl_secs.min(MAX_CACHE_TTL_SECS);
        i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or_else(|| Duration::days(7))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn configured() -> Config {
        Config {
            project_url: Some("https://abc.example.co".to_string()),
            anon_key: Some("anon".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache_ttl(), Duration::minutes(5));
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = configured();
        config.cache_ttl_secs = 60;

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_field_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"project_url": "https://x.example.co", "anon_key": "k"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.cache_ttl_secs, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("VESTRY_URL", "https://env.example.co"),
            ("VESTRY_CACHE_TTL_SECS", " 120 "),
        ]
        .into_iter()
        .collect();
        let mut config = configured();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.project_url().unwrap(), "https://env.example.co");
        assert_eq!(config.anon_key().unwrap(), "anon");
        assert_eq!(config.cache_ttl(), Duration::minutes(2));
    }

    #[test]
    fn test_env_bad_ttl() {
        let mut config = configured();
        let result = config.apply_env(|key| (key == "VESTRY_CACHE_TTL_SECS").then(|| "soon".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = configured();
        config.project_url = Some("abc.example.co".to_string());
        assert!(config.validate().is_err());

        let mut config = configured();
        config.anon_key = Some("  ".to_string());
        assert!(config.validate().is_err());

        let mut config = configured();
        config.cache_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_ttl_rejected_and_capped() {
        let mut config = configured();
        config
            .apply_env(|key| (key == "VESTRY_CACHE_TTL_SECS").then(|| "10000000000000000".to_string()))
            .unwrap();

        assert!(config.validate().is_err());
        assert_eq!(config.cache_ttl(), Duration::days(7));

        config.cache_ttl_secs = u64::MAX;
        assert_eq!(config.cache_ttl(), Duration::days(7));

        config.cache_ttl_secs = MAX_CACHE_TTL_SECS;
        assert!(config.validate().is_ok());
    }
}
