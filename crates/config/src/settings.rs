//! Relay settings.
//!
//! Loaded from `~/.config/gridrelay/relay.toml`, then overridden by
//! environment variables. A missing file means defaults; a broken file is
//! reported and also means defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const ENV_BASE_URL: &str = "GRIDRELAY_BASE_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "GRIDRELAY_POLL_INTERVAL_MS";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1500;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_TICK_BUDGET_MS: u64 = 10_000;

/// When a failed candidate endpoint hands over to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Any transport error or non-success status moves on.
    #[default]
    AnyFailure,
    /// Transport errors move on, and so does a 404 from the first
    /// candidate (dev proxy not configured). Any other status ends the tick.
    NotFoundOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Candidate backend base URLs, tried in order.
    pub base_urls: Vec<String>,
    pub poll_interval_ms: u64,
    /// Cap on a single HTTP request.
    pub request_timeout_ms: u64,
    /// Cap on one poll tick across all candidates.
    pub tick_budget_ms: u64,
    pub fallback_policy: FallbackPolicy,
    /// POST each batch's results back to the backend.
    pub report_results: bool,
    /// Fetch the template document at startup to seed the grid.
    pub load_template: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_urls: vec![
                "http://127.0.0.1:8000".to_string(),
                "http://localhost:8000".to_string(),
            ],
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            tick_budget_ms: DEFAULT_TICK_BUDGET_MS,
            fallback_policy: FallbackPolicy::AnyFailure,
            report_results: false,
            load_template: false,
        }
    }
}

/// Errors reading a config file.
#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl RelayConfig {
    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gridrelay")
            .join("relay.toml")
    }

    /// Load from the default path and apply environment overrides.
    pub fn load() -> Self {
        let mut config = Self::load_or_default(&Self::config_path());
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Load a file, falling back to defaults when missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config.normalized())
    }

    /// Apply environment overrides through `lookup` (injectable for tests).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(urls) = lookup(ENV_BASE_URL) {
            let urls: Vec<String> = urls
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if !urls.is_empty() {
                self.base_urls = urls;
            }
        }
        if let Some(ms) = lookup(ENV_POLL_INTERVAL_MS) {
            match ms.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.poll_interval_ms = ms,
                _ => log::warn!("Ignoring {}={:?}: expected a positive integer", ENV_POLL_INTERVAL_MS, ms),
            }
        }
        *self = std::mem::take(self).normalized();
    }

    /// Trailing slashes stripped, zero intervals replaced by defaults.
    pub fn normalized(mut self) -> Self {
        self.base_urls = self
            .base_urls
            .into_iter()
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .collect();
        if self.poll_interval_ms == 0 {
            self.poll_interval_ms = DEFAULT_POLL_INTERVAL_MS;
        }
        if self.request_timeout_ms == 0 {
            self.request_timeout_ms = DEFAULT_REQUEST_TIMEOUT_MS;
        }
        if self.tick_budget_ms == 0 {
            self.tick_budget_ms = DEFAULT_TICK_BUDGET_MS;
        }
        self
    }

    /// Save current settings to disk
    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let contents = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, contents).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.poll_interval_ms, 1500);
        assert_eq!(config.base_urls.len(), 2);
        assert_eq!(config.fallback_policy, FallbackPolicy::AnyFailure);
        assert!(!config.report_results);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RelayConfig::from_toml(r#"
            base_urls = ["https://deals.example.com/api/"]
            fallback_policy = "not_found_only"
        "#).unwrap();
        assert_eq!(config.base_urls, vec!["https://deals.example.com/api"]);
        assert_eq!(config.fallback_policy, FallbackPolicy::NotFoundOnly);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    }

    #[test]
    fn test_zero_interval_replaced() {
        let config = RelayConfig::from_toml("poll_interval_ms = 0").unwrap();
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(matches!(
            RelayConfig::from_toml("poll_interval_ms = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_or_default_missing_and_broken() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert_eq!(RelayConfig::load_or_default(&missing), RelayConfig::default());

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "[[[").unwrap();
        assert_eq!(RelayConfig::load_or_default(&broken), RelayConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        let config = RelayConfig {
            base_urls: vec!["http://10.0.0.5:9000".into()],
            report_results: true,
            ..RelayConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(RelayConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_BASE_URL, "http://a:1/, http://b:2"),
            (ENV_POLL_INTERVAL_MS, "250"),
        ].into_iter().collect();

        let mut config = RelayConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.base_urls, vec!["http://a:1", "http://b:2"]);
        assert_eq!(config.poll_interval_ms, 250);
    }

    #[test]
    fn test_env_bad_interval_ignored() {
        let mut config = RelayConfig::default();
        config.apply_env(|k| (k == ENV_POLL_INTERVAL_MS).then(|| "fast".to_string()));
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    }
}
