//! Fetcher configuration loading.
//!
//! TOML with defaults for every field; an absent file yields a runnable
//! local config.

use serde::Deserialize;
use std::path::Path;

/// Top-level fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Dispatcher socket address, e.g. `127.0.0.1:8877`.
    pub dispatcher_addr: String,
    pub db_path: String,
    /// Per-request HTTP timeout.
    pub http_timeout_secs: u64,
    pub user_agent: String,
    /// Anchors are harvested only while the claimed url's distance is below
    /// this; 0 disables link extraction entirely.
    pub max_link_distance: i64,
    /// Sleep after `no_urls`.
    pub idle_sleep_secs: u64,
    /// Delay between consecutive fetches.
    pub fetch_delay_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        FetcherConfig {
            dispatcher_addr: "127.0.0.1:8877".to_owned(),
            db_path: "crawl.db".to_owned(),
            http_timeout_secs: 30,
            user_agent: "tunecrawler/1.0".to_owned(),
            max_link_distance: 0,
            idle_sleep_secs: 2,
            fetch_delay_ms: 500,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    dispatcher_addr: Option<String>,
    db_path: Option<String>,
    http_timeout_secs: Option<u64>,
    user_agent: Option<String>,
    max_link_distance: Option<i64>,
    idle_sleep_secs: Option<u64>,
    fetch_delay_ms: Option<u64>,
}

/// Load config from a TOML file; a missing file yields the defaults.
pub fn load_config_from_path(path: &Path) -> Result<FetcherConfig, ConfigError> {
    if !path.exists() {
        return Ok(FetcherConfig::default());
    }
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
    load_config_from_str(&toml_str)
}

pub fn load_config_from_str(toml_str: &str) -> Result<FetcherConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let defaults = FetcherConfig::default();
    Ok(FetcherConfig {
        dispatcher_addr: raw.dispatcher_addr.unwrap_or(defaults.dispatcher_addr),
        db_path: raw.db_path.unwrap_or(defaults.db_path),
        http_timeout_secs: raw.http_timeout_secs.unwrap_or(defaults.http_timeout_secs),
        user_agent: raw.user_agent.unwrap_or(defaults.user_agent),
        max_link_distance: raw.max_link_distance.unwrap_or(defaults.max_link_distance),
        idle_sleep_secs: raw.idle_sleep_secs.unwrap_or(defaults.idle_sleep_secs),
        fetch_delay_ms: raw.fetch_delay_ms.unwrap_or(defaults.fetch_delay_ms),
    })
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {}", s),
            ConfigError::Parse(s) => write!(f, "Parse error: {}", s),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_for_empty_toml() {
        let cfg = load_config_from_str("").unwrap();
        assert_eq!(cfg.http_timeout_secs, 30);
        assert_eq!(cfg.max_link_distance, 0);
    }

    #[test]
    fn fields_override_individually() {
        let cfg =
            load_config_from_str("max_link_distance = 3\nuser_agent = \"abc-bot/2\"\n").unwrap();
        assert_eq!(cfg.max_link_distance, 3);
        assert_eq!(cfg.user_agent, "abc-bot/2");
        assert_eq!(cfg.idle_sleep_secs, 2);
    }
}
