//! Parser configuration loading.

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub dispatcher_addr: String,
    pub db_path: String,
    /// Sleep between batch polls.
    pub idle_sleep_secs: u64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            dispatcher_addr: "127.0.0.1:8877".to_owned(),
            db_path: "crawl.db".to_owned(),
            idle_sleep_secs: 2,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    dispatcher_addr: Option<String>,
    db_path: Option<String>,
    idle_sleep_secs: Option<u64>,
}

/// Load config from a TOML file; a missing file yields the defaults.
pub fn load_config_from_path(path: &Path) -> Result<ParserConfig, ConfigError> {
    if !path.exists() {
        return Ok(ParserConfig::default());
    }
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
    let raw: RawConfig = toml::from_str(&toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let defaults = ParserConfig::default();
    Ok(ParserConfig {
        dispatcher_addr: raw.dispatcher_addr.unwrap_or(defaults.dispatcher_addr),
        db_path: raw.db_path.unwrap_or(defaults.db_path),
        idle_sleep_secs: raw.idle_sleep_secs.unwrap_or(defaults.idle_sleep_secs),
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
