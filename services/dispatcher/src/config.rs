//! Dispatcher configuration loading.
//!
//! TOML is the sole config source; every field has a default so an absent
//! file (or section) still yields a runnable config.
//!
//! # Sections
//! - `[dispatcher]` -- bind address, socket read deadline
//! - `[store]` -- database path
//! - `[scheduling]` -- claim timeouts, retry budget, batch sizes
//! - `[maintenance]` -- stale-reset horizon, host re-enable, log scanner

use serde::Deserialize;
use std::path::Path;

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub bind: String,
    /// Deadline for reading one request frame from a worker.
    pub read_deadline_secs: u64,
    /// Deadline for the per-row results a parser streams after a batch.
    pub submit_deadline_secs: u64,
    pub db_path: String,
    pub scheduling: SchedulingConfig,
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    /// Seconds before a `dispatched` claim becomes reclaimable.
    pub dispatch_timeout_secs: u64,
    /// Seconds before a `parsing` claim becomes reclaimable.
    pub parse_timeout_secs: u64,
    /// Seconds before an `indexing` claim becomes reclaimable.
    pub index_timeout_secs: u64,
    /// Minimum seconds between dispatches to one host.
    pub host_cooldown_secs: u64,
    pub max_retries: i64,
    pub candidate_window: i64,
    /// Rows per `get_fetched_url` batch.
    pub parser_batch: i64,
}

#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Startup recovery horizon for in-flight rows.
    pub stale_reset_horizon_secs: u64,
    /// Grace before a `timeout`-disabled host is re-enabled.
    pub host_timeout_grace_secs: u64,
    /// Interval of the re-enable background task.
    pub reenable_interval_secs: u64,
    /// Interval of the fetcher-log DNS scanner.
    pub log_scan_interval_secs: u64,
    /// Fetcher log tailed for DNS failure tokens.
    pub fetcher_log_path: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            bind: "127.0.0.1:8877".to_owned(),
            read_deadline_secs: 5,
            submit_deadline_secs: 60,
            db_path: "crawl.db".to_owned(),
            scheduling: SchedulingConfig::default(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        SchedulingConfig {
            dispatch_timeout_secs: 120,
            parse_timeout_secs: 300,
            index_timeout_secs: 300,
            host_cooldown_secs: 30,
            max_retries: 3,
            candidate_window: 100,
            parser_batch: 50,
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        MaintenanceConfig {
            stale_reset_horizon_secs: 300,
            host_timeout_grace_secs: 86_400,
            reenable_interval_secs: 600,
            log_scan_interval_secs: 300,
            fetcher_log_path: "logs/fetcher.log".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw TOML deserialization types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    dispatcher: Option<RawDispatcher>,
    store: Option<RawStore>,
    scheduling: Option<RawScheduling>,
    maintenance: Option<RawMaintenance>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDispatcher {
    bind: Option<String>,
    read_deadline_secs: Option<u64>,
    submit_deadline_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStore {
    db_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawScheduling {
    dispatch_timeout_secs: Option<u64>,
    parse_timeout_secs: Option<u64>,
    index_timeout_secs: Option<u64>,
    host_cooldown_secs: Option<u64>,
    max_retries: Option<i64>,
    candidate_window: Option<i64>,
    parser_batch: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMaintenance {
    stale_reset_horizon_secs: Option<u64>,
    host_timeout_grace_secs: Option<u64>,
    reenable_interval_secs: Option<u64>,
    log_scan_interval_secs: Option<u64>,
    fetcher_log_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load config from a TOML file; a missing file yields the defaults.
pub fn load_config_from_path(path: &Path) -> Result<DispatcherConfig, ConfigError> {
    if !path.exists() {
        return Ok(DispatcherConfig::default());
    }
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
    load_config_from_str(&toml_str)
}

/// Load config from a TOML string.
pub fn load_config_from_str(toml_str: &str) -> Result<DispatcherConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let defaults = DispatcherConfig::default();

    let dispatcher = raw.dispatcher.unwrap_or_default();
    let store = raw.store.unwrap_or_default();
    let scheduling = raw.scheduling.unwrap_or_default();
    let maintenance = raw.maintenance.unwrap_or_default();

    let max_retries = scheduling
        .max_retries
        .unwrap_or(defaults.scheduling.max_retries);
    if max_retries < 1 {
        return Err(ConfigError::InvalidValue(format!(
            "scheduling.max_retries must be at least 1, got {max_retries}"
        )));
    }
    let parser_batch = scheduling
        .parser_batch
        .unwrap_or(defaults.scheduling.parser_batch);
    if parser_batch < 1 {
        return Err(ConfigError::InvalidValue(format!(
            "scheduling.parser_batch must be at least 1, got {parser_batch}"
        )));
    }

    Ok(DispatcherConfig {
        bind: dispatcher.bind.unwrap_or(defaults.bind),
        read_deadline_secs: dispatcher
            .read_deadline_secs
            .unwrap_or(defaults.read_deadline_secs),
        submit_deadline_secs: dispatcher
            .submit_deadline_secs
            .unwrap_or(defaults.submit_deadline_secs),
        db_path: store.db_path.unwrap_or(defaults.db_path),
        scheduling: SchedulingConfig {
            dispatch_timeout_secs: scheduling
                .dispatch_timeout_secs
                .unwrap_or(defaults.scheduling.dispatch_timeout_secs),
            parse_timeout_secs: scheduling
                .parse_timeout_secs
                .unwrap_or(defaults.scheduling.parse_timeout_secs),
            index_timeout_secs: scheduling
                .index_timeout_secs
                .unwrap_or(defaults.scheduling.index_timeout_secs),
            host_cooldown_secs: scheduling
                .host_cooldown_secs
                .unwrap_or(defaults.scheduling.host_cooldown_secs),
            max_retries,
            candidate_window: scheduling
                .candidate_window
                .unwrap_or(defaults.scheduling.candidate_window),
            parser_batch,
        },
        maintenance: MaintenanceConfig {
            stale_reset_horizon_secs: maintenance
                .stale_reset_horizon_secs
                .unwrap_or(defaults.maintenance.stale_reset_horizon_secs),
            host_timeout_grace_secs: maintenance
                .host_timeout_grace_secs
                .unwrap_or(defaults.maintenance.host_timeout_grace_secs),
            reenable_interval_secs: maintenance
                .reenable_interval_secs
                .unwrap_or(defaults.maintenance.reenable_interval_secs),
            log_scan_interval_secs: maintenance
                .log_scan_interval_secs
                .unwrap_or(defaults.maintenance.log_scan_interval_secs),
            fetcher_log_path: maintenance
                .fetcher_log_path
                .unwrap_or(defaults.maintenance.fetcher_log_path),
        },
    })
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {}", s),
            ConfigError::Parse(s) => write!(f, "Parse error: {}", s),
            ConfigError::InvalidValue(s) => write!(f, "Invalid config value: {}", s),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = load_config_from_str("").unwrap();
        assert_eq!(cfg.bind, "127.0.0.1:8877");
        assert_eq!(cfg.scheduling.max_retries, 3);
        assert_eq!(cfg.maintenance.host_timeout_grace_secs, 86_400);
    }

    #[test]
    fn sections_override_selectively() {
        let cfg = load_config_from_str(
            "[dispatcher]\nbind = \"0.0.0.0:9001\"\n\
             [scheduling]\nhost_cooldown_secs = 5\n",
        )
        .unwrap();
        assert_eq!(cfg.bind, "0.0.0.0:9001");
        assert_eq!(cfg.scheduling.host_cooldown_secs, 5);
        // Untouched values keep their defaults.
        assert_eq!(cfg.scheduling.dispatch_timeout_secs, 120);
    }

    #[test]
    fn zero_retries_is_rejected() {
        let err = load_config_from_str("[scheduling]\nmax_retries = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load_config_from_path(Path::new("/nonexistent/dispatcher.toml")).unwrap();
        assert_eq!(cfg.db_path, "crawl.db");
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            load_config_from_str("not toml at all ["),
            Err(ConfigError::Parse(_))
        ));
    }
}
