//! purger: periodic store garbage collection.
//!
//! Four passes per cycle, all batched so the store stays responsive for
//! the dispatcher:
//! 1. delete urls with refused extensions,
//! 2. delete urls (then hosts) disabled for DNS failures,
//! 3. re-enable `timeout`-disabled hosts past the grace period,
//! 4. erase the stored document of parsed, ABC-free urls.

use std::time::Duration;

use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

use crawl_store::{Store, StoreResult};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PurgerConfig {
    pub db_path: String,
    pub purge_interval_secs: u64,
    /// Grace before a `timeout`-disabled host is re-enabled.
    pub host_timeout_grace_secs: u64,
    /// Rows deleted per batch.
    pub delete_batch: i64,
    /// Documents erased per batch.
    pub erase_batch: i64,
}

impl Default for PurgerConfig {
    fn default() -> Self {
        PurgerConfig {
            db_path: "crawl.db".to_owned(),
            purge_interval_secs: 60,
            host_timeout_grace_secs: 86_400,
            delete_batch: 500,
            erase_batch: 200,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    db_path: Option<String>,
    purge_interval_secs: Option<u64>,
    host_timeout_grace_secs: Option<u64>,
    delete_batch: Option<i64>,
    erase_batch: Option<i64>,
}

/// Load config from a TOML file; a missing file yields the defaults.
pub fn load_config_from_path(path: &Path) -> Result<PurgerConfig, ConfigError> {
    if !path.exists() {
        return Ok(PurgerConfig::default());
    }
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
    let raw: RawConfig = toml::from_str(&toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let defaults = PurgerConfig::default();
    Ok(PurgerConfig {
        db_path: raw.db_path.unwrap_or(defaults.db_path),
        purge_interval_secs: raw.purge_interval_secs.unwrap_or(defaults.purge_interval_secs),
        host_timeout_grace_secs: raw
            .host_timeout_grace_secs
            .unwrap_or(defaults.host_timeout_grace_secs),
        delete_batch: raw.delete_batch.unwrap_or(defaults.delete_batch),
        erase_batch: raw.erase_batch.unwrap_or(defaults.erase_batch),
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

// ---------------------------------------------------------------------------
// Purge cycle
// ---------------------------------------------------------------------------

/// What one cycle removed or repaired.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    pub refused_urls: usize,
    pub dns_urls: usize,
    pub dns_hosts: usize,
    pub reenabled_hosts: usize,
    pub erased_documents: usize,
}

/// Run one full purge cycle.
pub fn run_cycle(store: &mut Store, config: &PurgerConfig) -> StoreResult<PurgeReport> {
    let mut report = PurgeReport::default();

    loop {
        let deleted = store.purge_refused_urls(config.delete_batch)?;
        report.refused_urls += deleted;
        if deleted == 0 {
            break;
        }
    }

    loop {
        let deleted = store.purge_dns_disabled_urls(config.delete_batch)?;
        report.dns_urls += deleted;
        if deleted == 0 {
            break;
        }
    }
    report.dns_hosts = store.delete_dns_disabled_hosts()?;

    report.reenabled_hosts = store.reenable_timed_out_hosts(config.host_timeout_grace_secs)?;

    loop {
        let erased = store.erase_nonabc_documents(config.erase_batch)?;
        report.erased_documents += erased;
        if erased == 0 {
            break;
        }
    }

    Ok(report)
}

/// Main loop: one cycle per interval.
pub async fn run(config: PurgerConfig) -> StoreResult<()> {
    let mut store = Store::open(Path::new(&config.db_path))?;
    info!(interval = config.purge_interval_secs, "purger started");
    let mut ticker = tokio::time::interval(Duration::from_secs(config.purge_interval_secs));
    loop {
        ticker.tick().await;
        match run_cycle(&mut store, &config) {
            Ok(report) if report == PurgeReport::default() => {}
            Ok(report) => info!(?report, "purge cycle complete"),
            Err(e) => warn!(error = %e, "purge cycle failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawl_store::ERASED_SENTINEL;

    #[test]
    fn cycle_cleans_refused_dns_and_nonabc_rows() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .insert_seed_urls([
                "http://gone.example.com/a.html",
                "http://ok.example.com/page.html",
            ])
            .unwrap();
        store
            .insert_urls(["http://ok.example.com/junk.zip"], 1)
            .unwrap();
        store.add_refused_extension("zip", Some("binary")).unwrap();
        store.disable_host("gone.example.com", "dns").unwrap();
        store.disable_host("slow.example.com", "timeout").unwrap();
        store
            .connection()
            .execute(
                "UPDATE hosts SET disabled_at = datetime('now', '-172800 seconds')
                 WHERE host = 'slow.example.com'",
                [],
            )
            .unwrap();
        // ok.example.com/page.html was parsed and held no ABC.
        store
            .mark_url_fetched(2, 4, "text/html", b"body", Some(200))
            .unwrap();
        store.mark_url_parsed(2, false).unwrap();

        let report = run_cycle(&mut store, &PurgerConfig::default()).unwrap();
        assert_eq!(
            report,
            PurgeReport {
                refused_urls: 1,
                dns_urls: 1,
                dns_hosts: 1,
                reenabled_hosts: 1,
                erased_documents: 1,
            }
        );

        // The erased document carries the sentinel, and a second cycle is
        // a no-op.
        let doc = store
            .document_for_url("http://ok.example.com/page.html")
            .unwrap()
            .unwrap();
        assert_eq!(doc, ERASED_SENTINEL);
        let report = run_cycle(&mut store, &PurgerConfig::default()).unwrap();
        assert_eq!(report, PurgeReport::default());
    }

    #[test]
    fn indexed_abc_documents_are_untouched() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .insert_seed_urls(["http://tunes.example.com/book.abc"])
            .unwrap();
        store
            .mark_url_fetched(1, 10, "text/plain", b"X:1\nK:D\n", Some(200))
            .unwrap();
        store.mark_url_parsed(1, true).unwrap();

        let report = run_cycle(&mut store, &PurgerConfig::default()).unwrap();
        assert_eq!(report.erased_documents, 0);
        let doc = store
            .document_for_url("http://tunes.example.com/book.abc")
            .unwrap()
            .unwrap();
        assert_eq!(doc, b"X:1\nK:D\n");
    }
}
