//! Fetcher-log DNS scanner.
//!
//! DNS failures are deterministic, so a host that failed to resolve is
//! disabled before a single further dispatch.  The scanner tails the
//! fetcher log for the resolution-failure token, tracking its read offset
//! across rounds and starting over when the file rotates (shrinks).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::{info, warn};

use crate::config::DispatcherConfig;
use crate::server::SharedStore;

static DNS_FAILURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)failed to resolve '([^']+)'").expect("static pattern compiles")
});

/// Incremental tailer over the fetcher log.
pub struct LogScanner {
    path: PathBuf,
    pos: u64,
}

impl LogScanner {
    pub fn new(path: &Path) -> Self {
        LogScanner {
            path: path.to_owned(),
            pos: 0,
        }
    }

    /// Read everything appended since the last scan and return the hosts
    /// named in DNS-failure lines.  An absent file yields nothing.
    pub fn scan(&mut self) -> std::io::Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();
        if len < self.pos {
            // Rotated: start over from the top.
            self.pos = 0;
        }
        file.seek(SeekFrom::Start(self.pos))?;
        let mut data = String::new();
        file.read_to_string(&mut data)?;
        self.pos += data.len() as u64;

        Ok(DNS_FAILURE
            .captures_iter(&data)
            .map(|caps| caps[1].to_owned())
            .collect())
    }
}

/// Background task: scan periodically and disable matched hosts with
/// reason `dns`.
pub async fn run(store: SharedStore, config: Arc<DispatcherConfig>) {
    let mut scanner = LogScanner::new(Path::new(&config.maintenance.fetcher_log_path));
    let mut ticker = tokio::time::interval(Duration::from_secs(
        config.maintenance.log_scan_interval_secs,
    ));
    loop {
        ticker.tick().await;
        let hosts = match scanner.scan() {
            Ok(hosts) => hosts,
            Err(e) => {
                warn!(error = %e, "log scan failed");
                continue;
            }
        };
        if hosts.is_empty() {
            continue;
        }
        let mut store = store.lock().await;
        let mut disabled = 0usize;
        for host in &hosts {
            match store.disable_host(host, "dns") {
                Ok(()) => disabled += 1,
                Err(e) => warn!(host, error = %e, "disable failed"),
            }
        }
        info!(disabled, "log scanner disabled hosts (dns)");
    }
}
