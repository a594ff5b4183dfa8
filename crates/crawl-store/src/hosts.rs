//! Host registry operations.
//!
//! One row per hostname carries the politeness clock (`last_access`), the
//! download counter, and the disable flag.  Disable reasons are `dns`
//! (deterministic, stays until an admin or the purger clears the host) and
//! `timeout` (auto-cleared after a grace period).

use rusqlite::{OptionalExtension, params};

use crate::{Store, StoreResult, seconds_ago};

/// Read-only view of a host row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    pub host: String,
    pub last_access: Option<String>,
    pub last_http_status: Option<i64>,
    pub downloads: i64,
    pub disabled: bool,
    pub disabled_reason: Option<String>,
    pub disabled_at: Option<String>,
}

impl Store {
    /// Upsert a host and stamp `last_access`; optionally record the HTTP
    /// status and bump the download counter.
    pub fn touch_host(
        &mut self,
        host: &str,
        http_status: Option<u16>,
        count_download: bool,
    ) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO hosts (host, downloads) VALUES (?1, 0)",
            params![host],
        )?;
        if count_download {
            tx.execute(
                "UPDATE hosts
                 SET last_access = datetime('now'),
                     last_http_status = COALESCE(?1, last_http_status),
                     downloads = COALESCE(downloads, 0) + 1
                 WHERE host = ?2",
                params![http_status, host],
            )?;
        } else {
            tx.execute(
                "UPDATE hosts
                 SET last_access = datetime('now'),
                     last_http_status = COALESCE(?1, last_http_status)
                 WHERE host = ?2",
                params![http_status, host],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Disable a host.  `reason` is `dns` or `timeout`.  Idempotent; also
    /// stamps `last_access` so the host does not become instantly eligible
    /// when re-enabled.
    pub fn disable_host(&mut self, host: &str, reason: &str) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO hosts (host, downloads) VALUES (?1, 0)",
            params![host],
        )?;
        tx.execute(
            "UPDATE hosts
             SET disabled = 1,
                 disabled_reason = ?1,
                 disabled_at = datetime('now'),
                 last_access = datetime('now')
             WHERE host = ?2",
            params![reason, host],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Clear the disable flag of a host (admin operation).
    pub fn enable_host(&mut self, host: &str) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE hosts
             SET disabled = 0, disabled_reason = NULL, disabled_at = NULL
             WHERE host = ?1",
            params![host],
        )?;
        Ok(())
    }

    /// Re-enable hosts disabled for `timeout` longer than `grace_secs` ago.
    /// Returns the number of hosts re-enabled.
    pub fn reenable_timed_out_hosts(&mut self, grace_secs: u64) -> StoreResult<usize> {
        let count = self.conn.execute(
            "UPDATE hosts
             SET disabled = 0, disabled_reason = NULL
             WHERE disabled = 1
               AND disabled_reason = 'timeout'
               AND disabled_at <= datetime('now', ?1)",
            params![seconds_ago(grace_secs)],
        )?;
        Ok(count)
    }

    /// Delete host rows disabled for DNS failures (purger companion to
    /// [`Store::purge_dns_disabled_urls`]).
    pub fn delete_dns_disabled_hosts(&mut self) -> StoreResult<usize> {
        let count = self.conn.execute(
            "DELETE FROM hosts WHERE disabled = 1 AND disabled_reason = 'dns'",
            [],
        )?;
        Ok(count)
    }

    /// Whether a host may be dispatched to right now: row absent, or
    /// enabled with `last_access` null or outside the cooldown window.
    pub fn is_host_eligible(&self, host: &str, cooldown_secs: u64) -> StoreResult<bool> {
        let row: Option<(bool, Option<String>)> = self
            .conn
            .query_row(
                "SELECT COALESCE(disabled, 0),
                        CASE WHEN last_access IS NULL
                                  OR last_access <= datetime('now', ?1)
                             THEN NULL ELSE last_access END
                 FROM hosts WHERE host = ?2",
                params![seconds_ago(cooldown_secs), host],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        Ok(match row {
            None => true,
            Some((disabled, within_cooldown)) => !disabled && within_cooldown.is_none(),
        })
    }

    /// Full host row, for tests and diagnostics.
    pub fn host_record(&self, host: &str) -> StoreResult<Option<HostRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT host, last_access, last_http_status, COALESCE(downloads, 0),
                        COALESCE(disabled, 0), disabled_reason, disabled_at
                 FROM hosts WHERE host = ?1",
                params![host],
                |row| {
                    Ok(HostRecord {
                        host: row.get(0)?,
                        last_access: row.get(1)?,
                        last_http_status: row.get(2)?,
                        downloads: row.get(3)?,
                        disabled: row.get(4)?,
                        disabled_reason: row.get(5)?,
                        disabled_at: row.get(6)?,
                    })
                },
            )
            .optional()?)
    }
}
