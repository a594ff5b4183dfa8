//! Shared SQLite store for the crawl pipeline.
//!
//! One database holds the whole crawl state: urls, hosts, tunebooks, tunes,
//! the vector-index mapping, and the admin tables.  Every service opens its
//! own connection; WAL mode plus a generous busy timeout gives the required
//! multi-writer concurrency, and the dispatcher's claim operations run as
//! short `BEGIN IMMEDIATE` transactions so no two workers can win the same
//! row.
//!
//! # SQLite settings
//! Applied at open: WAL, synchronous=NORMAL, busy_timeout=30000.
//! `PRAGMA integrity_check` runs at open.  Foreign keys are declarative
//! only; row lifetimes are managed by the pipeline, not the engine.
//!
//! # Time
//! All timestamps are written and compared inside SQL (`datetime('now')`),
//! so the store is the single clock for cooldowns and claim timeouts.

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

mod hosts;
mod mappings;
mod search;
mod tunebooks;
mod urls;

pub use hosts::HostRecord;
pub use mappings::{FavoriteRecord, UnindexedTune};
pub use search::{TuneDetail, TuneFilters, TuneSearchHit, TuneSearchPage, TuneSearchQuery};
pub use tunebooks::{TuneMeta, TuneToIndex};
pub use urls::{ClaimSettings, ClaimedUrl, FailureOutcome, FetchedRow, UrlSnapshot};

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Sentinel written over `urls.document` once the purger erases a non-ABC
/// body.
pub const ERASED_SENTINEL: &[u8] = b"erased";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Integrity: {0}")]
    IntegrityCheckFailed(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A handle on the crawl database.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the store at `path`: pragmas, integrity check,
    /// schema.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Store { conn };
        store.apply_pragmas()?;
        store.integrity_check()?;
        store.apply_schema()?;
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Store { conn };
        store.apply_pragmas()?;
        store.apply_schema()?;
        Ok(store)
    }

    pub fn integrity_check(&self) -> StoreResult<()> {
        let result: String = self
            .conn
            .pragma_query_value(None, "integrity_check", |row| row.get(0))?;
        if result != "ok" {
            return Err(StoreError::IntegrityCheckFailed(result));
        }
        Ok(())
    }

    fn apply_pragmas(&self) -> StoreResult<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=30000;
             PRAGMA foreign_keys=OFF;",
        )?;
        Ok(())
    }

    fn apply_schema(&self) -> StoreResult<()> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Raw connection access for one-off queries in tests and tools.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Render a relative SQLite time modifier, e.g. `-120 seconds`.
pub(crate) fn seconds_ago(secs: u64) -> String {
    format!("-{secs} seconds")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_schema_and_seeds_mime_types() {
        let store = Store::open_in_memory().unwrap();
        let count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM mime_types WHERE enabled = 1", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawl.db");
        drop(Store::open(&path).unwrap());
        let store = Store::open(&path).unwrap();
        store.integrity_check().unwrap();
    }
}
