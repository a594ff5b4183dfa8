//! URL table operations.
//!
//! The dispatcher owns every status transition of a url row; workers only
//! ever append new rows (link extraction) or read documents.  Claiming is a
//! `BEGIN IMMEDIATE` transaction with per-candidate conditional updates so
//! that concurrent handlers cannot both win the same row.

use rusqlite::{OptionalExtension, TransactionBehavior, params};
use url::Url;

use crate::{ERASED_SENTINEL, Store, StoreResult, seconds_ago};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Scheduling knobs for [`Store::claim_next_url`].
#[derive(Debug, Clone)]
pub struct ClaimSettings {
    /// Seconds after which a `dispatched` row becomes reclaimable.
    pub dispatch_timeout_secs: u64,
    /// Minimum seconds between two dispatches to the same host.
    pub host_cooldown_secs: u64,
    /// Rows at or above this retry count are never dispatched.
    pub max_retries: i64,
    /// Size of the candidate window scanned per claim attempt.
    pub candidate_window: i64,
}

impl Default for ClaimSettings {
    fn default() -> Self {
        ClaimSettings {
            dispatch_timeout_secs: 120,
            host_cooldown_secs: 30,
            max_retries: 3,
            candidate_window: 100,
        }
    }
}

/// A successfully claimed url row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedUrl {
    pub id: i64,
    pub url: String,
    pub link_distance: i64,
}

/// One row of a parser batch claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedRow {
    pub id: i64,
    pub url: String,
}

/// Result of recording a fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub retries: i64,
    /// True when the retry budget is exhausted and the row went to `error`.
    pub terminal: bool,
}

/// Read-only view of a url row, for tests and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlSnapshot {
    pub id: i64,
    pub url: String,
    pub host: Option<String>,
    pub status: String,
    pub dispatched_at: Option<String>,
    pub retries: i64,
    pub http_status: Option<i64>,
    pub has_abc: Option<bool>,
    pub link_distance: i64,
    pub url_extension: Option<String>,
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

impl Store {
    /// Insert URLs at the given link distance, deduplicating on the unique
    /// url column.  Non-http(s) URLs and URLs whose extension is refused are
    /// skipped.  Returns the number of rows actually inserted.
    pub fn insert_urls<'a, I>(&mut self, urls: I, link_distance: i64) -> StoreResult<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let tx = self.conn.transaction()?;
        let mut added = 0usize;
        {
            let mut refused = tx.prepare(
                "SELECT 1 FROM refused_extensions WHERE extension = ?1",
            )?;
            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO urls (url, host, link_distance, url_extension)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for raw in urls {
                let Ok(parsed) = Url::parse(raw) else {
                    continue;
                };
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    continue;
                }
                let host = parsed.host_str().map(str::to_owned);
                let extension = path_extension(&parsed);
                if !extension.is_empty() {
                    let hit: Option<i64> = refused
                        .query_row(params![extension], |row| row.get(0))
                        .optional()?;
                    if hit.is_some() {
                        continue;
                    }
                }
                let changed = insert.execute(params![
                    parsed.as_str(),
                    host,
                    link_distance,
                    extension,
                ])?;
                added += changed;
            }
        }
        tx.commit()?;
        Ok(added)
    }

    /// Insert seed URLs (link distance 0).
    pub fn insert_seed_urls<'a, I>(&mut self, urls: I) -> StoreResult<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.insert_urls(urls, 0)
    }

    // -----------------------------------------------------------------------
    // Claiming
    // -----------------------------------------------------------------------

    /// Atomically claim the next dispatchable URL.
    ///
    /// Candidates are new rows (or timed-out `dispatched` rows) under the
    /// retry budget whose host is enabled and outside its cooldown window.
    /// `.abc` URLs are preferred, then oldest first.  The winning row moves
    /// to `dispatched` and its host's cooldown window is reserved in the
    /// same transaction.
    pub fn claim_next_url(
        &mut self,
        settings: &ClaimSettings,
    ) -> StoreResult<Option<ClaimedUrl>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let candidates: Vec<(i64, String, Option<String>, i64)> = {
            let mut stmt = tx.prepare(
                "SELECT u.id, u.url, u.host, COALESCE(u.link_distance, 0)
                 FROM urls u
                 LEFT JOIN hosts h ON u.host = h.host
                 WHERE (u.status = ''
                        OR (u.status = 'dispatched'
                            AND u.dispatched_at <= datetime('now', ?1)))
                   AND COALESCE(u.retries, 0) < ?2
                   AND COALESCE(h.disabled, 0) = 0
                   AND (h.last_access IS NULL
                        OR h.last_access <= datetime('now', ?3))
                 ORDER BY (u.url LIKE '%.abc') DESC, u.created_at ASC
                 LIMIT ?4",
            )?;
            let rows = stmt.query_map(
                params![
                    seconds_ago(settings.dispatch_timeout_secs),
                    settings.max_retries,
                    seconds_ago(settings.host_cooldown_secs),
                    settings.candidate_window,
                ],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                    ))
                },
            )?;
            rows.collect::<Result<_, _>>()?
        };

        for (id, url, host, link_distance) in candidates {
            let claimed = tx.execute(
                "UPDATE urls
                 SET status = 'dispatched', dispatched_at = datetime('now')
                 WHERE id = ?1 AND status IN ('', 'dispatched')",
                params![id],
            )?;
            if claimed == 0 {
                continue;
            }
            // Reserve the host's cooldown window as part of the claim.
            if let Some(host) = host {
                tx.execute(
                    "INSERT OR IGNORE INTO hosts (host, downloads) VALUES (?1, 0)",
                    params![host],
                )?;
                tx.execute(
                    "UPDATE hosts SET last_access = datetime('now') WHERE host = ?1",
                    params![host],
                )?;
            }
            tx.commit()?;
            return Ok(Some(ClaimedUrl {
                id,
                url,
                link_distance,
            }));
        }

        tx.commit()?;
        Ok(None)
    }

    /// Batch-claim fetched rows for parsing: up to `batch_size` rows in
    /// `fetched` state, plus `parsing` rows whose claim aged out.
    pub fn claim_fetched_batch(
        &mut self,
        batch_size: i64,
        parse_timeout_secs: u64,
    ) -> StoreResult<Vec<FetchedRow>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let rows: Vec<FetchedRow> = {
            let mut stmt = tx.prepare(
                "SELECT id, url
                 FROM urls
                 WHERE status = 'fetched'
                    OR (status = 'parsing'
                        AND (dispatched_at IS NULL
                             OR dispatched_at <= datetime('now', ?1)))
                 LIMIT ?2",
            )?;
            let mapped = stmt.query_map(
                params![seconds_ago(parse_timeout_secs), batch_size],
                |row| {
                    Ok(FetchedRow {
                        id: row.get(0)?,
                        url: row.get(1)?,
                    })
                },
            )?;
            mapped.collect::<Result<_, _>>()?
        };

        for row in &rows {
            tx.execute(
                "UPDATE urls
                 SET status = 'parsing', dispatched_at = datetime('now')
                 WHERE id = ?1",
                params![row.id],
            )?;
        }
        tx.commit()?;
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // Outcome commits
    // -----------------------------------------------------------------------

    /// Commit a successful fetch: store the payload, reset retries, move to
    /// `fetched`, and touch the host (status + download counter).
    pub fn mark_url_fetched(
        &mut self,
        url_id: i64,
        size_bytes: i64,
        mime_type: &str,
        document: &[u8],
        http_status: Option<u16>,
    ) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE urls
             SET downloaded_at = datetime('now'),
                 size_bytes = ?1,
                 mime_type = ?2,
                 document = ?3,
                 http_status = ?4,
                 retries = 0,
                 status = 'fetched',
                 dispatched_at = NULL
             WHERE id = ?5",
            params![size_bytes, mime_type, document, http_status, url_id],
        )?;
        let host: Option<String> = tx
            .query_row(
                "SELECT host FROM urls WHERE id = ?1",
                params![url_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        if let Some(host) = host {
            tx.execute(
                "INSERT OR IGNORE INTO hosts (host, downloads) VALUES (?1, 0)",
                params![host],
            )?;
            tx.execute(
                "UPDATE hosts
                 SET last_access = datetime('now'),
                     last_http_status = ?1,
                     downloads = COALESCE(downloads, 0) + 1
                 WHERE host = ?2",
                params![http_status, host],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Commit a failed fetch: bump retries, then either reset the row for
    /// another attempt or park it in `error` once the budget is exhausted.
    pub fn record_fetch_failure(
        &mut self,
        url_id: i64,
        http_status: Option<u16>,
        max_retries: i64,
    ) -> StoreResult<FailureOutcome> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE urls SET retries = COALESCE(retries, 0) + 1 WHERE id = ?1",
            params![url_id],
        )?;
        let retries: i64 = tx.query_row(
            "SELECT retries FROM urls WHERE id = ?1",
            params![url_id],
            |row| row.get(0),
        )?;
        let terminal = retries >= max_retries;
        if terminal {
            tx.execute(
                "UPDATE urls
                 SET status = 'error',
                     downloaded_at = datetime('now'),
                     http_status = ?1,
                     dispatched_at = NULL
                 WHERE id = ?2",
                params![http_status, url_id],
            )?;
        } else {
            tx.execute(
                "UPDATE urls
                 SET status = '', http_status = ?1, dispatched_at = NULL
                 WHERE id = ?2",
                params![http_status, url_id],
            )?;
        }
        tx.commit()?;
        Ok(FailureOutcome { retries, terminal })
    }

    /// Commit a parse outcome: the row becomes `parsed` and records whether
    /// any ABC was found.
    pub fn mark_url_parsed(&mut self, url_id: i64, has_abc: bool) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE urls
             SET status = 'parsed', has_abc = ?1, dispatched_at = NULL
             WHERE id = ?2",
            params![has_abc, url_id],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Recovery
    // -----------------------------------------------------------------------

    /// Return in-flight url rows older than `horizon_secs` to their
    /// predecessor states (`dispatched` -> `''`, `parsing` -> `fetched`).
    /// Rows with no `dispatched_at` at all are treated as stale too.
    ///
    /// Returns the number of rows recovered.
    pub fn reset_stale_url_claims(&mut self, horizon_secs: u64) -> StoreResult<usize> {
        let horizon = seconds_ago(horizon_secs);
        let tx = self.conn.transaction()?;
        let mut count = tx.execute(
            "UPDATE urls
             SET status = '', dispatched_at = NULL
             WHERE status = 'dispatched'
               AND (dispatched_at IS NULL OR dispatched_at <= datetime('now', ?1))",
            params![horizon],
        )?;
        count += tx.execute(
            "UPDATE urls
             SET status = 'fetched', dispatched_at = NULL
             WHERE status = 'parsing'
               AND (dispatched_at IS NULL OR dispatched_at <= datetime('now', ?1))",
            params![horizon],
        )?;
        tx.commit()?;
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// The stored document body for a url, if any.
    pub fn document_for_url(&self, url: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .conn
            .query_row(
                "SELECT document FROM urls WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?
            .flatten())
    }

    /// The host column of a url row.
    pub fn url_host(&self, url_id: i64) -> StoreResult<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT host FROM urls WHERE id = ?1",
                params![url_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten())
    }

    /// Full row snapshot, for tests and diagnostics.
    pub fn url_snapshot(&self, url_id: i64) -> StoreResult<Option<UrlSnapshot>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, url, host, status, dispatched_at, COALESCE(retries, 0),
                        http_status, has_abc, COALESCE(link_distance, 0), url_extension
                 FROM urls WHERE id = ?1",
                params![url_id],
                |row| {
                    Ok(UrlSnapshot {
                        id: row.get(0)?,
                        url: row.get(1)?,
                        host: row.get(2)?,
                        status: row.get(3)?,
                        dispatched_at: row.get(4)?,
                        retries: row.get(5)?,
                        http_status: row.get(6)?,
                        has_abc: row.get(7)?,
                        link_distance: row.get(8)?,
                        url_extension: row.get(9)?,
                    })
                },
            )
            .optional()?)
    }

    // -----------------------------------------------------------------------
    // Purging
    // -----------------------------------------------------------------------

    /// Delete up to `limit` urls whose extension is refused.
    pub fn purge_refused_urls(&mut self, limit: i64) -> StoreResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM urls
             WHERE id IN (
                 SELECT id FROM urls
                 WHERE url_extension IN (SELECT extension FROM refused_extensions)
                 LIMIT ?1
             )",
            params![limit],
        )?;
        Ok(deleted)
    }

    /// Delete up to `limit` urls belonging to hosts disabled for DNS
    /// failures.
    pub fn purge_dns_disabled_urls(&mut self, limit: i64) -> StoreResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM urls
             WHERE id IN (
                 SELECT id FROM urls
                 WHERE host IN (SELECT host FROM hosts
                                WHERE disabled = 1 AND disabled_reason = 'dns')
                 LIMIT ?1
             )",
            params![limit],
        )?;
        Ok(deleted)
    }

    /// Overwrite the document of up to `limit` parsed, ABC-free rows with
    /// the erasure sentinel and zero their size.
    pub fn erase_nonabc_documents(&mut self, limit: i64) -> StoreResult<usize> {
        let erased = self.conn.execute(
            "UPDATE urls
             SET document = ?1, size_bytes = 0
             WHERE id IN (
                 SELECT id FROM urls
                 WHERE status = 'parsed'
                   AND COALESCE(has_abc, 0) = 0
                   AND document IS NOT NULL
                   AND document != ?1
                 LIMIT ?2
             )",
            params![ERASED_SENTINEL, limit],
        )?;
        Ok(erased)
    }
}

/// Lowercased, dot-free extension of the URL path ('' when absent).
fn path_extension(url: &Url) -> String {
    let path = url.path();
    let last_segment = path.rsplit('/').next().unwrap_or("");
    match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store(urls: &[&str]) -> Store {
        let mut store = Store::open_in_memory().unwrap();
        store.insert_seed_urls(urls.iter().copied()).unwrap();
        store
    }

    fn quick_claim() -> ClaimSettings {
        ClaimSettings {
            dispatch_timeout_secs: 120,
            host_cooldown_secs: 0,
            max_retries: 3,
            candidate_window: 100,
        }
    }

    #[test]
    fn insert_extracts_host_and_extension() {
        let store = seeded_store(&["http://tunes.example.com/books/session.ABC"]);
        let snap = store.url_snapshot(1).unwrap().unwrap();
        assert_eq!(snap.host.as_deref(), Some("tunes.example.com"));
        assert_eq!(snap.url_extension.as_deref(), Some("abc"));
        assert_eq!(snap.status, "");
        assert_eq!(snap.link_distance, 0);
    }

    #[test]
    fn insert_dedupes_and_rejects_non_http() {
        let mut store = Store::open_in_memory().unwrap();
        let added = store
            .insert_seed_urls([
                "http://a.example.com/x",
                "http://a.example.com/x",
                "ftp://a.example.com/y",
                "not a url",
            ])
            .unwrap();
        assert_eq!(added, 1);
    }

    #[test]
    fn insert_skips_refused_extensions() {
        let mut store = Store::open_in_memory().unwrap();
        store.add_refused_extension("pdf", Some("binary")).unwrap();
        let added = store
            .insert_seed_urls(["http://a.example.com/doc.pdf", "http://a.example.com/t.abc"])
            .unwrap();
        assert_eq!(added, 1);
    }

    #[test]
    fn claim_prefers_abc_extension_then_age() {
        let mut store = seeded_store(&[
            "http://a.example.com/page.html",
            "http://b.example.com/tune.abc",
        ]);
        let claimed = store.claim_next_url(&quick_claim()).unwrap().unwrap();
        assert_eq!(claimed.url, "http://b.example.com/tune.abc");
    }

    #[test]
    fn claim_sets_dispatched_at_and_reserves_host() {
        let mut store = seeded_store(&["http://a.example.com/x"]);
        let claimed = store.claim_next_url(&quick_claim()).unwrap().unwrap();
        let snap = store.url_snapshot(claimed.id).unwrap().unwrap();
        assert_eq!(snap.status, "dispatched");
        assert!(snap.dispatched_at.is_some());
        let host = store.host_record("a.example.com").unwrap().unwrap();
        assert!(host.last_access.is_some());
    }

    #[test]
    fn claim_respects_host_cooldown() {
        let mut store = seeded_store(&[
            "http://same.example.com/one",
            "http://same.example.com/two",
        ]);
        let settings = ClaimSettings {
            host_cooldown_secs: 3600,
            ..quick_claim()
        };
        assert!(store.claim_next_url(&settings).unwrap().is_some());
        // Same host is now inside its cooldown window.
        assert!(store.claim_next_url(&settings).unwrap().is_none());
    }

    #[test]
    fn claim_skips_disabled_hosts() {
        let mut store = seeded_store(&["http://bad.example.com/x"]);
        store.disable_host("bad.example.com", "dns").unwrap();
        assert!(store.claim_next_url(&quick_claim()).unwrap().is_none());
    }

    #[test]
    fn claim_skips_exhausted_rows() {
        let mut store = seeded_store(&["http://a.example.com/x"]);
        store
            .connection()
            .execute("UPDATE urls SET retries = 3", [])
            .unwrap();
        assert!(store.claim_next_url(&quick_claim()).unwrap().is_none());
    }

    #[test]
    fn timed_out_dispatch_is_reclaimable() {
        let mut store = seeded_store(&["http://a.example.com/x"]);
        let first = store.claim_next_url(&quick_claim()).unwrap().unwrap();
        // Claim is fresh: not reclaimable.
        assert!(store.claim_next_url(&quick_claim()).unwrap().is_none());
        // Age the claim past the dispatch timeout.
        store
            .connection()
            .execute(
                "UPDATE urls SET dispatched_at = datetime('now', '-600 seconds')",
                [],
            )
            .unwrap();
        let second = store.claim_next_url(&quick_claim()).unwrap().unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn mark_fetched_resets_retries_and_counts_download() {
        let mut store = seeded_store(&["http://a.example.com/x"]);
        let claimed = store.claim_next_url(&quick_claim()).unwrap().unwrap();
        store
            .mark_url_fetched(claimed.id, 5, "text/html", b"hello", Some(200))
            .unwrap();
        let snap = store.url_snapshot(claimed.id).unwrap().unwrap();
        assert_eq!(snap.status, "fetched");
        assert_eq!(snap.retries, 0);
        assert_eq!(snap.dispatched_at, None);
        assert_eq!(snap.http_status, Some(200));
        let host = store.host_record("a.example.com").unwrap().unwrap();
        assert_eq!(host.downloads, 1);
        assert_eq!(host.last_http_status, Some(200));
    }

    #[test]
    fn failure_resets_until_budget_then_goes_terminal() {
        let mut store = seeded_store(&["http://a.example.com/x"]);
        let claimed = store.claim_next_url(&quick_claim()).unwrap().unwrap();

        let first = store
            .record_fetch_failure(claimed.id, Some(500), 3)
            .unwrap();
        assert_eq!(first, FailureOutcome { retries: 1, terminal: false });
        assert_eq!(store.url_snapshot(claimed.id).unwrap().unwrap().status, "");

        store.record_fetch_failure(claimed.id, Some(500), 3).unwrap();
        let third = store
            .record_fetch_failure(claimed.id, Some(500), 3)
            .unwrap();
        assert_eq!(third, FailureOutcome { retries: 3, terminal: true });
        assert_eq!(
            store.url_snapshot(claimed.id).unwrap().unwrap().status,
            "error"
        );
    }

    #[test]
    fn fetched_batch_moves_rows_to_parsing() {
        let mut store = seeded_store(&[
            "http://a.example.com/one",
            "http://b.example.com/two",
        ]);
        store
            .connection()
            .execute("UPDATE urls SET status = 'fetched'", [])
            .unwrap();
        let batch = store.claim_fetched_batch(50, 300).unwrap();
        assert_eq!(batch.len(), 2);
        for row in &batch {
            let snap = store.url_snapshot(row.id).unwrap().unwrap();
            assert_eq!(snap.status, "parsing");
            assert!(snap.dispatched_at.is_some());
        }
        // Fresh parsing claims are not handed out again.
        assert!(store.claim_fetched_batch(50, 300).unwrap().is_empty());
    }

    #[test]
    fn stale_claims_return_to_predecessor_states() {
        let mut store = seeded_store(&[
            "http://a.example.com/one",
            "http://b.example.com/two",
        ]);
        store
            .connection()
            .execute(
                "UPDATE urls SET status = 'dispatched',
                                 dispatched_at = datetime('now', '-600 seconds')
                 WHERE id = 1",
                [],
            )
            .unwrap();
        store
            .connection()
            .execute(
                "UPDATE urls SET status = 'parsing', dispatched_at = NULL WHERE id = 2",
                [],
            )
            .unwrap();

        let recovered = store.reset_stale_url_claims(300).unwrap();
        assert_eq!(recovered, 2);
        assert_eq!(store.url_snapshot(1).unwrap().unwrap().status, "");
        assert_eq!(store.url_snapshot(2).unwrap().unwrap().status, "fetched");
    }

    #[test]
    fn erase_nonabc_documents_is_idempotent() {
        let mut store = seeded_store(&["http://a.example.com/x"]);
        store
            .connection()
            .execute(
                "UPDATE urls SET status = 'parsed', has_abc = 0,
                                 document = X'AABB', size_bytes = 2",
                [],
            )
            .unwrap();
        assert_eq!(store.erase_nonabc_documents(200).unwrap(), 1);
        assert_eq!(store.erase_nonabc_documents(200).unwrap(), 0);
        let doc = store
            .document_for_url("http://a.example.com/x")
            .unwrap()
            .unwrap();
        assert_eq!(doc, ERASED_SENTINEL);
    }

    #[test]
    fn purge_deletes_refused_and_dns_disabled_urls() {
        let mut store = seeded_store(&["http://bad.example.com/x"]);
        store
            .insert_urls(["http://a.example.com/junk.zip"], 1)
            .unwrap();
        store.add_refused_extension("zip", None).unwrap();
        store.disable_host("bad.example.com", "dns").unwrap();

        assert_eq!(store.purge_refused_urls(500).unwrap(), 1);
        assert_eq!(store.purge_dns_disabled_urls(500).unwrap(), 1);
        let remaining: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM urls", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
