//! Vector-index mapping and admin tables.
//!
//! `faiss_mapping` ties each vector-index slot to its owning tune; slot ids
//! are assigned contiguously in insertion order, so the table row count
//! always equals the number of mapped vectors.  The MIME allowlist and
//! refused-extension set are small admin-edited tables the fetcher and
//! purger consult.

use rusqlite::{OptionalExtension, params};

use crate::{Store, StoreResult};

/// One user-favorite row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteRecord {
    pub user_id: String,
    pub tune_id: i64,
}

/// A tune with intervals but no vectors in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnindexedTune {
    pub id: i64,
    pub intervals: String,
}

impl Store {
    // -----------------------------------------------------------------------
    // faiss_mapping
    // -----------------------------------------------------------------------

    /// Number of mapped vector slots (== the next slot id to assign).
    pub fn faiss_mapping_count(&self) -> StoreResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM faiss_mapping", [], |row| row.get(0))?)
    }

    /// Insert mapping rows for slots `start_slot .. start_slot + n`, one per
    /// tune id, in a single transaction.
    ///
    /// Fails (and leaves no rows behind) if any slot is already mapped --
    /// the caller rolls its vector append back in that case.
    pub fn insert_faiss_mappings(
        &mut self,
        start_slot: i64,
        tune_ids: &[i64],
    ) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO faiss_mapping (faiss_id, tune_id) VALUES (?1, ?2)",
            )?;
            for (offset, tune_id) in tune_ids.iter().enumerate() {
                insert.execute(params![start_slot + offset as i64, tune_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// The tune owning a vector slot.
    pub fn tune_for_slot(&self, slot: i64) -> StoreResult<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT tune_id FROM faiss_mapping WHERE faiss_id = ?1",
                params![slot],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Tunes that carry intervals but have no vectors in the index yet
    /// (after a rebuild, or rows left behind by an interrupted run).
    pub fn tunes_missing_from_index(&self, limit: i64) -> StoreResult<Vec<UnindexedTune>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, intervals FROM tunes
             WHERE intervals IS NOT NULL AND intervals != ''
               AND id NOT IN (SELECT tune_id FROM faiss_mapping)
             ORDER BY id ASC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(UnindexedTune {
                id: row.get(0)?,
                intervals: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Drop every mapping row (index rebuild).  Returns the rows removed.
    pub fn clear_faiss_mappings(&mut self) -> StoreResult<usize> {
        Ok(self.conn.execute("DELETE FROM faiss_mapping", [])?)
    }

    // -----------------------------------------------------------------------
    // mime_types
    // -----------------------------------------------------------------------

    /// Enabled MIME patterns, `*` wildcards included.
    pub fn enabled_mime_patterns(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT pattern FROM mime_types WHERE enabled = 1")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Whether a MIME type matches any enabled pattern.  An empty pattern
    /// set allows nothing.
    pub fn is_mime_allowed(&self, mime_type: &str) -> StoreResult<bool> {
        let patterns = self.enabled_mime_patterns()?;
        Ok(patterns
            .iter()
            .any(|pattern| mime_pattern_matches(pattern, mime_type)))
    }

    // -----------------------------------------------------------------------
    // refused_extensions
    // -----------------------------------------------------------------------

    /// Add an extension (stored lowercased, without dot) to the refused set.
    pub fn add_refused_extension(
        &mut self,
        extension: &str,
        reason: Option<&str>,
    ) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO refused_extensions (extension, reason) VALUES (?1, ?2)",
            params![extension.to_ascii_lowercase(), reason],
        )?;
        Ok(())
    }

    pub fn remove_refused_extension(&mut self, extension: &str) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM refused_extensions WHERE extension = ?1",
            params![extension.to_ascii_lowercase()],
        )?;
        Ok(())
    }

    pub fn refused_extensions(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT extension FROM refused_extensions ORDER BY extension")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    // -----------------------------------------------------------------------
    // user_favorites
    // -----------------------------------------------------------------------

    pub fn add_favorite(&mut self, user_id: &str, tune_id: i64) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO user_favorites (user_id, tune_id) VALUES (?1, ?2)",
            params![user_id, tune_id],
        )?;
        Ok(())
    }

    pub fn remove_favorite(&mut self, user_id: &str, tune_id: i64) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM user_favorites WHERE user_id = ?1 AND tune_id = ?2",
            params![user_id, tune_id],
        )?;
        Ok(())
    }

    pub fn favorites_for_user(&self, user_id: &str) -> StoreResult<Vec<FavoriteRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, tune_id FROM user_favorites
             WHERE user_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(FavoriteRecord {
                user_id: row.get(0)?,
                tune_id: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }
}

/// Wildcard match: `*` spans any run of characters; everything else matches
/// literally.  `text/*` therefore accepts any `text/...` MIME type.
fn mime_pattern_matches(pattern: &str, mime_type: &str) -> bool {
    fn matches(p: &[u8], t: &[u8]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some(b'*') => {
                (0..=t.len()).any(|skip| matches(&p[1..], &t[skip..]))
            }
            Some(&c) => t.first() == Some(&c) && matches(&p[1..], &t[1..]),
        }
    }
    matches(pattern.as_bytes(), mime_type.as_bytes())
}
