//! Tunebook and tune table operations.
//!
//! Tunebook rows are created by the parser worker (unique by url) and only
//! ever change status afterwards; tune rows are append-only except for the
//! intervals column the indexer fills in.

use rusqlite::{OptionalExtension, TransactionBehavior, params};

use abc_core::TunebookRecord;

use crate::{Store, StoreResult, seconds_ago};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A tune the indexer needs to process: id plus its stored pitch text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuneToIndex {
    pub id: i64,
    pub pitches: Option<String>,
}

/// Metadata attached to similarity results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuneMeta {
    pub id: i64,
    pub title: Option<String>,
    pub key: Option<String>,
    pub rhythm: Option<String>,
    pub composer: Option<String>,
    pub intervals: Option<String>,
}

// ---------------------------------------------------------------------------
// Persistence (parser side)
// ---------------------------------------------------------------------------

impl Store {
    /// Persist a decomposed tunebook: upsert the tunebook row by url and
    /// append its tunes.  Returns the tunebook id.
    pub fn save_tunebook(&mut self, url: &str, book: &TunebookRecord) -> StoreResult<i64> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO tunebooks (url) VALUES (?1)",
            params![url],
        )?;
        let tunebook_id: i64 = tx.query_row(
            "SELECT id FROM tunebooks WHERE url = ?1",
            params![url],
            |row| row.get(0),
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO tunes (
                     tunebook_id, reference_number, title, composer, origin, area,
                     meter, unit_note_length, tempo, parts, transcription, notes,
                     \"group\", history, key, rhythm, book, discography, source,
                     instruction, tune_body, pitches, status, skip_reason
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                           ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
            )?;
            for tune in &book.tunes {
                let h = &tune.headers;
                insert.execute(params![
                    tunebook_id,
                    h.reference_number,
                    h.title,
                    h.composer,
                    h.origin,
                    h.area,
                    h.meter,
                    h.unit_note_length,
                    h.tempo,
                    h.parts,
                    h.transcription,
                    h.notes,
                    h.group,
                    h.history,
                    h.key,
                    h.rhythm,
                    h.book,
                    h.discography,
                    h.source,
                    h.instruction,
                    tune.tune_body,
                    join_pitches(&tune.pitches),
                    tune.status.as_str(),
                    tune.skip_reason.map(|r| r.as_str()),
                ])?;
            }
        }
        tx.commit()?;
        Ok(tunebook_id)
    }

    // -----------------------------------------------------------------------
    // Claiming (dispatcher side)
    // -----------------------------------------------------------------------

    /// Claim the oldest tunebook that needs indexing: status `''`, or
    /// `indexing` with an aged-out claim.  The winner moves to `indexing`.
    pub fn claim_next_tunebook(
        &mut self,
        index_timeout_secs: u64,
    ) -> StoreResult<Option<i64>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let id: Option<i64> = tx
            .query_row(
                "SELECT id FROM tunebooks
                 WHERE status = ''
                    OR (status = 'indexing'
                        AND (dispatched_at IS NULL
                             OR dispatched_at <= datetime('now', ?1)))
                 ORDER BY created_at ASC
                 LIMIT 1",
                params![seconds_ago(index_timeout_secs)],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = id {
            tx.execute(
                "UPDATE tunebooks
                 SET status = 'indexing', dispatched_at = datetime('now')
                 WHERE id = ?1",
                params![id],
            )?;
        }
        tx.commit()?;
        Ok(id)
    }

    /// Commit an indexing outcome.  Success flips the tunebook to `indexed`
    /// and synchronizes the owning url row; failure parks it in `error`.
    pub fn mark_tunebook_indexed(&mut self, tunebook_id: i64, success: bool) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        let status = if success { "indexed" } else { "error" };
        tx.execute(
            "UPDATE tunebooks SET status = ?1, dispatched_at = NULL WHERE id = ?2",
            params![status, tunebook_id],
        )?;
        if success {
            tx.execute(
                "UPDATE urls
                 SET status = 'indexed'
                 WHERE url = (SELECT url FROM tunebooks WHERE id = ?1)",
                params![tunebook_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Return `indexing` tunebooks older than `horizon_secs` to `''`.
    pub fn reset_stale_tunebook_claims(&mut self, horizon_secs: u64) -> StoreResult<usize> {
        let count = self.conn.execute(
            "UPDATE tunebooks
             SET status = '', dispatched_at = NULL
             WHERE status = 'indexing'
               AND (dispatched_at IS NULL OR dispatched_at <= datetime('now', ?1))",
            params![seconds_ago(horizon_secs)],
        )?;
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Indexer and similarity reads
    // -----------------------------------------------------------------------

    /// All parsed tunes of a tunebook, with their pitch text.
    pub fn parsed_tunes_for_tunebook(
        &self,
        tunebook_id: i64,
    ) -> StoreResult<Vec<TuneToIndex>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, pitches FROM tunes
             WHERE tunebook_id = ?1 AND status = 'parsed'
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![tunebook_id], |row| {
            Ok(TuneToIndex {
                id: row.get(0)?,
                pitches: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Persist the computed interval text for a tune.
    pub fn set_tune_intervals(&mut self, tune_id: i64, intervals: &str) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE tunes SET intervals = ?1 WHERE id = ?2",
            params![intervals, tune_id],
        )?;
        Ok(())
    }

    /// The interval text of one tune (None when the row or the column is
    /// absent).
    pub fn tune_intervals(&self, tune_id: i64) -> StoreResult<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT intervals FROM tunes WHERE id = ?1",
                params![tune_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten())
    }

    /// Metadata (plus intervals) for a set of candidate tunes.
    pub fn tunes_meta(&self, tune_ids: &[i64]) -> StoreResult<Vec<TuneMeta>> {
        let mut out = Vec::with_capacity(tune_ids.len());
        let mut stmt = self.conn.prepare(
            "SELECT id, title, key, rhythm, composer, intervals
             FROM tunes WHERE id = ?1",
        )?;
        for &id in tune_ids {
            let meta = stmt
                .query_row(params![id], |row| {
                    Ok(TuneMeta {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        key: row.get(2)?,
                        rhythm: row.get(3)?,
                        composer: row.get(4)?,
                        intervals: row.get(5)?,
                    })
                })
                .optional()?;
            if let Some(meta) = meta {
                out.push(meta);
            }
        }
        Ok(out)
    }

    /// Tunebook status, for tests and diagnostics.
    pub fn tunebook_status(&self, tunebook_id: i64) -> StoreResult<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT status FROM tunebooks WHERE id = ?1",
                params![tunebook_id],
                |row| row.get(0),
            )
            .optional()?)
    }
}

/// Pitches are stored as comma-joined text, e.g. `60, 62, 64`.
fn join_pitches(pitches: &[i32]) -> String {
    pitches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
