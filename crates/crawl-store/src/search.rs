//! Metadata search and tune detail reads.
//!
//! These are the read contracts the public search surface consumes: a
//! filtered, paginated tune search, the distinct-value lists behind the
//! filter dropdowns, and a full tune detail with its ABC text
//! reconstructed from the stored header columns.

use rusqlite::{OptionalExtension, ToSql, params};

use crate::{Store, StoreResult};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Filters for [`Store::search_tunes`].  Empty/None fields do not
/// constrain the search.
#[derive(Debug, Clone, Default)]
pub struct TuneSearchQuery {
    /// Free-text term matched against title, composer, and notes (and the
    /// tune id when numeric).
    pub text: Option<String>,
    pub title: Option<String>,
    pub key: Option<String>,
    pub rhythm: Option<String>,
    pub meter: Option<String>,
    pub composer: Option<String>,
    /// Tune status filter; defaults to `parsed` when unset.
    pub status: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuneSearchHit {
    pub id: i64,
    pub title: Option<String>,
    pub key: Option<String>,
    pub rhythm: Option<String>,
    pub meter: Option<String>,
    pub composer: Option<String>,
    pub status: String,
    pub skip_reason: Option<String>,
    pub source_url: String,
}

/// A search result page with the unpaginated total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuneSearchPage {
    pub hits: Vec<TuneSearchHit>,
    pub total: i64,
}

/// Distinct values feeding the search filter dropdowns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuneFilters {
    pub keys: Vec<String>,
    pub rhythms: Vec<String>,
    pub meters: Vec<String>,
}

/// Full detail for one tune, including reconstructed ABC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuneDetail {
    pub id: i64,
    pub title: Option<String>,
    pub key: Option<String>,
    pub rhythm: Option<String>,
    pub composer: Option<String>,
    pub meter: Option<String>,
    pub tempo: Option<String>,
    pub reference_number: Option<String>,
    pub history: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub skip_reason: Option<String>,
    pub source_url: String,
    /// Header lines plus body, in canonical ABC order (`K:` last).
    pub abc: String,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl Store {
    /// Filtered, paginated tune search ordered by title.
    pub fn search_tunes(&self, query: &TuneSearchQuery) -> StoreResult<TuneSearchPage> {
        let mut sql = String::from(
            "FROM tunes t JOIN tunebooks tb ON t.tunebook_id = tb.id WHERE 1=1",
        );
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(text) = non_empty(&query.text) {
            let like = format!("%{text}%");
            if text.chars().all(|c| c.is_ascii_digit()) {
                sql.push_str(
                    " AND (t.title LIKE ? OR t.composer LIKE ? OR t.notes LIKE ? OR t.id = ?)",
                );
                args.push(Box::new(like.clone()));
                args.push(Box::new(like.clone()));
                args.push(Box::new(like));
                args.push(Box::new(text.to_owned()));
            } else {
                sql.push_str(" AND (t.title LIKE ? OR t.composer LIKE ? OR t.notes LIKE ?)");
                args.push(Box::new(like.clone()));
                args.push(Box::new(like.clone()));
                args.push(Box::new(like));
            }
        }
        if let Some(title) = non_empty(&query.title) {
            sql.push_str(" AND t.title LIKE ?");
            args.push(Box::new(format!("%{title}%")));
        }
        if let Some(key) = non_empty(&query.key) {
            sql.push_str(" AND t.key = ?");
            args.push(Box::new(key.to_owned()));
        }
        if let Some(rhythm) = non_empty(&query.rhythm) {
            sql.push_str(" AND t.rhythm = ?");
            args.push(Box::new(rhythm.to_owned()));
        }
        if let Some(meter) = non_empty(&query.meter) {
            sql.push_str(" AND t.meter = ?");
            args.push(Box::new(meter.to_owned()));
        }
        if let Some(composer) = non_empty(&query.composer) {
            sql.push_str(" AND t.composer LIKE ?");
            args.push(Box::new(format!("%{composer}%")));
        }
        match non_empty(&query.status) {
            Some(status) => {
                sql.push_str(" AND t.status = ?");
                args.push(Box::new(status.to_owned()));
            }
            // Skipped tunes stay out of results unless asked for.
            None => sql.push_str(" AND t.status = 'parsed'"),
        }

        let params_ref: Vec<&dyn ToSql> = args.iter().map(|arg| arg.as_ref()).collect();

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) {sql}"),
            params_ref.as_slice(),
            |row| row.get(0),
        )?;

        let select = format!(
            "SELECT t.id, t.title, t.key, t.rhythm, t.meter, t.composer,
                    t.status, t.skip_reason, tb.url
             {sql} ORDER BY t.title ASC LIMIT {} OFFSET {}",
            query.limit.max(0),
            query.offset.max(0),
        );
        let mut stmt = self.conn.prepare(&select)?;
        let rows = stmt.query_map(params_ref.as_slice(), |row| {
            Ok(TuneSearchHit {
                id: row.get(0)?,
                title: row.get(1)?,
                key: row.get(2)?,
                rhythm: row.get(3)?,
                meter: row.get(4)?,
                composer: row.get(5)?,
                status: row.get(6)?,
                skip_reason: row.get(7)?,
                source_url: row.get(8)?,
            })
        })?;
        let hits = rows.collect::<Result<_, _>>()?;
        Ok(TuneSearchPage { hits, total })
    }

    /// Distinct non-empty keys, rhythms, and meters.
    pub fn tune_filters(&self) -> StoreResult<TuneFilters> {
        let distinct = |column: &str| -> StoreResult<Vec<String>> {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT DISTINCT {column} FROM tunes
                 WHERE {column} IS NOT NULL AND {column} != ''
                 ORDER BY {column} ASC"
            ))?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            Ok(rows.collect::<Result<_, _>>()?)
        };
        Ok(TuneFilters {
            keys: distinct("key")?,
            rhythms: distinct("rhythm")?,
            meters: distinct("meter")?,
        })
    }

    /// Full detail for one tune, with the ABC text rebuilt from its stored
    /// header columns and body.
    pub fn tune_detail(&self, tune_id: i64) -> StoreResult<Option<TuneDetail>> {
        let row = self
            .conn
            .query_row(
                "SELECT t.reference_number, t.title, t.composer, t.rhythm, t.key,
                        t.meter, t.unit_note_length, t.tempo, t.parts, t.transcription,
                        t.notes, t.history, t.origin, t.area, t.book, t.discography,
                        t.source, t.instruction, t.\"group\", t.tune_body, tb.url,
                        t.status, t.skip_reason
                 FROM tunes t JOIN tunebooks tb ON t.tunebook_id = tb.id
                 WHERE t.id = ?1",
                params![tune_id],
                |row| {
                    let headers: Vec<Option<String>> =
                        (0..19).map(|i| row.get(i)).collect::<Result<_, _>>()?;
                    Ok((
                        headers,
                        row.get::<_, String>(19)?,
                        row.get::<_, String>(20)?,
                        row.get::<_, String>(21)?,
                        row.get::<_, Option<String>>(22)?,
                    ))
                },
            )
            .optional()?;

        let Some((headers, tune_body, source_url, status, skip_reason)) = row else {
            return Ok(None);
        };

        // Canonical header order, with K: closing the header block.
        let letters = [
            ("X", 0),
            ("T", 1),
            ("C", 2),
            ("R", 3),
            ("M", 5),
            ("L", 6),
            ("Q", 7),
            ("P", 8),
            ("Z", 9),
            ("N", 10),
            ("H", 11),
            ("O", 12),
            ("A", 13),
            ("B", 14),
            ("D", 15),
            ("S", 16),
            ("I", 17),
            ("G", 18),
            ("K", 4),
        ];
        let mut abc = String::new();
        for (letter, idx) in letters {
            if let Some(value) = headers[idx].as_deref() {
                abc.push_str(letter);
                abc.push(':');
                abc.push_str(value);
                abc.push('\n');
            }
        }
        abc.push_str(&tune_body);

        Ok(Some(TuneDetail {
            id: tune_id,
            reference_number: headers[0].clone(),
            title: headers[1].clone(),
            composer: headers[2].clone(),
            rhythm: headers[3].clone(),
            key: headers[4].clone(),
            meter: headers[5].clone(),
            tempo: headers[7].clone(),
            notes: headers[10].clone(),
            history: headers[11].clone(),
            status,
            skip_reason,
            source_url,
            abc,
        }))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
