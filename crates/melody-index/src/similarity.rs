//! Online similarity queries: coarse window search, fine DTW rerank.

use thiserror::Error;
use tracing::debug;

use crawl_store::{Store, StoreError};

use crate::dtw::dtw_distance;
use crate::index::{IndexError, VectorIndex};
use crate::intervals::parse_intervals;
use crate::DTW_BAND;

/// How many candidates the coarse stage hands to the reranker.
const CANDIDATE_POOL: usize = 500;

/// How many reranked results a query returns.
const RESULT_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum SimilarityError {
    /// The query tune exists but the indexer has not produced intervals
    /// for it (or they are empty).
    #[error("Query tune has no intervals indexed")]
    NoIntervals,
    #[error("Store: {0}")]
    Store(#[from] StoreError),
    #[error("Index: {0}")]
    Index(#[from] IndexError),
}

/// One similarity result with its normalized DTW score (lower is closer).
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarTune {
    pub id: i64,
    pub title: Option<String>,
    pub key: Option<String>,
    pub rhythm: Option<String>,
    pub composer: Option<String>,
    pub score: f64,
}

/// Two-stage similar-tune search over the store and vector index.
#[derive(Debug, Clone)]
pub struct SimilarityService {
    candidate_pool: usize,
    band: usize,
    result_limit: usize,
}

impl Default for SimilarityService {
    fn default() -> Self {
        SimilarityService {
            candidate_pool: CANDIDATE_POOL,
            band: DTW_BAND,
            result_limit: RESULT_LIMIT,
        }
    }
}

impl SimilarityService {
    pub fn new(candidate_pool: usize, band: usize, result_limit: usize) -> Self {
        SimilarityService {
            candidate_pool,
            band,
            result_limit,
        }
    }

    /// Find tunes melodically similar to `tune_id`.
    ///
    /// The window index recalls up to `candidate_pool` candidates cheaply;
    /// DTW (normalized by query length, so long tunes do not dominate)
    /// produces the final ascending ranking.  No surviving candidates is an
    /// empty result, not an error.
    pub fn find_similar(
        &self,
        store: &Store,
        index: &VectorIndex,
        tune_id: i64,
    ) -> Result<Vec<SimilarTune>, SimilarityError> {
        let interval_text = store
            .tune_intervals(tune_id)?
            .ok_or(SimilarityError::NoIntervals)?;
        let query = parse_intervals(&interval_text);
        if query.is_empty() {
            return Err(SimilarityError::NoIntervals);
        }

        let candidates =
            index.get_candidates(store, &query, self.candidate_pool, Some(tune_id))?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        debug!(tune_id, candidates = candidates.len(), "reranking with DTW");

        let candidate_ids: Vec<i64> = candidates.iter().map(|c| c.tune_id).collect();
        let metas = store.tunes_meta(&candidate_ids)?;

        let query_f64: Vec<f64> = query.iter().map(|&v| f64::from(v)).collect();
        let query_len = query_f64.len() as f64;

        let mut scored: Vec<SimilarTune> = metas
            .into_iter()
            .filter_map(|meta| {
                let intervals = parse_intervals(meta.intervals.as_deref()?);
                if intervals.is_empty() {
                    return None;
                }
                let candidate_f64: Vec<f64> =
                    intervals.iter().map(|&v| f64::from(v)).collect();
                let distance = dtw_distance(&query_f64, &candidate_f64, self.band);
                Some(SimilarTune {
                    id: meta.id,
                    title: meta.title,
                    key: meta.key,
                    rhythm: meta.rhythm,
                    composer: meta.composer,
                    score: distance / query_len,
                })
            })
            .collect();

        scored.sort_by(|a, b| a.score.total_cmp(&b.score));
        scored.truncate(self.result_limit);
        Ok(scored)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
