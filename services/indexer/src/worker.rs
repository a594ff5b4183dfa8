//! The index worker loop.
//!
//! Per claimed tunebook: compute and persist intervals for every parsed
//! tune, window the non-empty sequences, and append the vectors to the
//! index in one batch whose mapping rows commit atomically with it.  The
//! vector index file is owned by this worker; run a single indexer per
//! index file.

use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crawl_protocol::{Ack, Request, SubmitIndexedResult, TunebookAssignment};
use crawl_store::{Store, StoreError};
use melody_index::{
    IndexError, VECTOR_DIM, VectorIndex, format_intervals, generate_windows,
    intervals_from_pitches, parse_pitches,
};

use crate::config::IndexerConfig;

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Store: {0}")]
    Store(#[from] StoreError),
    #[error("Index: {0}")]
    Index(#[from] IndexError),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("dispatcher closed the connection")]
    Disconnected,
    #[error("bad frame: {0}")]
    BadFrame(String),
}

/// An index worker instance.
pub struct Indexer {
    config: IndexerConfig,
    store: Store,
    index: VectorIndex,
}

impl Indexer {
    /// Open the store and index, and garbage-collect any unmapped vector
    /// tail a previous crash left behind.
    pub fn new(config: IndexerConfig) -> Result<Self, IndexerError> {
        let store = Store::open(std::path::Path::new(&config.db_path))?;
        let mut index =
            VectorIndex::open(std::path::Path::new(&config.index_path), VECTOR_DIM)?;
        let trimmed = index.reconcile(&store)?;
        if trimmed > 0 {
            warn!(trimmed, "dropped unmapped vectors from a previous run");
        }
        Ok(Indexer {
            config,
            store,
            index,
        })
    }

    /// Main loop: claim, process, submit, sleep when idle.
    pub async fn run(&mut self) {
        info!("indexer main loop started");
        loop {
            match self.poll_once().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::time::sleep(Duration::from_secs(self.config.idle_sleep_secs)).await;
                }
                Err(e) => {
                    warn!(error = %e, "index round failed");
                    tokio::time::sleep(Duration::from_secs(self.config.idle_sleep_secs)).await;
                }
            }
        }
    }

    /// One claim/process/submit round.  Returns false when no tunebook
    /// needed indexing.
    pub async fn poll_once(&mut self) -> Result<bool, IndexerError> {
        let assignment: TunebookAssignment =
            exchange(&self.config.dispatcher_addr, &Request::GetTunebook).await?;
        let tunebook_id = match assignment {
            TunebookAssignment::Ok { tunebook_id } => tunebook_id,
            TunebookAssignment::Empty => return Ok(false),
            TunebookAssignment::Error { message } => {
                warn!(message, "dispatcher error on get_tunebook");
                return Ok(false);
            }
        };

        let success = match self.process_tunebook(tunebook_id) {
            Ok(tunes) => {
                info!(tunebook_id, tunes, "tunebook indexed");
                true
            }
            Err(e) => {
                warn!(tunebook_id, error = %e, "tunebook indexing failed");
                false
            }
        };

        let ack: Ack = exchange(
            &self.config.dispatcher_addr,
            &Request::SubmitIndexedResult(SubmitIndexedResult {
                tunebook_id,
                success,
            }),
        )
        .await?;
        if let Ack::Error { message } = ack {
            warn!(tunebook_id, message, "indexed result rejected");
        }
        Ok(true)
    }

    /// Index every parsed tune of one tunebook.  Returns the number of
    /// tunes processed.
    pub fn process_tunebook(&mut self, tunebook_id: i64) -> Result<usize, IndexerError> {
        let tunes = self.store.parsed_tunes_for_tunebook(tunebook_id)?;

        let mut batch_ids: Vec<i64> = Vec::new();
        let mut batch_vectors: Vec<Vec<f32>> = Vec::new();

        for tune in &tunes {
            let pitches = parse_pitches(tune.pitches.as_deref().unwrap_or(""));
            let intervals = intervals_from_pitches(&pitches);
            self.store
                .set_tune_intervals(tune.id, &format_intervals(&intervals))?;

            for window in generate_windows(&intervals) {
                batch_ids.push(tune.id);
                batch_vectors.push(window);
            }
        }

        if !batch_ids.is_empty() {
            self.index
                .add(&mut self.store, &batch_ids, &batch_vectors)?;
            info!(
                tunebook_id,
                vectors = batch_ids.len(),
                total = self.index.count(),
                "vectors added"
            );
        }
        Ok(tunes.len())
    }

    /// Index tunes that carry intervals but have no vectors yet, in
    /// batches of `batch`.  Returns the number of tunes backfilled.
    pub fn backfill(&mut self, batch: i64) -> Result<usize, IndexerError> {
        let mut total = 0usize;
        loop {
            let pending = self.store.tunes_missing_from_index(batch)?;
            if pending.is_empty() {
                break;
            }

            let mut batch_ids: Vec<i64> = Vec::new();
            let mut batch_vectors: Vec<Vec<f32>> = Vec::new();
            for tune in &pending {
                let intervals = melody_index::parse_intervals(&tune.intervals);
                for window in generate_windows(&intervals) {
                    batch_ids.push(tune.id);
                    batch_vectors.push(window);
                }
            }
            if batch_ids.is_empty() {
                // Only unparseable interval rows remain; they would repeat
                // forever.
                warn!(pending = pending.len(), "skipping tunes with unusable intervals");
                break;
            }
            self.index
                .add(&mut self.store, &batch_ids, &batch_vectors)?;
            total += pending.len();
            info!(
                tunes = pending.len(),
                vectors = batch_ids.len(),
                "backfill batch indexed"
            );
        }
        Ok(total)
    }

    /// Rebuild the index from scratch: drop every vector and mapping row,
    /// then backfill from the stored intervals.  Returns the number of
    /// tunes indexed.
    pub fn rebuild(&mut self) -> Result<usize, IndexerError> {
        let cleared = self.store.clear_faiss_mappings()?;
        self.index.clear()?;
        info!(cleared, "index cleared for rebuild");
        self.backfill(1000)
    }

    /// The live vector index (read access for the similarity side).
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

/// One request/response round trip on a fresh dispatcher connection.
async fn exchange<T: serde::de::DeserializeOwned>(
    addr: &str,
    request: &Request,
) -> Result<T, IndexerError> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    let stream = tokio::net::TcpStream::connect(addr).await?;
    let mut reader = BufReader::new(stream);

    let frame =
        serde_json::to_string(request).map_err(|e| IndexerError::BadFrame(e.to_string()))?;
    reader.get_mut().write_all(frame.as_bytes()).await?;
    reader.get_mut().write_all(b"\n").await?;

    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(IndexerError::Disconnected);
    }
    serde_json::from_str(line.trim()).map_err(|e| IndexerError::BadFrame(e.to_string()))
}
