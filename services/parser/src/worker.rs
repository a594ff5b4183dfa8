//! The parse worker loop.
//!
//! A batch is one dispatcher connection: request the fetched rows, then
//! stream one `submit_parsed_result` per row back on the same socket,
//! waiting for each ack.  Documents are loaded from the store by url, so
//! the dispatcher never ships payloads to parsers.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{info, warn};

use abc_core::decompose;
use crawl_protocol::{Ack, FetchedBatch, Request, SubmitParsedResult};
use crawl_store::{Store, StoreError};

use crate::config::ParserConfig;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("Store: {0}")]
    Store(#[from] StoreError),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("dispatcher closed the connection")]
    Disconnected,
    #[error("bad frame: {0}")]
    BadFrame(String),
}

/// Decompose one stored document and persist what it yields.
///
/// Returns whether the url carries usable ABC.  A document that fails to
/// decompose -- or whose tunebook cannot be saved -- reports `has_abc =
/// false` rather than surfacing an error, so the url still completes its
/// lifecycle.
pub fn process_document(store: &mut Store, url: &str) -> bool {
    let document = match store.document_for_url(url) {
        Ok(Some(document)) if !document.is_empty() => document,
        Ok(_) => {
            info!(url, "no document stored");
            return false;
        }
        Err(e) => {
            warn!(url, error = %e, "document load failed");
            return false;
        }
    };

    let text = String::from_utf8_lossy(&document);
    let Some(book) = decompose(&text) else {
        info!(url, "no ABC content");
        return false;
    };

    match store.save_tunebook(url, &book) {
        Ok(tunebook_id) => {
            info!(url, tunebook_id, tunes = book.tunes.len(), "tunebook saved");
            true
        }
        Err(e) => {
            warn!(url, error = %e, "tunebook save failed");
            false
        }
    }
}

/// A parse worker instance.
pub struct Parser {
    config: ParserConfig,
    store: Store,
}

impl Parser {
    pub fn new(config: ParserConfig) -> Result<Self, ParserError> {
        let store = Store::open(std::path::Path::new(&config.db_path))?;
        Ok(Parser { config, store })
    }

    /// Main loop: one batch per round, idle sleep in between.
    pub async fn run(&mut self) {
        info!("parser main loop started");
        loop {
            match self.process_batch().await {
                Ok(count) if count > 0 => {
                    info!(count, "batch complete");
                }
                Ok(_) => {
                    tokio::time::sleep(Duration::from_secs(self.config.idle_sleep_secs)).await;
                }
                Err(e) => {
                    warn!(error = %e, "batch failed");
                    tokio::time::sleep(Duration::from_secs(self.config.idle_sleep_secs)).await;
                }
            }
        }
    }

    /// Claim one batch and work through it.  Returns the number of rows
    /// processed.
    pub async fn process_batch(&mut self) -> Result<usize, ParserError> {
        let stream = TcpStream::connect(&self.config.dispatcher_addr).await?;
        let mut reader = BufReader::new(stream);

        let batch: FetchedBatch = exchange(&mut reader, &Request::GetFetchedUrl).await?;
        let urls = match batch {
            FetchedBatch::Ok { urls } => urls,
            FetchedBatch::NoUrls => return Ok(0),
            FetchedBatch::Error { message } => {
                warn!(message, "dispatcher error on get_fetched_url");
                return Ok(0);
            }
        };

        info!(batch = urls.len(), "processing batch");
        let mut processed = 0usize;
        for entry in urls {
            let has_abc = process_document(&mut self.store, &entry.url);
            let report = Request::SubmitParsedResult(SubmitParsedResult {
                url_id: entry.id,
                has_abc,
            });
            let ack: Ack = exchange(&mut reader, &report).await?;
            if let Ack::Error { message } = ack {
                warn!(url_id = entry.id, message, "parse result rejected");
            }
            processed += 1;
        }
        Ok(processed)
    }
}

/// Send one frame and read the reply on the batch connection.
async fn exchange<T: serde::de::DeserializeOwned>(
    reader: &mut BufReader<TcpStream>,
    request: &Request,
) -> Result<T, ParserError> {
    let frame = serde_json::to_string(request).map_err(|e| ParserError::BadFrame(e.to_string()))?;
    reader.get_mut().write_all(frame.as_bytes()).await?;
    reader.get_mut().write_all(b"\n").await?;

    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(ParserError::Disconnected);
    }
    serde_json::from_str(line.trim()).map_err(|e| ParserError::BadFrame(e.to_string()))
}
