//! Dispatcher TCP server: accept loop, framing, and request handlers.
//!
//! Connections are short-lived: one request frame, its response, and -- for
//! parser batches -- a stream of per-row results on the same socket.  Every
//! read carries a deadline; a malformed or timed-out frame closes the
//! connection without touching any row.  All state lives in the store, so
//! a handler crash at any point is healed by claim timeouts and startup
//! recovery.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

use crawl_protocol::{
    Ack, FetchErrorKind, FetchedBatch, FetchedUrl, Request, SubmitIndexedResult,
    SubmitParsedResult, SubmitResult, TunebookAssignment, UrlAssignment,
};
use crawl_store::{ClaimSettings, Store, StoreError};

use crate::config::DispatcherConfig;
use crate::log_scanner;

/// Upper bound on one request frame.  Fetched documents travel base64-
/// encoded inside `submit_result`, so frames can be large.
const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

pub type SharedStore = Arc<Mutex<Store>>;

#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store: {0}")]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// A bound dispatcher ready to serve workers.
pub struct Dispatcher {
    listener: TcpListener,
    store: SharedStore,
    config: Arc<DispatcherConfig>,
}

impl Dispatcher {
    /// Open the store, heal stale in-flight rows, and bind the listener.
    pub async fn bind(config: DispatcherConfig) -> Result<Self, DispatcherError> {
        let mut store = Store::open(std::path::Path::new(&config.db_path))?;

        let horizon = config.maintenance.stale_reset_horizon_secs;
        let urls = store.reset_stale_url_claims(horizon)?;
        let tunebooks = store.reset_stale_tunebook_claims(horizon)?;
        if urls > 0 || tunebooks > 0 {
            info!(urls, tunebooks, "recovered stale claims on startup");
        }

        let listener = TcpListener::bind(&config.bind).await?;
        info!(addr = %listener.local_addr()?, "dispatcher listening");
        Ok(Dispatcher {
            listener,
            store: Arc::new(Mutex::new(store)),
            config: Arc::new(config),
        })
    }

    /// The bound local address (useful when port 0 was configured).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared store handle, for seeding and tests.
    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.store)
    }

    /// Run the accept loop and background tasks until the process exits.
    pub async fn run(self) {
        tokio::spawn(reenable_loop(
            Arc::clone(&self.store),
            Arc::clone(&self.config),
        ));
        tokio::spawn(log_scanner::run(
            Arc::clone(&self.store),
            Arc::clone(&self.config),
        ));

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let store = Arc::clone(&self.store);
                    let config = Arc::clone(&self.config);
                    tokio::spawn(handle_connection(stream, peer, store, config));
                }
                Err(e) => {
                    warn!(error = %e, "accept error");
                }
            }
        }
    }
}

/// Periodically clear `timeout`-disabled hosts older than the grace period.
async fn reenable_loop(store: SharedStore, config: Arc<DispatcherConfig>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(
        config.maintenance.reenable_interval_secs,
    ));
    loop {
        ticker.tick().await;
        let result = store
            .lock()
            .await
            .reenable_timed_out_hosts(config.maintenance.host_timeout_grace_secs);
        match result {
            Ok(0) => {}
            Ok(count) => info!(count, "re-enabled timed-out hosts"),
            Err(e) => warn!(error = %e, "host re-enable failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Connection handling
// ---------------------------------------------------------------------------

type WireFramed = Framed<TcpStream, LinesCodec>;

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    store: SharedStore,
    config: Arc<DispatcherConfig>,
) {
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_BYTES));
    let read_deadline = Duration::from_secs(config.read_deadline_secs);

    let request = match read_request(&mut framed, read_deadline).await {
        Ok(Some(request)) => request,
        Ok(None) => return,
        Err(reason) => {
            warn!(%peer, reason, "closing connection");
            return;
        }
    };
    debug!(%peer, ?request, "request");

    match request {
        Request::GetUrl => {
            let response = get_url(&store, &config).await;
            send(&mut framed, &response).await;
        }
        Request::SubmitResult(result) => {
            let ack = submit_result(&store, &config, result).await;
            send(&mut framed, &ack).await;
        }
        Request::GetFetchedUrl => {
            handle_parser_batch(&mut framed, peer, &store, &config).await;
        }
        Request::SubmitParsedResult(result) => {
            let ack = submit_parsed_result(&store, result).await;
            send(&mut framed, &ack).await;
        }
        Request::GetTunebook => {
            let response = get_tunebook(&store, &config).await;
            send(&mut framed, &response).await;
        }
        Request::SubmitIndexedResult(result) => {
            let ack = submit_indexed_result(&store, result).await;
            send(&mut framed, &ack).await;
        }
    }
}

/// Read one frame within `deadline`.  `Ok(None)` is clean EOF; any partial
/// or malformed frame is an error and the caller discards the connection.
async fn read_request(
    framed: &mut WireFramed,
    deadline: Duration,
) -> Result<Option<Request>, &'static str> {
    match timeout(deadline, framed.next()).await {
        Err(_) => Err("read deadline elapsed"),
        Ok(None) => Ok(None),
        Ok(Some(Err(_))) => Err("frame error"),
        Ok(Some(Ok(line))) => match serde_json::from_str(&line) {
            Ok(request) => Ok(Some(request)),
            Err(_) => Err("malformed request frame"),
        },
    }
}

async fn send<T: Serialize>(framed: &mut WireFramed, response: &T) {
    let json = match serde_json::to_string(response) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "response serialization failed");
            return;
        }
    };
    if let Err(e) = framed.send(json).await {
        debug!(error = %e, "response send failed");
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_url(store: &SharedStore, config: &DispatcherConfig) -> UrlAssignment {
    let settings = ClaimSettings {
        dispatch_timeout_secs: config.scheduling.dispatch_timeout_secs,
        host_cooldown_secs: config.scheduling.host_cooldown_secs,
        max_retries: config.scheduling.max_retries,
        candidate_window: config.scheduling.candidate_window,
    };
    match store.lock().await.claim_next_url(&settings) {
        Ok(Some(claimed)) => {
            info!(url_id = claimed.id, url = %claimed.url, "dispatched url");
            UrlAssignment::Ok {
                url_id: claimed.id,
                url: claimed.url,
                link_distance: claimed.link_distance,
            }
        }
        Ok(None) => UrlAssignment::NoUrls,
        Err(e) => {
            warn!(error = %e, "url claim failed");
            UrlAssignment::Error {
                message: e.to_string(),
            }
        }
    }
}

/// Commit a fetch outcome and apply the host-health policy.
///
/// Success is an HTTP status in [200, 400) with no error kind.  On failure
/// the retry budget decides between a reset and the terminal `error`
/// state; `dns` disables the host immediately, while `timeout` (or a
/// missing status -- many hosts are merely slow) only disables once the
/// budget is exhausted.
async fn submit_result(
    store: &SharedStore,
    config: &DispatcherConfig,
    result: SubmitResult,
) -> Ack {
    let success = result.error_type.is_none()
        && result.http_status.is_some_and(|s| (200..400).contains(&s));

    let mut store = store.lock().await;
    let outcome = if success {
        let document = BASE64.decode(&result.document).unwrap_or_default();
        store.mark_url_fetched(
            result.url_id,
            result.size_bytes,
            &result.mime_type,
            &document,
            result.http_status,
        )
    } else {
        apply_fetch_failure(&mut store, config, &result)
    };

    match outcome {
        Ok(()) => Ack::Ok,
        Err(e) => {
            warn!(url_id = result.url_id, error = %e, "submit_result failed");
            Ack::Error {
                message: e.to_string(),
            }
        }
    }
}

fn apply_fetch_failure(
    store: &mut Store,
    config: &DispatcherConfig,
    result: &SubmitResult,
) -> Result<(), StoreError> {
    let outcome = store.record_fetch_failure(
        result.url_id,
        result.http_status,
        config.scheduling.max_retries,
    )?;
    info!(
        url_id = result.url_id,
        retries = outcome.retries,
        terminal = outcome.terminal,
        error_type = ?result.error_type,
        http_status = ?result.http_status,
        "fetch failed"
    );

    let Some(host) = store.url_host(result.url_id)? else {
        return Ok(());
    };
    if matches!(result.error_type, Some(FetchErrorKind::Dns)) {
        info!(host, "disabling host (dns)");
        store.disable_host(&host, "dns")?;
        return Ok(());
    }
    // No response at all looks like a timeout even when the error kind is
    // `connection` or `other`.
    let timeout_like = matches!(result.error_type, Some(FetchErrorKind::Timeout))
        || result.http_status.is_none();
    if timeout_like && outcome.terminal {
        info!(host, "disabling host (timeout)");
        store.disable_host(&host, "timeout")?;
    } else {
        store.touch_host(&host, result.http_status, false)?;
    }
    Ok(())
}

/// Serve a parser batch: claim rows, send them, then collect one
/// `submit_parsed_result` per row on the same connection.
async fn handle_parser_batch(
    framed: &mut WireFramed,
    peer: SocketAddr,
    store: &SharedStore,
    config: &DispatcherConfig,
) {
    let batch = store.lock().await.claim_fetched_batch(
        config.scheduling.parser_batch,
        config.scheduling.parse_timeout_secs,
    );
    let rows = match batch {
        Ok(rows) => rows,
        Err(e) => {
            warn!(error = %e, "fetched-batch claim failed");
            send(
                framed,
                &FetchedBatch::Error {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };
    if rows.is_empty() {
        send(framed, &FetchedBatch::NoUrls).await;
        return;
    }

    info!(%peer, batch = rows.len(), "dispatched parser batch");
    let urls = rows
        .iter()
        .map(|row| FetchedUrl {
            id: row.id,
            url: row.url.clone(),
        })
        .collect();
    send(framed, &FetchedBatch::Ok { urls }).await;

    // One result per batch row; a timeout or unexpected frame abandons the
    // rest (aged-out `parsing` claims are reclaimed later).
    let submit_deadline = Duration::from_secs(config.submit_deadline_secs);
    for _ in 0..rows.len() {
        match read_request(framed, submit_deadline).await {
            Ok(Some(Request::SubmitParsedResult(result))) => {
                let ack = submit_parsed_result(store, result).await;
                send(framed, &ack).await;
            }
            Ok(Some(other)) => {
                warn!(%peer, ?other, "unexpected frame in parser batch");
                break;
            }
            Ok(None) => break,
            Err(reason) => {
                warn!(%peer, reason, "parser batch aborted");
                break;
            }
        }
    }
}

async fn submit_parsed_result(store: &SharedStore, result: SubmitParsedResult) -> Ack {
    match store
        .lock()
        .await
        .mark_url_parsed(result.url_id, result.has_abc)
    {
        Ok(()) => {
            info!(url_id = result.url_id, has_abc = result.has_abc, "url parsed");
            Ack::Ok
        }
        Err(e) => {
            warn!(url_id = result.url_id, error = %e, "mark parsed failed");
            Ack::Error {
                message: e.to_string(),
            }
        }
    }
}

async fn get_tunebook(store: &SharedStore, config: &DispatcherConfig) -> TunebookAssignment {
    match store
        .lock()
        .await
        .claim_next_tunebook(config.scheduling.index_timeout_secs)
    {
        Ok(Some(tunebook_id)) => {
            info!(tunebook_id, "dispatched tunebook");
            TunebookAssignment::Ok { tunebook_id }
        }
        Ok(None) => TunebookAssignment::Empty,
        Err(e) => {
            warn!(error = %e, "tunebook claim failed");
            TunebookAssignment::Error {
                message: e.to_string(),
            }
        }
    }
}

async fn submit_indexed_result(store: &SharedStore, result: SubmitIndexedResult) -> Ack {
    match store
        .lock()
        .await
        .mark_tunebook_indexed(result.tunebook_id, result.success)
    {
        Ok(()) => {
            info!(
                tunebook_id = result.tunebook_id,
                success = result.success,
                "tunebook indexed"
            );
            Ack::Ok
        }
        Err(e) => {
            warn!(tunebook_id = result.tunebook_id, error = %e, "mark indexed failed");
            Ack::Error {
                message: e.to_string(),
            }
        }
    }
}
