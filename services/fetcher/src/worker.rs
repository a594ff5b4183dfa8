//! The fetch worker loop.
//!
//! One URL at a time: claim from the dispatcher, check robots, perform the
//! HTTP request, harvest links from HTML, classify the outcome, and submit
//! the result on a fresh connection.  The worker holds no crawl state --
//! a kill at any point is healed by the dispatcher's claim timeouts.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crawl_protocol::{Ack, FetchErrorKind, Request, SubmitResult, UrlAssignment};
use crawl_store::{Store, StoreError};

use crate::config::FetcherConfig;
use crate::dispatcher_client::{self, ClientError};
use crate::links::extract_links;
use crate::robots::RobotsCache;

#[derive(Debug, Error)]
pub enum FetcherError {
    #[error("Store: {0}")]
    Store(#[from] StoreError),
    #[error("Dispatcher: {0}")]
    Client(#[from] ClientError),
    #[error("HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// A fetch worker instance.
pub struct Fetcher {
    config: FetcherConfig,
    http: reqwest::Client,
    robots: RobotsCache,
    store: Store,
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetcherError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        let store = Store::open(std::path::Path::new(&config.db_path))?;
        let robots = RobotsCache::new(&config.user_agent);
        Ok(Fetcher {
            config,
            http,
            robots,
            store,
        })
    }

    /// Main loop: poll, fetch, submit, sleep.
    pub async fn run(&mut self) {
        info!("fetcher main loop started");
        loop {
            match self.poll_once().await {
                Ok(true) => {
                    tokio::time::sleep(Duration::from_millis(self.config.fetch_delay_ms)).await;
                }
                Ok(false) => {
                    tokio::time::sleep(Duration::from_secs(self.config.idle_sleep_secs)).await;
                }
                Err(e) => {
                    warn!(error = %e, "fetch round failed");
                    tokio::time::sleep(Duration::from_secs(self.config.idle_sleep_secs)).await;
                }
            }
        }
    }

    /// One claim/fetch/submit round.  Returns false when the dispatcher had
    /// no work.
    pub async fn poll_once(&mut self) -> Result<bool, FetcherError> {
        let assignment: UrlAssignment =
            dispatcher_client::exchange(&self.config.dispatcher_addr, &Request::GetUrl).await?;

        let (url_id, url, link_distance) = match assignment {
            UrlAssignment::Ok {
                url_id,
                url,
                link_distance,
            } => (url_id, url, link_distance),
            UrlAssignment::NoUrls => return Ok(false),
            UrlAssignment::Error { message } => {
                warn!(message, "dispatcher error on get_url");
                return Ok(false);
            }
        };

        info!(url_id, url = %url, link_distance, "fetching");
        let result = self.fetch(url_id, &url, link_distance).await;

        let ack: Ack = dispatcher_client::exchange(
            &self.config.dispatcher_addr,
            &Request::SubmitResult(result),
        )
        .await?;
        if let Ack::Error { message } = ack {
            warn!(url_id, message, "submit_result rejected");
        }
        Ok(true)
    }

    /// Perform one fetch and classify the outcome into a submittable
    /// result.  Never fails -- every error becomes a classified failure.
    async fn fetch(&mut self, url_id: i64, url: &str, link_distance: i64) -> SubmitResult {
        let Ok(parsed) = Url::parse(url) else {
            return failure(url_id, FetchErrorKind::Other);
        };

        if !self.robots.can_fetch(&self.http, &parsed).await {
            info!(url, "blocked by robots.txt");
            return failure(url_id, FetchErrorKind::Other);
        }

        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                let kind = classify_error(&e);
                if kind == FetchErrorKind::Dns {
                    // This exact token is what the dispatcher's log scanner
                    // matches on.
                    warn!(
                        "failed to resolve '{}'",
                        parsed.host_str().unwrap_or(url)
                    );
                } else {
                    warn!(url, error = %e, "fetch error");
                }
                return failure(url_id, kind);
            }
        };

        let http_status = response.status().as_u16();
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .unwrap_or("")
            .trim()
            .to_owned();

        if response.status().is_client_error() || response.status().is_server_error() {
            info!(url, http_status, "http error");
            return SubmitResult {
                url_id,
                size_bytes: 0,
                mime_type,
                document: String::new(),
                http_status: Some(http_status),
                error_type: None,
            };
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!(url, error = %e, "body read failed");
                return failure(url_id, classify_error(&e));
            }
        };
        let size_bytes = body.len() as i64;
        info!(url, http_status, size_bytes, mime = %mime_type, "fetched");

        // Disallowed MIME types are persisted with an empty body so the
        // row still completes its lifecycle.
        let mime_allowed = self.store.is_mime_allowed(&mime_type).unwrap_or(false);
        if !mime_allowed {
            info!(url, mime = %mime_type, "disallowed mime type, dropping body");
            return SubmitResult {
                url_id,
                size_bytes,
                mime_type,
                document: String::new(),
                http_status: Some(http_status),
                error_type: None,
            };
        }

        if mime_type.starts_with("text/html") && link_distance < self.config.max_link_distance {
            let html = String::from_utf8_lossy(&body);
            let links = extract_links(&html, &parsed);
            if !links.is_empty() {
                match self
                    .store
                    .insert_urls(links.iter().map(String::as_str), link_distance + 1)
                {
                    Ok(added) => {
                        info!(url, added, distance = link_distance + 1, "harvested links");
                    }
                    Err(e) => warn!(url, error = %e, "link insert failed"),
                }
            }
        }

        SubmitResult {
            url_id,
            size_bytes,
            mime_type,
            document: BASE64.encode(&body),
            http_status: Some(http_status),
            error_type: None,
        }
    }
}

fn failure(url_id: i64, kind: FetchErrorKind) -> SubmitResult {
    SubmitResult {
        url_id,
        size_bytes: 0,
        mime_type: String::new(),
        document: String::new(),
        http_status: None,
        error_type: Some(kind),
    }
}

/// Map a reqwest error onto the dispatcher's failure classes.
fn classify_error(e: &reqwest::Error) -> FetchErrorKind {
    if e.is_timeout() {
        return FetchErrorKind::Timeout;
    }
    if e.is_connect() {
        // The resolver error is buried in the source chain; its rendering
        // is the only portable signal.
        let rendered = format!("{e:?}").to_ascii_lowercase();
        if rendered.contains("dns") || rendered.contains("resolve") || rendered.contains("lookup")
        {
            return FetchErrorKind::Dns;
        }
        return FetchErrorKind::Connection;
    }
    FetchErrorKind::Other
}
