//! Short-lived dispatcher connections.
//!
//! Every exchange is one connection: send a request frame, read one
//! response frame, close.  Submissions reconnect rather than reuse the
//! claim connection.

use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crawl_protocol::Request;

/// Deadline covering connect, send, and the response read.
const EXCHANGE_DEADLINE: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("dispatcher closed the connection")]
    Disconnected,
    #[error("deadline elapsed")]
    Timeout,
    #[error("bad frame: {0}")]
    BadFrame(String),
}

/// One request/response round trip on a fresh connection.
pub async fn exchange<T: DeserializeOwned>(
    addr: &str,
    request: &Request,
) -> Result<T, ClientError> {
    timeout(EXCHANGE_DEADLINE, exchange_inner(addr, request))
        .await
        .map_err(|_| ClientError::Timeout)?
}

async fn exchange_inner<T: DeserializeOwned>(
    addr: &str,
    request: &Request,
) -> Result<T, ClientError> {
    let stream = TcpStream::connect(addr).await?;
    let mut reader = BufReader::new(stream);

    let frame = serde_json::to_string(request).map_err(|e| ClientError::BadFrame(e.to_string()))?;
    reader.get_mut().write_all(frame.as_bytes()).await?;
    reader.get_mut().write_all(b"\n").await?;

    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(ClientError::Disconnected);
    }
    serde_json::from_str(line.trim()).map_err(|e| ClientError::BadFrame(e.to_string()))
}
