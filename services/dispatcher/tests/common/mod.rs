//! Shared helpers for dispatcher integration tests: spawn a dispatcher on
//! an ephemeral port with a scratch database, and speak the newline-framed
//! JSON protocol over a raw TCP stream.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crawl_store::Store;
use dispatcher::{Dispatcher, DispatcherConfig};

pub struct TestDispatcher {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    _dir: tempfile::TempDir,
}

impl TestDispatcher {
    /// A separate store connection onto the dispatcher's database.
    pub fn open_store(&self) -> Store {
        Store::open(&self.db_path).expect("open test store")
    }
}

/// Bind a dispatcher with the given config (bind address and db path are
/// overridden) and run it in the background.
pub async fn spawn(mut config: DispatcherConfig) -> TestDispatcher {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("crawl.db");
    config.bind = "127.0.0.1:0".to_owned();
    config.db_path = db_path.to_string_lossy().into_owned();
    // Keep background tasks quiet during tests.
    config.maintenance.reenable_interval_secs = 3600;
    config.maintenance.log_scan_interval_secs = 3600;
    config.maintenance.fetcher_log_path = dir
        .path()
        .join("fetcher.log")
        .to_string_lossy()
        .into_owned();

    let server = Dispatcher::bind(config).await.expect("bind dispatcher");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(server.run());
    TestDispatcher {
        addr,
        db_path,
        _dir: dir,
    }
}

/// One-shot request/response exchange on a fresh connection.
pub async fn request(addr: SocketAddr, payload: Value) -> Value {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream
        .write_all(format!("{payload}\n").as_bytes())
        .await
        .expect("send request");
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    tokio::time::timeout(Duration::from_secs(10), reader.read_line(&mut line))
        .await
        .expect("response within deadline")
        .expect("read response");
    serde_json::from_str(line.trim()).expect("response is JSON")
}

/// Send one frame on an established buffered stream and read the reply.
pub async fn exchange(reader: &mut BufReader<TcpStream>, payload: Value) -> Value {
    reader
        .get_mut()
        .write_all(format!("{payload}\n").as_bytes())
        .await
        .expect("send frame");
    let mut line = String::new();
    tokio::time::timeout(Duration::from_secs(10), reader.read_line(&mut line))
        .await
        .expect("reply within deadline")
        .expect("read reply");
    serde_json::from_str(line.trim()).expect("reply is JSON")
}
