//! dispatcher: the single coordinator of the crawl pipeline.
//!
//! Serves the newline-framed JSON claim/ack protocol over TCP, owns every
//! url/tunebook status transition, heals in-flight state on startup, and
//! runs the host-health background tasks.

pub mod config;
pub mod log_scanner;
pub mod server;

pub use config::{DispatcherConfig, load_config_from_path};
pub use server::Dispatcher;
