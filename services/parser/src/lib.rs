//! parser: pulls batches of fetched documents from the dispatcher, runs
//! the ABC decomposer, persists tunebook and tune rows, and reports
//! `has_abc` per URL.

pub mod config;
pub mod worker;

pub use config::{ParserConfig, load_config_from_path};
pub use worker::{Parser, process_document};
