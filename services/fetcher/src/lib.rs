//! fetcher: pulls one URL at a time from the dispatcher, honors robots.txt,
//! performs the HTTP fetch, harvests links, and reports the classified
//! outcome back.

pub mod config;
pub mod dispatcher_client;
pub mod links;
pub mod robots;
pub mod worker;

pub use config::{FetcherConfig, load_config_from_path};
pub use worker::Fetcher;
