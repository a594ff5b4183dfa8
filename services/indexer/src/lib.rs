//! indexer: claims tunebooks from the dispatcher and grows the vector
//! index -- pitches -> intervals -> windows -> vectors, with the slot mapping
//! committed alongside.

pub mod config;
pub mod worker;

pub use config::{IndexerConfig, load_config_from_path};
pub use worker::Indexer;
