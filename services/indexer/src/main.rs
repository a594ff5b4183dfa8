// indexer: grows the melodic vector index from parsed tunes.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "indexer", version, about = "Crawl index worker")]
struct Args {
    /// Path to the indexer TOML config
    #[arg(short, long, default_value = "indexer.toml")]
    config: PathBuf,
    /// Rebuild the vector index from stored intervals, then exit
    #[arg(long)]
    rebuild: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "indexer starting");

    let args = Args::parse();
    let config = match indexer::load_config_from_path(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let mut worker = match indexer::Indexer::new(config) {
        Ok(worker) => worker,
        Err(e) => {
            eprintln!("FATAL: failed to start indexer: {}", e);
            std::process::exit(1);
        }
    };

    if args.rebuild {
        match worker.rebuild() {
            Ok(tunes) => {
                info!(tunes, "index rebuild complete");
                return;
            }
            Err(e) => {
                eprintln!("FATAL: index rebuild failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    worker.run().await;
}
