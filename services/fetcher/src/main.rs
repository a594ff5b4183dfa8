// fetcher: claims URLs from the dispatcher and fetches them.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "fetcher", version, about = "Crawl fetch worker")]
struct Args {
    /// Path to the fetcher TOML config
    #[arg(short, long, default_value = "fetcher.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "fetcher starting");

    let args = Args::parse();
    let config = match fetcher::load_config_from_path(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let mut worker = match fetcher::Fetcher::new(config) {
        Ok(worker) => worker,
        Err(e) => {
            eprintln!("FATAL: failed to start fetcher: {}", e);
            std::process::exit(1);
        }
    };
    worker.run().await;
}
