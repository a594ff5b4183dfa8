// purger: periodic garbage collection over the crawl store.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "purger", version, about = "Crawl store garbage collector")]
struct Args {
    /// Path to the purger TOML config
    #[arg(short, long, default_value = "purger.toml")]
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

    info!(version = env!("CARGO_PKG_VERSION"), "purger starting");

    let args = Args::parse();
    let config = match purger::load_config_from_path(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = purger::run(config).await {
        eprintln!("FATAL: purger failed: {}", e);
        std::process::exit(1);
    }
}
