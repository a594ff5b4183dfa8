// parser: turns fetched documents into tunebook and tune rows.

use clap::Parser as _;
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Parser)]
#[command(name = "parser", version, about = "Crawl parse worker")]
struct Args {
    /// Path to the parser TOML config
    #[arg(short, long, default_value = "parser.toml")]
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

    info!(version = env!("CARGO_PKG_VERSION"), "parser starting");

    let args = Args::parse();
    let config = match parser::load_config_from_path(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let mut worker = match parser::Parser::new(config) {
        Ok(worker) => worker,
        Err(e) => {
            eprintln!("FATAL: failed to start parser: {}", e);
            std::process::exit(1);
        }
    };
    worker.run().await;
}
