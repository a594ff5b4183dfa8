// dispatcher: serves the claim/ack protocol to fetcher, parser, and
// indexer workers.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "dispatcher", version, about = "Crawl pipeline coordinator")]
struct Args {
    /// Path to the dispatcher TOML config
    #[arg(short, long, default_value = "dispatcher.toml")]
    config: PathBuf,
    /// Newline-separated seed URLs inserted at startup
    #[arg(long)]
    seed: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "dispatcher starting");

    let args = Args::parse();
    let config = match dispatcher::load_config_from_path(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let server = match dispatcher::Dispatcher::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("FATAL: failed to start dispatcher: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(seed_path) = args.seed {
        match std::fs::read_to_string(&seed_path) {
            Ok(contents) => {
                let seeds: Vec<&str> = contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .collect();
                let store = server.store();
                match store.lock().await.insert_seed_urls(seeds.iter().copied()) {
                    Ok(added) => info!(added, total = seeds.len(), "seed urls inserted"),
                    Err(e) => eprintln!("FATAL: failed to insert seeds: {}", e),
                }
            }
            Err(e) => {
                eprintln!("FATAL: failed to read seed file: {}", e);
                std::process::exit(1);
            }
        }
    }

    server.run().await;
}
