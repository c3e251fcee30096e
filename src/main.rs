use clap::Parser;

mod ai;
mod commands;
mod config;
mod db;
mod error;
mod feed;
mod models;
mod pipeline;

use commands::Cli;

#[tokio::main]
async fn main() {
    // Logs go to stderr so `run --json` output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = commands::execute(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
