mod awards;
mod cli;
mod config;
mod engine;
mod error;
mod nfo;
mod normalize;
mod overrides;
mod prompt;
mod title;
mod tmdb;
mod types;
mod watched;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = cli::Cli::parse();
    if let Err(error) = cli::run(cli.into_config()).await {
        tracing::error!("{error}");
        std::process::exit(1);
    }
}
