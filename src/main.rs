//! Main entry point for the channel-archiver CLI

use anyhow::Context;
use channel_archiver::cli::{Cli, CliError, Commands};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
///
/// Logs go to stderr; stdout carries command output.
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("channel_archiver=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(addr) = cli.metrics_addr {
        channel_archiver::metrics::init_metrics(addr)
            .await
            .map_err(|e| CliError::MetricsError(e.to_string()))?;
    }

    let config = cli.config.to_config();
    match &cli.command {
        Commands::Validate(cmd) => cmd.execute(&config).context("validation failed"),
        Commands::Path(cmd) => cmd.execute(&config).context("cannot resolve path"),
    }
}

#[tokio::main]
async fn main() {
    // .env is optional; real environment variables win over it
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}
