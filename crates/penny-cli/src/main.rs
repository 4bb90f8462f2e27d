//! Penny CLI - YNAB transaction categorizer
//!
//! Usage:
//!   penny run                 Categorize new transactions and post to Slack
//!   penny run --dry-run       Print the summary without posting
//!   penny serve --port 8080   Start the Slack approval server
//!   penny check               Verify API credentials
//!   penny status              Show pending batches and learned patterns

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let mut config = commands::load_config(cli.state.as_deref())?;

    match cli.command {
        Commands::Run { dry_run, days_back } => {
            if let Some(days) = days_back {
                config.days_back = days;
            }
            commands::cmd_run(config, dry_run).await
        }
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }
            commands::cmd_serve(config).await
        }
        Commands::Check => commands::cmd_check(&config).await,
        Commands::Status => commands::cmd_status(&config),
    }
}
