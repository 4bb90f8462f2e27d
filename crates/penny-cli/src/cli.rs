//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use penny_core::config::MAX_DAYS_BACK;

/// Penny - AI-assisted YNAB categorization with Slack approvals
#[derive(Parser)]
#[command(name = "penny")]
#[command(about = "Categorize YNAB transactions and approve them from Slack", long_about = None)]
#[command(version)]
pub struct Cli {
    /// State file path (overrides STATE_FILE)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch unapproved transactions, categorize them and post the summary
    Run {
        /// Print the summary instead of posting it; nothing is persisted
        #[arg(long)]
        dry_run: bool,

        /// Lookback window in days (overrides DAYS_BACK)
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..=MAX_DAYS_BACK))]
        days_back: Option<i64>,
    },

    /// Start the Slack approval webhook server
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides HOST)
        #[arg(long)]
        host: Option<String>,
    },

    /// Verify YNAB, Slack and OpenRouter connectivity
    Check,

    /// Show the persisted agent state
    Status,
}
