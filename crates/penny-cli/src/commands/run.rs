//! Fetch/categorize/post command

use anyhow::{Context, Result};

use penny_core::agent::REQUIRED_CREDENTIALS;
use penny_core::{AIBackend, Agent, Config, RunSummary};

use super::require_credentials;

pub async fn cmd_run(config: Config, dry_run: bool) -> Result<()> {
    require_credentials(&config, REQUIRED_CREDENTIALS)?;

    println!("🤖 Starting YNAB categorization...");
    println!("   Budget: {}", config.budget_id);
    println!("   Lookback: {} day(s)", config.days_back);
    if dry_run {
        println!("   🧪 Dry run: nothing will be posted or saved");
    }

    let agent = Agent::from_config(config)?;
    println!("   Model: {} ({})", agent.ai().model(), agent.ai().host());
    println!();

    let summary = agent.run(dry_run).await.context("Categorization run failed")?;
    print_summary(&summary);

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    if summary.fetched == 0 {
        println!("✅ No unapproved transactions. Nothing to do.");
        return;
    }

    println!("📥 Found {} unapproved transaction(s)", summary.fetched);
    if summary.pairs > 0 {
        println!("🔄 {} transfer pair(s)", summary.pairs);
    }
    println!("💳 {} transaction(s) categorized", summary.regular);

    if let Some(preview) = &summary.preview {
        println!();
        println!("{}", preview);
    }
    if let Some(ts) = &summary.message_ts {
        println!("✅ Posted to Slack (message {})", ts);
    }
}
