//! State inspection command

use anyhow::{Context, Result};

use penny_core::{Config, StateStore};

pub fn cmd_status(config: &Config) -> Result<()> {
    let store = StateStore::new(config.state_file.clone());

    println!();
    println!("📊 Penny Status");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   State file: {}", store.path().display());
    if !store.path().exists() {
        println!("   (no state saved yet)");
    }

    let state = store.load().context("Failed to read state file")?;

    println!();
    println!("   Processed transactions: {}", state.processed_transactions.len());

    println!();
    if state.category_patterns.is_empty() {
        println!("   🧠 Learned patterns: none");
    } else {
        println!("   🧠 Learned patterns: {}", state.category_patterns.len());
        for (payee, category) in &state.category_patterns {
            println!("      {} → {}", payee, category);
        }
    }

    println!();
    if state.pending.is_empty() {
        println!("   📬 Pending batches: none");
    } else {
        println!("   📬 Pending batches: {}", state.pending.len());
        for (ts, batch) in &state.pending {
            println!(
                "      {}  {}  {} transaction(s), {} transfer pair(s)",
                ts,
                batch.created_at.format("%Y-%m-%d %H:%M UTC"),
                batch.transactions.len(),
                batch.transfer_pairs.len()
            );
        }
    }

    println!();
    Ok(())
}
