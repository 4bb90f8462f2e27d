//! Connectivity check command

use anyhow::{bail, Result};

use penny_core::check::{all_passed, run_checks};
use penny_core::Config;

pub async fn cmd_check(config: &Config) -> Result<()> {
    println!("🧪 Testing Penny setup");
    println!();

    let outcomes = run_checks(config).await;
    for (i, outcome) in outcomes.iter().enumerate() {
        let mark = if outcome.ok { "✅" } else { "❌" };
        println!("{}. {}", i + 1, outcome.name);
        println!("   {} {}", mark, outcome.detail);
    }

    println!();
    println!("{}", "=".repeat(50));
    if all_passed(&outcomes) {
        println!("🎉 All checks passed! You're ready to go!");
        Ok(())
    } else {
        println!("⚠️  Some checks failed. Please fix the issues above.");
        bail!(
            "{} of {} checks failed",
            outcomes.iter().filter(|o| !o.ok).count(),
            outcomes.len()
        )
    }
}
