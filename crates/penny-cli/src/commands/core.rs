//! Shared command utilities

use std::path::Path;

use anyhow::{bail, Context, Result};

use penny_core::{Config, Credential};

/// Load configuration from the environment, applying the `--state` override
pub fn load_config(state: Option<&Path>) -> Result<Config> {
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(path) = state {
        config.state_file = path.to_path_buf();
    }
    Ok(config)
}

/// Print a ✓/✗ line per credential and fail if any is missing
pub fn require_credentials(config: &Config, required: &[Credential]) -> Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .filter(|c| !config.has(**c))
        .map(|c| c.env_var())
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    println!("❌ Missing required environment variables:");
    for credential in required {
        let mark = if config.has(*credential) { "✓" } else { "✗" };
        println!("   {} {}", mark, credential.env_var());
    }
    bail!("Missing credentials: {}", missing.join(", "))
}
