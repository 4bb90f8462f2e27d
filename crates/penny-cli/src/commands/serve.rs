//! Server command implementation

use anyhow::Result;

use penny_core::Config;
use penny_server::REQUIRED_CREDENTIALS;

use super::require_credentials;

pub async fn cmd_serve(config: Config) -> Result<()> {
    require_credentials(&config, REQUIRED_CREDENTIALS)?;

    println!("🚀 Starting Penny approval server...");
    println!("   State file: {}", config.state_file.display());
    println!("   Listening: http://{}:{}", config.host, config.port);
    println!("   Events: /slack/events");
    println!("   Interactions: /slack/interactions");
    println!();
    println!("   Press Ctrl+C to stop");

    penny_server::serve(config).await
}
