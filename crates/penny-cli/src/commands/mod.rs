//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (config loading, credential report)
//! - `run` - Daily fetch/categorize/post pipeline
//! - `serve` - Webhook server command
//! - `check` - Connectivity checks
//! - `status` - State inspection

pub mod check;
pub mod core;
pub mod run;
pub mod serve;
pub mod status;

// Re-export command functions for main.rs
pub use check::*;
pub use core::*;
pub use run::*;
pub use serve::*;
pub use status::*;
