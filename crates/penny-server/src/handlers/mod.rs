//! HTTP request handlers organized by Slack surface

pub mod events;
pub mod health;
pub mod interactions;

pub use events::*;
pub use health::*;
pub use interactions::*;
