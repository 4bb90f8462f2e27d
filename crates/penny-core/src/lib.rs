//! Penny Core Library
//!
//! Shared functionality for the Penny YNAB categorizer:
//! - YNAB, Slack and OpenRouter API clients
//! - Transfer pair detection and category resolution
//! - Pluggable AI backends for category suggestions
//! - Prompt library for customizable AI prompts
//! - Slack summary rendering and the approval command interpreter
//! - Persistent agent state with a single-writer store

pub mod agent;
pub mod ai;
pub mod approval;
pub mod categories;
pub mod check;
pub mod config;
pub mod error;
pub mod models;
pub mod prompts;
pub mod slack;
pub mod state;
pub mod summary;
pub mod transfers;
pub mod ynab;

/// Test utilities including the mock YNAB/Slack/OpenRouter server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use agent::{Agent, RunSummary};
pub use ai::{AIBackend, AIClient, CategorySuggestion, KeyInfo, MockBackend, OpenAICompatibleBackend};
pub use approval::{ApprovalAction, ApprovalCommand, ApprovalService, Position};
pub use categories::{CategorySet, UnknownCategory};
pub use check::{run_checks, CheckOutcome};
pub use config::{Config, Credential};
pub use error::{Error, Result};
pub use models::{
    Account, CategorizedTransaction, Category, Confidence, PendingBatch, Transaction, TransferPair,
};
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use slack::SlackClient;
pub use state::{AgentState, StateStore};
pub use summary::Summary;
pub use transfers::detect_transfer_pairs;
pub use ynab::YnabClient;
