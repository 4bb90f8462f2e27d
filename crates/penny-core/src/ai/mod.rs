//! Pluggable AI backend abstraction
//!
//! This module provides a backend-agnostic interface for the categorization
//! model.
//!
//! # Architecture
//!
//! - `AIBackend` trait: defines the interface for all AI operations
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OpenAICompatibleBackend`, `MockBackend`
//!
//! # Configuration
//!
//! `PENNY_AI_BACKEND` selects the backend: `openrouter` (default) or `mock`.

mod mock;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use mock::MockBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::categories::CategorySet;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::Transaction;

/// Trait defining the interface for all AI backends
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Suggest a category for each transaction
    ///
    /// The result has one entry per transaction, in the same order. A response
    /// that cannot be reconciled with the batch is an error.
    async fn suggest_categories(
        &self,
        transactions: &[Transaction],
        categories: &CategorySet,
        patterns: &BTreeMap<String, String>,
    ) -> Result<Vec<CategorySuggestion>>;

    /// Credit limit and usage for the configured key
    async fn key_info(&self) -> Result<KeyInfo>;

    /// Get the model name
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
#[derive(Clone)]
pub enum AIClient {
    /// OpenRouter or any other OpenAI-compatible server
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from configuration
    ///
    /// `mock` needs no key; anything else requires `OPENROUTER_API_KEY`.
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.ai_backend.as_str() {
            "mock" => Ok(AIClient::Mock(MockBackend::new())),
            other => {
                if !matches!(other, "openrouter" | "openai" | "openai_compatible") {
                    tracing::warn!(backend = %other, "Unknown PENNY_AI_BACKEND, falling back to openrouter");
                }
                OpenAICompatibleBackend::from_config(config)
                    .map(AIClient::OpenAICompatible)
                    .ok_or_else(|| Error::MissingCredentials(vec!["OPENROUTER_API_KEY".into()]))
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn suggest_categories(
        &self,
        transactions: &[Transaction],
        categories: &CategorySet,
        patterns: &BTreeMap<String, String>,
    ) -> Result<Vec<CategorySuggestion>> {
        match self {
            AIClient::OpenAICompatible(b) => {
                b.suggest_categories(transactions, categories, patterns)
                    .await
            }
            AIClient::Mock(b) => {
                b.suggest_categories(transactions, categories, patterns)
                    .await
            }
        }
    }

    async fn key_info(&self) -> Result<KeyInfo> {
        match self {
            AIClient::OpenAICompatible(b) => b.key_info().await,
            AIClient::Mock(b) => b.key_info().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_client_mock() {
        let client = AIClient::mock();
        assert_eq!(client.model(), "mock");
        assert_eq!(client.host(), "mock://localhost");
    }

    #[tokio::test]
    async fn test_mock_key_info() {
        let info = AIClient::mock().key_info().await.unwrap();
        assert_eq!(info.label.as_deref(), Some("mock"));
        assert_eq!(info.limit_display(), "unlimited");
    }

    #[test]
    fn test_from_config_selects_backend() {
        let mock = Config::from_lookup(|key| {
            (key == "PENNY_AI_BACKEND").then(|| "mock".to_string())
        })
        .unwrap();
        assert!(matches!(AIClient::from_config(&mock), Ok(AIClient::Mock(_))));

        let keyed = Config::from_lookup(|key| {
            (key == "OPENROUTER_API_KEY").then(|| "sk-or".to_string())
        })
        .unwrap();
        assert!(matches!(
            AIClient::from_config(&keyed),
            Ok(AIClient::OpenAICompatible(_))
        ));
    }

    #[test]
    fn test_from_config_without_key_fails() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert!(matches!(
            AIClient::from_config(&config),
            Err(Error::MissingCredentials(_))
        ));
    }
}
