//! AI backend response types
//!
//! These types are backend-agnostic and used across all AI implementations.

use serde::{Deserialize, Serialize};

use crate::models::Confidence;

/// One reconciled suggestion, aligned with the transaction it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySuggestion {
    /// 1-based position in the submitted batch
    pub transaction_number: usize,
    pub category: String,
    #[serde(default)]
    pub confidence: Confidence,
}

/// Credit information for the configured API key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyInfo {
    #[serde(default)]
    pub label: Option<String>,
    /// Credit limit; `None` means unlimited
    #[serde(default)]
    pub limit: Option<f64>,
    #[serde(default)]
    pub usage: f64,
}

impl KeyInfo {
    /// Human-readable limit, e.g. `unlimited` or `$10.00`
    pub fn limit_display(&self) -> String {
        match self.limit {
            Some(limit) => format!("${:.2}", limit),
            None => "unlimited".to_string(),
        }
    }
}
