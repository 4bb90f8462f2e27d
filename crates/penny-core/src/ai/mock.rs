//! Mock backend for testing
//!
//! Produces deterministic suggestions without a network call. Useful for unit
//! tests and for exercising the pipeline without an OpenRouter key.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::categories::CategorySet;
use crate::error::Result;
use crate::models::{normalize_payee, Confidence, Transaction};

use super::types::{CategorySuggestion, KeyInfo};
use super::AIBackend;

/// Category used when nothing better is known
const FALLBACK_CATEGORY: &str = "Uncategorized";

/// Mock AI backend for testing
///
/// Suggestion order of preference: learned pattern (high), the budgeting
/// API's own category (medium), a category named in the payee (medium), then
/// the first category alphabetically (low).
#[derive(Clone, Default)]
pub struct MockBackend;

impl MockBackend {
    pub fn new() -> Self {
        Self
    }

    fn suggest_one(
        txn: &Transaction,
        categories: &CategorySet,
        patterns: &BTreeMap<String, String>,
    ) -> (String, Confidence) {
        if let Some(category) = patterns.get(&normalize_payee(txn.payee())) {
            return (category.clone(), Confidence::High);
        }

        if let Some(name) = txn
            .category_id
            .as_deref()
            .and_then(|id| categories.name_for(id))
        {
            return (name.to_string(), Confidence::Medium);
        }

        let payee = txn.payee().to_lowercase();
        let names = categories.sorted_names();
        if let Some(name) = names.iter().find(|n| payee.contains(&n.to_lowercase())) {
            return (name.clone(), Confidence::Medium);
        }

        let fallback = names
            .into_iter()
            .next()
            .unwrap_or_else(|| FALLBACK_CATEGORY.to_string());
        (fallback, Confidence::Low)
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn suggest_categories(
        &self,
        transactions: &[Transaction],
        categories: &CategorySet,
        patterns: &BTreeMap<String, String>,
    ) -> Result<Vec<CategorySuggestion>> {
        Ok(transactions
            .iter()
            .enumerate()
            .map(|(i, txn)| {
                let (category, confidence) = Self::suggest_one(txn, categories, patterns);
                CategorySuggestion {
                    transaction_number: i + 1,
                    category,
                    confidence,
                }
            })
            .collect())
    }

    async fn key_info(&self) -> Result<KeyInfo> {
        Ok(KeyInfo {
            label: Some("mock".to_string()),
            limit: None,
            usage: 0.0,
        })
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
