//! JSON parsing helpers for AI backend responses
//!
//! Models often wrap their JSON in a markdown fence. The returned
//! `transaction_number` is authoritative: a response that does not cover every
//! submitted transaction exactly once is rejected as a whole.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::Confidence;

use super::types::CategorySuggestion;

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    transaction_number: usize,
    category: String,
    #[serde(default)]
    confidence: Option<String>,
}

/// Strip a ```json fenced block, or failing that a bare ``` fenced block
pub fn strip_code_fence(response: &str) -> &str {
    let response = response.trim();

    if let Some((_, after)) = response.split_once("```json") {
        let inner = after.split("```").next().unwrap_or(after);
        return inner.trim();
    }
    if let Some((_, after)) = response.split_once("```") {
        let inner = after.split("```").next().unwrap_or(after);
        return inner.trim();
    }
    response
}

/// Parse and reconcile suggestions for a batch of `count` transactions
///
/// The result is ordered by `transaction_number`, so index `i` belongs to the
/// transaction at position `i + 1`.
pub fn parse_suggestions(response: &str, count: usize) -> Result<Vec<CategorySuggestion>> {
    let json_str = strip_code_fence(response);

    let raw: Vec<RawSuggestion> = serde_json::from_str(json_str).map_err(|e| {
        Error::Suggestion(format!(
            "Invalid JSON from AI: {} | Raw: {}",
            e,
            truncate(json_str, 200)
        ))
    })?;

    if raw.len() != count {
        return Err(Error::Suggestion(format!(
            "Expected {} suggestions, got {}",
            count,
            raw.len()
        )));
    }

    let mut slots: Vec<Option<CategorySuggestion>> = vec![None; count];
    for item in raw {
        let n = item.transaction_number;
        if n == 0 || n > count {
            return Err(Error::Suggestion(format!(
                "Suggestion for transaction {} is out of range 1..={}",
                n, count
            )));
        }
        let slot = &mut slots[n - 1];
        if slot.is_some() {
            return Err(Error::Suggestion(format!(
                "Duplicate suggestion for transaction {}",
                n
            )));
        }
        *slot = Some(CategorySuggestion {
            transaction_number: n,
            category: item.category.trim().to_string(),
            confidence: item
                .confidence
                .as_deref()
                .map(Confidence::from_label)
                .unwrap_or_default(),
        });
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.ok_or_else(|| {
                Error::Suggestion(format!("Missing suggestion for transaction {}", i + 1))
            })
        })
        .collect()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fence() {
        let response = "Here you go:\n```json\n[{\"a\": 1}]\n```\nThanks";
        assert_eq!(strip_code_fence(response), "[{\"a\": 1}]");
    }

    #[test]
    fn test_strip_bare_fence() {
        let response = "```\n[]\n```";
        assert_eq!(strip_code_fence(response), "[]");
    }

    #[test]
    fn test_no_fence_passthrough() {
        assert_eq!(strip_code_fence("  [] "), "[]");
    }

    #[test]
    fn test_parse_reorders_by_transaction_number() {
        let response = r#"```json
[
  {"transaction_number": 2, "category": "Dining Out", "confidence": "low"},
  {"transaction_number": 1, "category": "Groceries", "confidence": "high"}
]
```"#;

        let suggestions = parse_suggestions(response, 2).unwrap();
        assert_eq!(suggestions[0].category, "Groceries");
        assert_eq!(suggestions[0].confidence, Confidence::High);
        assert_eq!(suggestions[1].category, "Dining Out");
        assert_eq!(suggestions[1].confidence, Confidence::Low);
    }

    #[test]
    fn test_missing_confidence_defaults_to_medium() {
        let response = r#"[{"transaction_number": 1, "category": "Gas"}]"#;
        let suggestions = parse_suggestions(response, 1).unwrap();
        assert_eq!(suggestions[0].confidence, Confidence::Medium);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let response = r#"[{"transaction_number": 1, "category": "Gas"}]"#;
        assert!(matches!(
            parse_suggestions(response, 2),
            Err(Error::Suggestion(_))
        ));
    }

    #[test]
    fn test_duplicate_number_rejected() {
        let response = r#"[
            {"transaction_number": 1, "category": "Gas"},
            {"transaction_number": 1, "category": "Groceries"}
        ]"#;
        assert!(matches!(
            parse_suggestions(response, 2),
            Err(Error::Suggestion(_))
        ));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let response = r#"[
            {"transaction_number": 1, "category": "Gas"},
            {"transaction_number": 3, "category": "Groceries"}
        ]"#;
        assert!(parse_suggestions(response, 2).is_err());

        let zero = r#"[{"transaction_number": 0, "category": "Gas"}]"#;
        assert!(parse_suggestions(zero, 1).is_err());
    }

    #[test]
    fn test_non_json_is_hard_error() {
        let err = parse_suggestions("I think these are groceries.", 1).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON from AI"));
    }

    #[test]
    fn test_empty_batch() {
        assert!(parse_suggestions("[]", 0).unwrap().is_empty());
    }
}
