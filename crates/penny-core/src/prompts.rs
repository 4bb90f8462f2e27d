//! Prompt library for the categorization model
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for an override in the prompts dir (`PENNY_PROMPTS_DIR`, or
//!    `~/.local/share/penny/prompts/overrides/`)
//! 2. Fall back to the embedded default (compiled into the binary)
//!
//! Each prompt is markdown with YAML frontmatter; `{{var}}` placeholders are
//! substituted at render time.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::categories::CategorySet;
use crate::error::{Error, Result};
use crate::models::Transaction;

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const CATEGORIZE_TRANSACTIONS: &str =
        include_str!("../prompts/categorize_transactions.md");
}

/// Shown in place of the pattern list before anything has been learned
pub const NO_PATTERNS: &str = "No learned patterns yet.";

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    CategorizeTransactions,
}

impl PromptId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CategorizeTransactions => "categorize_transactions",
        }
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::CategorizeTransactions => defaults::CATEGORIZE_TRANSACTIONS,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    pub id: String,
    pub version: u32,
    #[serde(default)]
    pub task_type: String,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    pub content: String,
}

impl Prompt {
    /// Render the prompt with `{{var}}` placeholders replaced
    pub fn render(&self, vars: &HashMap<&str, &str>) -> String {
        let mut result = self.content.clone();
        for (key, value) in vars {
            let pattern = format!("{{{{{}}}}}", key);
            result = result.replace(&pattern, value);
        }
        result
    }
}

/// Prompt library for loading and caching prompts
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Create a prompt library with the default override directory
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with a custom override directory
    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with no override directory (embedded only)
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: HashMap::new(),
        }
    }

    /// Get a prompt by ID, loading from override or default
    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        if !self.cache.contains_key(&id) {
            let prompt = self.load(id)?;
            self.cache.insert(id, prompt);
        }
        self.cache
            .get(&id)
            .ok_or_else(|| Error::Prompt(format!("Prompt {} not loaded", id.as_str())))
    }

    fn load(&self, id: PromptId) -> Result<Prompt> {
        if let Some(ref override_dir) = self.override_dir {
            let override_path = override_dir.join(format!("{}.md", id.as_str()));
            if override_path.exists() {
                let content = fs::read_to_string(&override_path).map_err(|e| {
                    Error::Prompt(format!(
                        "Failed to read prompt override {}: {}",
                        override_path.display(),
                        e
                    ))
                })?;
                let (metadata, body) = parse_prompt(&content)?;
                return Ok(Prompt {
                    metadata,
                    content: body,
                });
            }
        }

        let (metadata, body) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content: body,
        })
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("penny").join("prompts").join("overrides"))
}

/// Render the categorization prompt for a batch of transactions
///
/// Transactions are numbered from 1 in slice order; the model answers with
/// those numbers.
pub fn render_categorization(
    prompt: &Prompt,
    transactions: &[Transaction],
    categories: &CategorySet,
    patterns: &BTreeMap<String, String>,
) -> String {
    let category_list = format_category_list(categories);
    let learned = format_learned_patterns(patterns);
    let transaction_list = format_transaction_list(transactions, categories);

    let mut vars = HashMap::new();
    vars.insert("categories", category_list.as_str());
    vars.insert("learned_patterns", learned.as_str());
    vars.insert("transactions", transaction_list.as_str());
    prompt.render(&vars)
}

fn format_category_list(categories: &CategorySet) -> String {
    categories
        .sorted_names()
        .iter()
        .map(|name| format!("- {name}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_learned_patterns(patterns: &BTreeMap<String, String>) -> String {
    if patterns.is_empty() {
        return NO_PATTERNS.to_string();
    }
    patterns
        .iter()
        .map(|(payee, category)| format!("- {payee}: {category}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_transaction_list(transactions: &[Transaction], categories: &CategorySet) -> String {
    transactions
        .iter()
        .enumerate()
        .map(|(i, txn)| {
            let mut line = format!(
                "{}. {} - ${} on {}",
                i + 1,
                txn.payee(),
                txn.display_amount(),
                txn.date
            );
            if let Some(ref category_id) = txn.category_id {
                let existing = categories.name_for(category_id).unwrap_or("Unknown");
                line.push_str(&format!(" (YNAB suggested: {existing})"));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    if !content.starts_with("---") {
        return Err(Error::Prompt(
            "Prompt must start with YAML frontmatter (---)".into(),
        ));
    }

    let rest = &content[3..];
    let end = rest.find("---").ok_or_else(|| {
        Error::Prompt("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::Prompt(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}
