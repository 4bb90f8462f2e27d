//! Known budget categories and free-text category resolution

use std::collections::BTreeSet;

use thiserror::Error;

use crate::models::{Category, CategoryGroup};

/// Group names the budgeting API uses for internal bookkeeping
const INTERNAL_GROUPS: &[&str] = &["Internal Master Category", "Hidden Categories"];

/// How many names an unknown-category reply lists
pub const HINT_LIMIT: usize = 10;

/// Free-text input that matched no known category
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Category '{input}' not found. Available categories include: {}", .known.join(", "))]
pub struct UnknownCategory {
    pub input: String,
    /// Up to ten known names, sorted
    pub known: Vec<String>,
}

/// The visible categories of one budget, in API enumeration order
#[derive(Debug, Clone, Default)]
pub struct CategorySet {
    categories: Vec<Category>,
}

impl CategorySet {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// Build from API groups, dropping internal groups and hidden or deleted entries
    pub fn from_groups(groups: Vec<CategoryGroup>) -> Self {
        let categories = groups
            .into_iter()
            .filter(|g| !g.hidden && !g.deleted && !INTERNAL_GROUPS.contains(&g.name.as_str()))
            .flat_map(|g| g.categories)
            .filter(|c| !c.hidden && !c.deleted)
            .map(|c| Category {
                id: c.id,
                name: c.name,
            })
            .collect();

        Self { categories }
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Category name for an id
    pub fn name_for(&self, id: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
    }

    /// Category id for an exact name; the last category with that name wins
    pub fn id_for(&self, name: &str) -> Option<&str> {
        self.categories
            .iter()
            .rev()
            .find(|c| c.name == name)
            .map(|c| c.id.as_str())
    }

    /// Unique names in enumeration order
    fn unique_names(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.categories
            .iter()
            .map(|c| c.name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Unique names, sorted
    pub fn sorted_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| c.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Resolve free text to a canonical category name.
    ///
    /// Tries an exact match, then a case-insensitive match, then the first
    /// name (in enumeration order) containing the input case-insensitively.
    pub fn resolve(&self, input: &str) -> Result<&str, UnknownCategory> {
        let input = input.trim();
        let names = self.unique_names();

        if !input.is_empty() {
            if let Some(name) = names.iter().copied().find(|n| *n == input) {
                return Ok(name);
            }

            let needle = input.to_lowercase();
            if let Some(name) = names.iter().copied().find(|n| n.to_lowercase() == needle) {
                return Ok(name);
            }
            if let Some(name) = names
                .iter()
                .copied()
                .find(|n| n.to_lowercase().contains(&needle))
            {
                return Ok(name);
            }
        }

        Err(UnknownCategory {
            input: input.to_string(),
            known: self.sorted_names().into_iter().take(HINT_LIMIT).collect(),
        })
    }
}

/// Emoji shown next to a category, first keyword contained in the name wins
const CATEGORY_EMOJI: &[(&str, &str)] = &[
    ("groceries", "🛒"),
    ("grocery", "🛒"),
    ("dining", "🍽️"),
    ("restaurant", "🍽️"),
    ("food", "🍽️"),
    ("gas", "⛽"),
    ("fuel", "⛽"),
    ("coffee", "☕"),
    ("shopping", "🛍️"),
    ("entertainment", "🎬"),
    ("utilities", "💡"),
    ("rent", "🏠"),
    ("housing", "🏠"),
    ("mortgage", "🏠"),
    ("transportation", "🚗"),
    ("transit", "🚇"),
    ("health", "🏥"),
    ("medical", "🏥"),
    ("fitness", "💪"),
    ("gym", "💪"),
    ("subscriptions", "📱"),
    ("insurance", "🛡️"),
    ("gifts", "🎁"),
    ("travel", "✈️"),
    ("clothing", "👕"),
    ("personal", "👤"),
    ("pets", "🐾"),
    ("education", "📚"),
    ("income", "💰"),
    ("savings", "🏦"),
];

pub fn category_emoji(category: &str) -> &'static str {
    let lower = category.to_lowercase();
    CATEGORY_EMOJI
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, emoji)| *emoji)
        .unwrap_or("💳")
}
