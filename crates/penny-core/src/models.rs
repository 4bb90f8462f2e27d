//! Domain models for Penny

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Display name used when the budgeting API has no payee
pub const UNKNOWN_PAYEE: &str = "Unknown payee";

/// A transaction as delivered by the budgeting API
///
/// Amounts are milliunits: thousandths of the major currency unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub amount: i64,
    #[serde(default)]
    pub payee_name: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    pub account_id: String,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
    /// Counter-account, present only on transfers between tracked accounts
    #[serde(default, deserialize_with = "deserialize_non_empty")]
    pub transfer_account_id: Option<String>,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtransactions: Vec<SubTransaction>,
}

impl Transaction {
    pub fn payee(&self) -> &str {
        self.payee_name
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(UNKNOWN_PAYEE)
    }

    pub fn is_transfer(&self) -> bool {
        self.transfer_account_id.is_some()
    }

    pub fn is_split(&self) -> bool {
        !self.subtransactions.is_empty()
    }

    /// Absolute amount in major units, e.g. `12.34`
    pub fn display_amount(&self) -> String {
        format_milliunits(self.amount)
    }
}

/// A line of a split transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTransaction {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

/// A budget category (visible categories only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// A category group as returned by the budgeting API
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub categories: Vec<ApiCategory>,
}

/// A raw category entry, including hidden and deleted ones
#[derive(Debug, Clone, Deserialize)]
pub struct ApiCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub deleted: bool,
}

/// A budget account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub deleted: bool,
}

/// How sure the model is about a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::High => "🟢",
            Self::Medium => "🟡",
            Self::Low => "🔴",
        }
    }

    /// Lenient parse: anything unrecognized is medium
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transaction with the model's suggested category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub suggested_category: String,
    #[serde(default)]
    pub confidence: Confidence,
}

/// Two linked transfer transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPair {
    pub first: Transaction,
    pub second: Transaction,
}

impl TransferPair {
    pub fn ids(&self) -> [&str; 2] {
        [self.first.id.as_str(), self.second.id.as_str()]
    }
}

/// Transactions awaiting a human decision, tied to one chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingBatch {
    #[serde(default)]
    pub transactions: Vec<CategorizedTransaction>,
    #[serde(default)]
    pub transfer_pairs: Vec<TransferPair>,
    pub created_at: DateTime<Utc>,
}

impl PendingBatch {
    pub fn new(transactions: Vec<CategorizedTransaction>, transfer_pairs: Vec<TransferPair>) -> Self {
        Self {
            transactions,
            transfer_pairs,
            created_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty() && self.transfer_pairs.is_empty()
    }
}

/// Format a milliunit amount as an absolute major-unit string with two decimals
pub fn format_milliunits(amount: i64) -> String {
    let abs = amount.unsigned_abs();
    // Round half up to the nearest cent
    let cents = (abs + 5) / 10;
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// Normalize a payee name into a learned-pattern key
pub fn normalize_payee(payee: &str) -> String {
    payee.trim().to_lowercase()
}

fn deserialize_non_empty<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
