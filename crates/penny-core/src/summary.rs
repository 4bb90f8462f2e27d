//! Slack summary rendering
//!
//! Builds the Block Kit layout posted by the daily run, plus a plain-text
//! rendering of the same content for dry runs and notification fallbacks.
//!
//! Action ids are the contract with the interaction handler in
//! [`crate::approval`].

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::categories::category_emoji;
use crate::models::{CategorizedTransaction, TransferPair};

/// Slack rejects static selects with more options than this
pub const MAX_SELECT_OPTIONS: usize = 100;

pub const ACTION_APPROVE_ALL: &str = "approve_all_transactions";
pub const ACTION_APPROVE_TRANSFERS: &str = "approve_all_transfers";
pub const ACTION_SKIP: &str = "skip_transactions";
pub const ACTION_APPROVE_PREFIX: &str = "approve_transaction_";
pub const ACTION_CHANGE_PREFIX: &str = "change_category_";

const UNKNOWN_ACCOUNT: &str = "Unknown";

/// Everything a summary message shows
pub struct Summary<'a> {
    pub transactions: &'a [CategorizedTransaction],
    pub transfer_pairs: &'a [TransferPair],
    /// Account id → name, needed only when there are transfer pairs
    pub account_names: &'a HashMap<String, String>,
    /// Sorted category names for the dropdown
    pub category_names: &'a [String],
}

impl Summary<'_> {
    /// Unapproved transaction count; each pair counts twice
    pub fn total(&self) -> usize {
        self.transactions.len() + 2 * self.transfer_pairs.len()
    }

    fn header(&self) -> String {
        format!(
            "📋 Good morning! You have {} unapproved transaction(s):",
            self.total()
        )
    }

    fn account_name(&self, account_id: &str) -> &str {
        self.account_names
            .get(account_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_ACCOUNT)
    }

    fn transfer_lines(&self) -> Vec<String> {
        self.transfer_pairs
            .iter()
            .map(|pair| {
                format!(
                    "• ${} - {} ↔ {}",
                    pair.first.display_amount(),
                    self.account_name(&pair.first.account_id),
                    self.account_name(&pair.second.account_id)
                )
            })
            .collect()
    }

    /// Notification fallback shown where blocks are not rendered
    pub fn fallback_text(&self) -> String {
        format!("You have {} unapproved transaction(s)", self.total())
    }

    /// Block Kit layout for `chat.postMessage`
    pub fn blocks(&self) -> Value {
        let mut blocks = vec![json!({
            "type": "header",
            "text": {"type": "plain_text", "text": self.header(), "emoji": true}
        })];

        if !self.transfer_pairs.is_empty() {
            blocks.push(divider());
            blocks.push(mrkdwn_section(&format!(
                "*🔄 Found {} matching transfer pair(s):*",
                self.transfer_pairs.len()
            )));
            blocks.push(mrkdwn_section(&self.transfer_lines().join("\n")));
            blocks.push(json!({
                "type": "actions",
                "elements": [button("✓ Approve All Transfers", ACTION_APPROVE_TRANSFERS, ACTION_APPROVE_TRANSFERS, true)]
            }));
        }

        blocks.push(divider());
        if !self.transactions.is_empty() {
            blocks.push(mrkdwn_section(&format!(
                "*💳 {} regular transaction(s) to categorize:*",
                self.transactions.len()
            )));
            blocks.push(divider());
        }

        let options: Vec<Value> = self
            .category_names
            .iter()
            .take(MAX_SELECT_OPTIONS)
            .map(|name| {
                json!({
                    "text": {"type": "plain_text", "text": name},
                    "value": name
                })
            })
            .collect();

        for (i, item) in self.transactions.iter().enumerate() {
            let n = i + 1;
            let txn = &item.transaction;

            let mut section = mrkdwn_section(&transaction_text(n, item));
            section["accessory"] = button(
                "✓ Approve",
                &format!("{ACTION_APPROVE_PREFIX}{n}"),
                &txn.id,
                true,
            );
            blocks.push(section);

            let mut select = mrkdwn_section(" ");
            select["block_id"] = json!(txn.id);
            select["accessory"] = json!({
                "type": "static_select",
                "placeholder": {"type": "plain_text", "text": "Change category", "emoji": true},
                "options": &options,
                "action_id": format!("{ACTION_CHANGE_PREFIX}{n}")
            });
            blocks.push(select);

            blocks.push(divider());
        }

        blocks.push(json!({
            "type": "actions",
            "elements": [
                button("✓ Approve All Regular", ACTION_APPROVE_ALL, "approve_all", true),
                button("Skip", ACTION_SKIP, "skip", false)
            ]
        }));

        Value::Array(blocks)
    }

    /// Plain-text rendering with reply instructions
    pub fn text(&self) -> String {
        let mut message = format!("*{}*\n\n", self.header());

        if !self.transfer_pairs.is_empty() {
            message.push_str(&format!(
                "*🔄 Found {} matching transfer pair(s):*\n",
                self.transfer_pairs.len()
            ));
            for line in self.transfer_lines() {
                message.push_str(&line);
                message.push('\n');
            }
            message.push('\n');
        }

        for (i, item) in self.transactions.iter().enumerate() {
            let txn = &item.transaction;
            message.push_str(&format!(
                "{}. {} *{}* - ${}\n   → {} {}\n   _{}_\n\n",
                i + 1,
                category_emoji(&item.suggested_category),
                txn.payee(),
                txn.display_amount(),
                item.suggested_category,
                item.confidence.emoji(),
                txn.date
            ));
        }

        message.push_str("*To approve:*\n");
        message.push_str("• Reply `approve all` to categorize everything\n");
        message.push_str("• Reply `approve 1,3,5` to approve specific numbers\n");
        message.push_str("• Reply `1: Groceries` to change category for transaction 1\n");
        message.push_str("• Reply `skip` to ignore for now\n");
        message
    }
}

fn transaction_text(n: usize, item: &CategorizedTransaction) -> String {
    let txn = &item.transaction;
    format!(
        "*{}. {} {}* - ${}\n→ {} {}\n_{}_",
        n,
        category_emoji(&item.suggested_category),
        txn.payee(),
        txn.display_amount(),
        item.suggested_category,
        item.confidence.emoji(),
        txn.date
    )
}

fn divider() -> Value {
    json!({"type": "divider"})
}

fn mrkdwn_section(text: &str) -> Value {
    json!({
        "type": "section",
        "text": {"type": "mrkdwn", "text": text}
    })
}

fn button(label: &str, action_id: &str, value: &str, primary: bool) -> Value {
    let mut button = json!({
        "type": "button",
        "text": {"type": "plain_text", "text": label, "emoji": true},
        "value": value,
        "action_id": action_id
    });
    if primary {
        button["style"] = json!("primary");
    }
    button
}
