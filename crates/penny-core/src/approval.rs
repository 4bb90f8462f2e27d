//! Approval commands and their effects
//!
//! Replies in the summary thread and button/dropdown interactions both end up
//! here. Each command runs as one read-modify-write cycle on the state store:
//! the pending batch is looked up by the summary's message timestamp, the
//! budgeting API is updated item by item, and the document is saved once.
//!
//! Positions in commands refer to the batch's current list, which is
//! re-indexed after every partial approval.

use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{info, warn};

use crate::categories::{CategorySet, UnknownCategory};
use crate::error::{Error, Result};
use crate::models::{CategorizedTransaction, Transaction};
use crate::state::StateStore;
use crate::summary::{
    ACTION_APPROVE_ALL, ACTION_APPROVE_PREFIX, ACTION_APPROVE_TRANSFERS, ACTION_CHANGE_PREFIX,
    ACTION_SKIP,
};
use crate::ynab::YnabClient;

pub const NOT_FOUND_REPLY: &str =
    "❌ Could not find pending transactions. They may have already been processed.";
pub const SKIP_REPLY: &str = "👍 Skipped. I'll check again tomorrow.";
pub const HELP_REPLY: &str = "🤔 I didn't understand that. Try:\n• `approve all`\n• `approve 1,3,5`\n• `1: Category Name`\n• `skip`";
pub const NO_LONGER_PENDING_REPLY: &str = "❌ That transaction is no longer pending.";
pub const NO_TRANSFERS_REPLY: &str = "❌ No transfer pairs are pending for this message.";

/// A 1-based position as written in a reply
///
/// The digits are kept so numbers too large for `usize` are still reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position(String);

impl Position {
    pub fn new(digits: &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        Self(if trimmed.is_empty() { "0" } else { trimmed }.to_string())
    }

    /// 0-based index; `None` for 0 or a number that cannot index anything
    pub fn index(&self) -> Option<usize> {
        self.0.parse::<usize>().ok()?.checked_sub(1)
    }
}

impl From<usize> for Position {
    fn from(n: usize) -> Self {
        Self(n.to_string())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A free-text reply in the summary thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalCommand {
    ApproveAll,
    /// Positions in the order written
    Approve(Vec<Position>),
    ChangeCategory { position: Position, category: String },
    Skip,
    Help,
}

fn change_category_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d+):\s*(.+)").expect("valid regex"))
}

fn digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("valid regex"))
}

impl ApprovalCommand {
    /// Interpret a reply. Forms are tried in order; the first match wins.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let lower = trimmed.to_lowercase();

        if lower.contains("approve all") {
            return Self::ApproveAll;
        }

        if lower.starts_with("approve ") {
            let positions = digits_re()
                .find_iter(&lower)
                .map(|m| Position::new(m.as_str()))
                .collect();
            return Self::Approve(positions);
        }

        // Category text keeps its case; resolution is case-insensitive anyway
        if let Some(caps) = change_category_re().captures(trimmed) {
            return Self::ChangeCategory {
                position: Position::new(&caps[1]),
                category: caps[2].trim().to_string(),
            };
        }

        if lower == "skip" {
            return Self::Skip;
        }

        Self::Help
    }
}

/// A button press or dropdown selection on the summary message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalAction {
    ApproveAll,
    ApproveTransaction { transaction_id: String },
    ChangeCategory { transaction_id: String, category: String },
    ApproveTransfers,
    Skip,
}

impl ApprovalAction {
    /// Map an interaction to an action
    ///
    /// `value` is the button value, `selected` the chosen dropdown option and
    /// `block_id` the id of the block the element lives in. Unknown action ids
    /// yield `None`.
    pub fn from_interaction(
        action_id: &str,
        value: Option<&str>,
        selected: Option<&str>,
        block_id: Option<&str>,
    ) -> Option<Self> {
        match action_id {
            ACTION_APPROVE_ALL => Some(Self::ApproveAll),
            ACTION_APPROVE_TRANSFERS => Some(Self::ApproveTransfers),
            ACTION_SKIP => Some(Self::Skip),
            id if id.starts_with(ACTION_APPROVE_PREFIX) => Some(Self::ApproveTransaction {
                transaction_id: value?.to_string(),
            }),
            id if id.starts_with(ACTION_CHANGE_PREFIX) => Some(Self::ChangeCategory {
                transaction_id: block_id?.to_string(),
                category: selected?.to_string(),
            }),
            _ => None,
        }
    }
}

/// Why a single item could not be approved
enum ItemFailure {
    Unknown(UnknownCategory),
    Update(Error),
}

/// Outcome of approving a set of positions
struct Applied {
    lines: Vec<String>,
    approved: Vec<String>,
}

pub struct ApprovalService {
    store: StateStore,
    ynab: YnabClient,
}

impl ApprovalService {
    pub fn new(store: StateStore, ynab: YnabClient) -> Self {
        Self { store, ynab }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Apply a free-text reply posted in the thread of `message_ts`
    pub async fn handle_message(&self, message_ts: &str, text: &str) -> Result<String> {
        let command = ApprovalCommand::parse(text);
        info!(message_ts, ?command, "Handling approval reply");

        match command {
            ApprovalCommand::ApproveAll => self.approve_all(message_ts).await,
            ApprovalCommand::Approve(positions) => {
                self.approve_selected(message_ts, Selection::Positions(positions))
                    .await
            }
            ApprovalCommand::ChangeCategory { position, category } => {
                self.change_category(message_ts, Target::Position(position), &category)
                    .await
            }
            ApprovalCommand::Skip => self.reply_if_pending(message_ts, SKIP_REPLY),
            ApprovalCommand::Help => self.reply_if_pending(message_ts, HELP_REPLY),
        }
    }

    /// Apply a button press or dropdown selection on the message `message_ts`
    pub async fn handle_action(&self, message_ts: &str, action: ApprovalAction) -> Result<String> {
        info!(message_ts, ?action, "Handling approval action");

        match action {
            ApprovalAction::ApproveAll => self.approve_all(message_ts).await,
            ApprovalAction::ApproveTransaction { transaction_id } => {
                self.approve_selected(message_ts, Selection::Id(transaction_id))
                    .await
            }
            ApprovalAction::ChangeCategory {
                transaction_id,
                category,
            } => {
                self.change_category(message_ts, Target::Id(transaction_id), &category)
                    .await
            }
            ApprovalAction::ApproveTransfers => self.approve_transfers(message_ts).await,
            ApprovalAction::Skip => self.reply_if_pending(message_ts, SKIP_REPLY),
        }
    }

    fn reply_if_pending(&self, message_ts: &str, reply: &str) -> Result<String> {
        let state = self.store.load()?;
        Ok(match state.pending_batch(message_ts) {
            Some(_) => reply.to_string(),
            None => NOT_FOUND_REPLY.to_string(),
        })
    }

    /// Resolve and push one category update
    async fn push_category(
        &self,
        txn: &Transaction,
        input: &str,
        categories: &CategorySet,
    ) -> std::result::Result<String, ItemFailure> {
        let name = categories.resolve(input).map_err(ItemFailure::Unknown)?;
        let category_id = categories
            .id_for(name)
            .ok_or_else(|| {
                ItemFailure::Update(Error::InvalidData(format!("No id for category {name}")))
            })?
            .to_string();
        let name = name.to_string();

        self.ynab
            .update_category(&txn.id, &category_id)
            .await
            .map_err(ItemFailure::Update)?;
        Ok(name)
    }

    /// Approve the given positions with their suggested categories
    async fn apply_positions(
        &self,
        items: &[CategorizedTransaction],
        positions: &[Position],
        categories: &CategorySet,
        learned: &mut Vec<(String, String)>,
    ) -> Applied {
        let mut applied = Applied {
            lines: Vec::new(),
            approved: Vec::new(),
        };

        for n in positions {
            let Some(item) = n.index().and_then(|i| items.get(i)) else {
                applied.lines.push(format!("❌ {}. Invalid transaction number", n));
                continue;
            };
            let txn = &item.transaction;

            match self
                .push_category(txn, &item.suggested_category, categories)
                .await
            {
                Ok(name) => {
                    applied
                        .lines
                        .push(format!("✅ {}. {} → {}", n, txn.payee(), name));
                    learned.push((txn.payee().to_string(), name));
                    applied.approved.push(txn.id.clone());
                }
                Err(failure) => {
                    log_failure(txn, &failure);
                    applied
                        .lines
                        .push(format!("❌ {}. {} (failed)", n, txn.payee()));
                }
            }
        }

        applied
    }

    async fn approve_all(&self, message_ts: &str) -> Result<String> {
        let mut state = self.store.lock().await?;
        let Some(batch) = state.pending_batch(message_ts) else {
            return Ok(NOT_FOUND_REPLY.to_string());
        };
        let items = batch.transactions.clone();
        let categories = self.ynab.get_categories().await?;

        let positions: Vec<Position> = (1..=items.len()).map(Position::from).collect();
        let mut learned = Vec::new();
        let applied = self
            .apply_positions(&items, &positions, &categories, &mut learned)
            .await;

        let remaining = commit(&mut state, message_ts, &applied.approved, &learned);
        state.save()?;

        let mut reply = format!(
            "*Updated {}/{} transactions:*\n\n{}",
            applied.approved.len(),
            items.len(),
            applied.lines.join("\n")
        );
        if remaining > 0 {
            reply.push_str(&format!(
                "\n\n_{} transaction(s) still pending approval._",
                remaining
            ));
        }
        Ok(reply)
    }

    async fn approve_selected(&self, message_ts: &str, selection: Selection) -> Result<String> {
        let mut state = self.store.lock().await?;
        let Some(batch) = state.pending_batch(message_ts) else {
            return Ok(NOT_FOUND_REPLY.to_string());
        };
        let items = batch.transactions.clone();

        let positions: Vec<Position> = match selection {
            // A position repeated in one command is applied once
            Selection::Positions(positions) => {
                let mut seen = HashSet::new();
                positions.into_iter().filter(|p| seen.insert(p.clone())).collect()
            }
            Selection::Id(id) => match items.iter().position(|t| t.transaction.id == id) {
                Some(i) => vec![Position::from(i + 1)],
                None => return Ok(NO_LONGER_PENDING_REPLY.to_string()),
            },
        };
        let categories = self.ynab.get_categories().await?;

        let mut learned = Vec::new();
        let applied = self
            .apply_positions(&items, &positions, &categories, &mut learned)
            .await;

        let remaining = commit(&mut state, message_ts, &applied.approved, &learned);
        state.save()?;

        let mut reply = format!(
            "*Approved {} transaction(s):*\n\n{}",
            applied.approved.len(),
            applied.lines.join("\n")
        );
        if remaining > 0 {
            reply.push_str(&format!(
                "\n\n_{} transaction(s) still pending approval._",
                remaining
            ));
        }
        Ok(reply)
    }

    async fn change_category(&self, message_ts: &str, target: Target, input: &str) -> Result<String> {
        let mut state = self.store.lock().await?;
        let Some(batch) = state.pending_batch(message_ts) else {
            return Ok(NOT_FOUND_REPLY.to_string());
        };

        let found = match target {
            Target::Position(ref n) => n
                .index()
                .and_then(|i| batch.transactions.get(i))
                .ok_or_else(|| format!("❌ Invalid transaction number: {}", n)),
            Target::Id(ref id) => batch
                .transactions
                .iter()
                .find(|t| &t.transaction.id == id)
                .ok_or_else(|| NO_LONGER_PENDING_REPLY.to_string()),
        };
        let txn = match found {
            Ok(item) => item.transaction.clone(),
            Err(reply) => return Ok(reply),
        };

        let categories = self.ynab.get_categories().await?;
        let name = match self.push_category(&txn, input, &categories).await {
            Ok(name) => name,
            Err(ItemFailure::Unknown(unknown)) => return Ok(format!("❌ {}...", unknown)),
            Err(failure) => {
                log_failure(&txn, &failure);
                return Ok(format!("❌ Failed to update {}", txn.payee()));
            }
        };

        let learned = vec![(txn.payee().to_string(), name.clone())];
        let remaining = commit(&mut state, message_ts, &[txn.id.clone()], &learned);
        state.save()?;

        let mut reply = format!("✅ Updated: {} → {}", txn.payee(), name);
        if remaining > 0 {
            reply.push_str(&format!("\n\n_{} transaction(s) still pending._", remaining));
        }
        Ok(reply)
    }

    /// Approve both sides of every pending transfer pair
    async fn approve_transfers(&self, message_ts: &str) -> Result<String> {
        let mut state = self.store.lock().await?;
        let Some(batch) = state.pending_batch(message_ts) else {
            return Ok(NOT_FOUND_REPLY.to_string());
        };
        let pairs = batch.transfer_pairs.clone();
        if pairs.is_empty() {
            return Ok(NO_TRANSFERS_REPLY.to_string());
        }

        let mut lines = Vec::new();
        let mut approved_pairs = Vec::new();
        for pair in &pairs {
            let line = format!(
                "${} - {} ↔ {}",
                pair.first.display_amount(),
                pair.first.payee(),
                pair.second.payee()
            );
            let mut ok = true;
            for id in pair.ids() {
                if let Err(e) = self.ynab.approve_transaction(id).await {
                    warn!(transaction_id = id, error = %e, "Failed to approve transfer");
                    ok = false;
                }
            }
            if ok {
                lines.push(format!("✅ {}", line));
                approved_pairs.push(pair.ids().map(String::from));
            } else {
                lines.push(format!("❌ {} (failed)", line));
            }
        }

        for ids in &approved_pairs {
            for id in ids {
                state.mark_processed(id);
            }
        }
        if let Some(batch) = state.pending_batch_mut(message_ts) {
            batch
                .transfer_pairs
                .retain(|p| !approved_pairs.iter().any(|ids| ids[0] == p.first.id));
        }
        state.prune_batch(message_ts);
        state.save()?;

        Ok(format!(
            "*Approved {}/{} transfer pair(s):*\n\n{}",
            approved_pairs.len(),
            pairs.len(),
            lines.join("\n")
        ))
    }
}

/// Which transaction a category change applies to
enum Target {
    Position(Position),
    Id(String),
}

/// Which transactions an approval applies to
enum Selection {
    Positions(Vec<Position>),
    Id(String),
}

fn log_failure(txn: &Transaction, failure: &ItemFailure) {
    match failure {
        ItemFailure::Unknown(unknown) => {
            warn!(transaction_id = %txn.id, category = %unknown.input, "Suggested category not found")
        }
        ItemFailure::Update(e) => {
            warn!(transaction_id = %txn.id, error = %e, "Failed to update transaction category")
        }
    }
}

/// Record successes in the state and drop them from the batch
///
/// Returns how many transactions are still pending in the batch.
fn commit(
    state: &mut crate::state::AgentState,
    message_ts: &str,
    approved: &[String],
    learned: &[(String, String)],
) -> usize {
    for (payee, category) in learned {
        state.learn_pattern(payee, category);
    }
    for id in approved {
        state.mark_processed(id);
    }

    let remaining = match state.pending_batch_mut(message_ts) {
        Some(batch) => {
            batch
                .transactions
                .retain(|t| !approved.contains(&t.transaction.id));
            batch.transactions.len()
        }
        None => 0,
    };
    state.prune_batch(message_ts);
    remaining
}
