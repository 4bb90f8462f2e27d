//! Persisted agent state
//!
//! One JSON document holds the processed transaction ids, the learned
//! payee → category patterns, and every pending approval batch. It is read in
//! full and rewritten in full on each mutation.
//!
//! All read-modify-write cycles go through [`StateStore::lock`], which holds an
//! async mutex for the duration of the cycle. That serializes writers inside
//! one process; a second process writing the same file can still interleave.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{normalize_payee, PendingBatch};

/// The whole state document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Append-only set of transaction ids that need no further attention
    #[serde(default)]
    pub processed_transactions: Vec<String>,
    /// Normalized payee → category name
    #[serde(default)]
    pub category_patterns: BTreeMap<String, String>,
    /// Pending batches keyed by chat message timestamp
    #[serde(default)]
    pub pending: BTreeMap<String, PendingBatch>,
}

impl AgentState {
    pub fn is_processed(&self, transaction_id: &str) -> bool {
        self.processed_transactions.iter().any(|id| id == transaction_id)
    }

    /// Add an id to the processed set; a repeat is a no-op
    pub fn mark_processed(&mut self, transaction_id: &str) {
        if !self.is_processed(transaction_id) {
            self.processed_transactions.push(transaction_id.to_string());
        }
    }

    /// Remember a payee → category association, replacing any earlier one
    pub fn learn_pattern(&mut self, payee: &str, category: &str) {
        self.category_patterns
            .insert(normalize_payee(payee), category.to_string());
    }

    pub fn pending_batch(&self, message_ts: &str) -> Option<&PendingBatch> {
        self.pending.get(message_ts)
    }

    pub fn pending_batch_mut(&mut self, message_ts: &str) -> Option<&mut PendingBatch> {
        self.pending.get_mut(message_ts)
    }

    /// Drop the batch once nothing in it is waiting
    pub fn prune_batch(&mut self, message_ts: &str) {
        if self.pending.get(message_ts).is_some_and(PendingBatch::is_empty) {
            self.pending.remove(message_ts);
        }
    }
}

/// File-backed store with a single in-process writer
#[derive(Clone)]
pub struct StateStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current document; a missing file is an empty state
    pub fn load(&self) -> Result<AgentState> {
        if !self.path.exists() {
            return Ok(AgentState::default());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(AgentState::default());
        }
        serde_json::from_str(&content).map_err(|e| {
            Error::InvalidData(format!(
                "Corrupt state file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Start a read-modify-write cycle
    ///
    /// The document is reloaded after the lock is taken, so the caller always
    /// mutates what is on disk now.
    pub async fn lock(&self) -> Result<StateGuard<'_>> {
        let guard = self.lock.lock().await;
        let state = self.load()?;
        Ok(StateGuard {
            _guard: guard,
            store: self,
            state,
        })
    }

    /// Replace the document on disk via a temp file in the same directory
    fn write(&self, state: &AgentState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, state)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        debug!(
            path = %self.path.display(),
            processed = state.processed_transactions.len(),
            pending = state.pending.len(),
            "Saved agent state"
        );
        Ok(())
    }
}

/// Exclusive access to the state document until dropped
pub struct StateGuard<'a> {
    _guard: MutexGuard<'a, ()>,
    store: &'a StateStore,
    state: AgentState,
}

impl StateGuard<'_> {
    /// Write the (possibly mutated) document back to disk
    pub fn save(&self) -> Result<()> {
        self.store.write(&self.state)
    }
}

impl Deref for StateGuard<'_> {
    type Target = AgentState;

    fn deref(&self) -> &AgentState {
        &self.state
    }
}

impl DerefMut for StateGuard<'_> {
    fn deref_mut(&mut self) -> &mut AgentState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategorizedTransaction, Confidence, Transaction};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn categorized(id: &str) -> CategorizedTransaction {
        CategorizedTransaction {
            transaction: Transaction {
                id: id.to_string(),
                date: NaiveDate::from_ymd_opt(2026, 10, 2).unwrap(),
                amount: -1_000,
                payee_name: Some("Cafe".into()),
                memo: None,
                account_id: "acc".into(),
                account_name: None,
                category_id: None,
                category_name: None,
                transfer_account_id: None,
                approved: false,
                deleted: false,
                subtransactions: vec![],
            },
            suggested_category: "Coffee".into(),
            confidence: Confidence::High,
        }
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        assert_eq!(store.load().unwrap(), AgentState::default());
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("nested").join("state.json"));

        {
            let mut state = store.lock().await.unwrap();
            state.mark_processed("t1");
            state.learn_pattern("  Blue Bottle ", "Coffee");
            state
                .pending
                .insert("123.456".into(), PendingBatch::new(vec![categorized("t2")], vec![]));
            state.save().unwrap();
        }

        let loaded = store.load().unwrap();
        assert_eq!(loaded.processed_transactions, vec!["t1"]);
        assert_eq!(
            loaded.category_patterns.get("blue bottle").map(String::as_str),
            Some("Coffee")
        );
        let batch = loaded.pending_batch("123.456").unwrap();
        assert_eq!(batch.transactions[0].transaction.id, "t2");
    }

    #[tokio::test]
    async fn test_unsaved_changes_are_discarded() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        {
            let mut state = store.lock().await.unwrap();
            state.mark_processed("t1");
        }

        assert!(store.load().unwrap().processed_transactions.is_empty());
    }

    #[test]
    fn test_mark_processed_is_idempotent() {
        let mut state = AgentState::default();
        state.mark_processed("t1");
        state.mark_processed("t1");
        assert_eq!(state.processed_transactions, vec!["t1"]);
    }

    #[test]
    fn test_later_pattern_overwrites() {
        let mut state = AgentState::default();
        state.learn_pattern("Costco", "Groceries");
        state.learn_pattern("COSTCO", "Shopping");
        assert_eq!(state.category_patterns.len(), 1);
        assert_eq!(state.category_patterns["costco"], "Shopping");
    }

    #[test]
    fn test_prune_only_empty_batches() {
        let mut state = AgentState::default();
        state
            .pending
            .insert("a".into(), PendingBatch::new(vec![categorized("t1")], vec![]));
        state.pending.insert("b".into(), PendingBatch::new(vec![], vec![]));

        state.prune_batch("a");
        state.prune_batch("b");

        assert!(state.pending.contains_key("a"));
        assert!(!state.pending.contains_key("b"));
    }

    #[test]
    fn test_corrupt_file_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        let store = StateStore::new(&path);
        assert!(matches!(store.load(), Err(Error::InvalidData(_))));
    }
}
