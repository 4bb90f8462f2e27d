//! The daily fetch → categorize → publish pipeline
//!
//! A straight sequence of awaited calls; any failure aborts the run. The
//! pending batch is only persisted after the summary was posted, keyed by the
//! message timestamp Slack returned.

use std::collections::HashMap;

use chrono::{Duration, Local, NaiveDate};
use tracing::info;

use crate::ai::{AIBackend, AIClient};
use crate::categories::CategorySet;
use crate::config::{Config, Credential};
use crate::error::{Error, Result};
use crate::models::{CategorizedTransaction, PendingBatch, Transaction};
use crate::slack::SlackClient;
use crate::state::{AgentState, StateStore};
use crate::summary::Summary;
use crate::transfers::detect_transfer_pairs;
use crate::ynab::YnabClient;

/// Credentials the pipeline cannot start without
pub const REQUIRED_CREDENTIALS: &[Credential] = &[
    Credential::YnabToken,
    Credential::SlackToken,
    Credential::OpenRouterKey,
];

/// What one run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Unapproved transactions that needed attention
    pub fetched: usize,
    pub pairs: usize,
    pub regular: usize,
    /// Timestamp of the posted summary; `None` when nothing was posted
    pub message_ts: Option<String>,
    /// Text rendering, filled on dry runs
    pub preview: Option<String>,
}

pub struct Agent {
    config: Config,
    ynab: YnabClient,
    slack: SlackClient,
    ai: AIClient,
    store: StateStore,
}

impl Agent {
    /// Build the pipeline, failing with every missing credential listed
    pub fn from_config(config: Config) -> Result<Self> {
        config.require(REQUIRED_CREDENTIALS)?;

        Ok(Self {
            ynab: YnabClient::from_config(&config)?,
            slack: SlackClient::from_config(&config)?,
            ai: AIClient::from_config(&config)?,
            store: StateStore::new(config.state_file.clone()),
            config,
        })
    }

    /// Swap the AI backend (tests, model overrides)
    pub fn with_ai(mut self, ai: AIClient) -> Self {
        self.ai = ai;
        self
    }

    pub fn ai(&self) -> &AIClient {
        &self.ai
    }

    /// Run the pipeline; a dry run stops before posting and persists nothing
    pub async fn run(&self, dry_run: bool) -> Result<RunSummary> {
        info!(budget = %self.ynab.budget_id(), "Fetching YNAB categories");
        let categories = self.ynab.get_categories().await?;
        info!(count = categories.len(), "Found categories");

        let since = lookback_start(Local::now().date_naive(), self.config.days_back)?;
        info!(%since, "Fetching unapproved transactions");
        let transactions = self.ynab.get_transactions(since).await?;

        let state = self.store.load()?;
        let unapproved = select_unapproved(transactions, &state);
        info!(count = unapproved.len(), "Found unapproved transactions");

        if unapproved.is_empty() {
            info!("No work to do");
            return Ok(RunSummary::default());
        }

        let (pairs, regular) = detect_transfer_pairs(&unapproved);
        info!(
            pairs = pairs.len(),
            regular = regular.len(),
            "Separated transfer pairs"
        );

        let categorized = self.categorize(regular, &categories, &state).await?;

        let account_names = if pairs.is_empty() {
            HashMap::new()
        } else {
            self.ynab
                .get_accounts()
                .await?
                .into_iter()
                .map(|a| (a.id, a.name))
                .collect()
        };

        let category_names = categories.sorted_names();
        let summary = Summary {
            transactions: &categorized,
            transfer_pairs: &pairs,
            account_names: &account_names,
            category_names: &category_names,
        };

        let mut outcome = RunSummary {
            fetched: unapproved.len(),
            pairs: pairs.len(),
            regular: categorized.len(),
            message_ts: None,
            preview: None,
        };

        if dry_run {
            outcome.preview = Some(summary.text());
            return Ok(outcome);
        }

        info!(channel = %self.config.slack_channel, "Posting summary to Slack");
        let ts = self
            .slack
            .post_message(
                &self.config.slack_channel,
                &summary.fallback_text(),
                Some(&summary.blocks()),
                None,
            )
            .await?;

        {
            let mut state = self.store.lock().await?;
            state
                .pending
                .insert(ts.clone(), PendingBatch::new(categorized, pairs));
            state.save()?;
        }
        info!(message_ts = %ts, "Saved pending batch");

        outcome.message_ts = Some(ts);
        Ok(outcome)
    }

    async fn categorize(
        &self,
        regular: Vec<Transaction>,
        categories: &CategorySet,
        state: &AgentState,
    ) -> Result<Vec<CategorizedTransaction>> {
        if regular.is_empty() {
            return Ok(Vec::new());
        }

        info!(
            count = regular.len(),
            model = %self.ai.model(),
            "Requesting category suggestions"
        );
        let suggestions = self
            .ai
            .suggest_categories(&regular, categories, &state.category_patterns)
            .await?;

        Ok(regular
            .into_iter()
            .zip(suggestions)
            .map(|(transaction, suggestion)| CategorizedTransaction {
                transaction,
                suggested_category: suggestion.category,
                confidence: suggestion.confidence,
            })
            .collect())
    }
}

/// First day of the fetch window, counted back from the local date
pub fn lookback_start(today: NaiveDate, days_back: i64) -> Result<NaiveDate> {
    Some(days_back)
        .filter(|d| *d >= 0)
        .and_then(Duration::try_days)
        .and_then(|window| today.checked_sub_signed(window))
        .ok_or_else(|| Error::InvalidConfig(format!("DAYS_BACK={days_back}")))
}

/// Unapproved, not yet processed, not a split parent, not deleted
pub fn select_unapproved(transactions: Vec<Transaction>, state: &AgentState) -> Vec<Transaction> {
    transactions
        .into_iter()
        .filter(|t| !t.approved && !t.deleted && !t.is_split() && !state.is_processed(&t.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubTransaction;
    use chrono::Utc;
    use crate::test_utils::MockApiServer;
    use tempfile::TempDir;

    fn txn(id: &str, payee: &str, account: &str, amount: i64, transfer_to: Option<&str>) -> Transaction {
        Transaction {
            id: id.to_string(),
            date: Utc::now().date_naive(),
            amount,
            payee_name: Some(payee.to_string()),
            memo: None,
            account_id: account.to_string(),
            account_name: None,
            category_id: None,
            category_name: None,
            transfer_account_id: transfer_to.map(String::from),
            approved: false,
            deleted: false,
            subtransactions: vec![],
        }
    }

    fn mixed_transactions() -> Vec<Transaction> {
        let mut approved = txn("approved", "Landlord", "acc-checking", -1_500_000, None);
        approved.approved = true;
        let mut deleted = txn("deleted", "Oops", "acc-checking", -1_000, None);
        deleted.deleted = true;
        let mut split = txn("split", "Target", "acc-card", -80_000, None);
        split.subtransactions = vec![SubTransaction {
            id: "sub-1".into(),
            amount: -40_000,
            memo: None,
            category_id: None,
            deleted: false,
        }];

        vec![
            approved,
            deleted,
            split,
            txn("processed", "Old News", "acc-checking", -2_000, None),
            txn("t1", "Whole Foods", "acc-card", -12_340, None),
            txn("tr-a", "Transfer : Savings", "acc-checking", -50_000, Some("acc-savings")),
            txn("t2", "Shell", "acc-card", -45_000, None),
            txn("tr-b", "Transfer : Checking", "acc-savings", 50_000, Some("acc-checking")),
        ]
    }

    async fn setup() -> (MockApiServer, TempDir, Agent) {
        let server = MockApiServer::start().await;
        let dir = TempDir::new().unwrap();
        let config = server.config(&dir.path().join("state.json"));

        let store = StateStore::new(config.state_file.clone());
        {
            let mut state = store.lock().await.unwrap();
            state.mark_processed("processed");
            state.save().unwrap();
        }

        let agent = Agent::from_config(config).unwrap();
        (server, dir, agent)
    }

    #[test]
    fn test_select_unapproved() {
        let mut state = AgentState::default();
        state.mark_processed("processed");
        let ids: Vec<String> = select_unapproved(mixed_transactions(), &state)
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["t1", "tr-a", "t2", "tr-b"]);
    }

    #[test]
    fn test_missing_credentials_fail_before_any_call() {
        let config = Config::from_lookup(|_| None).unwrap();
        match Agent::from_config(config) {
            Err(Error::MissingCredentials(missing)) => assert_eq!(
                missing,
                vec!["YNAB_API_TOKEN", "SLACK_BOT_TOKEN", "OPENROUTER_API_KEY"]
            ),
            _ => panic!("expected missing credentials"),
        }
    }

    #[tokio::test]
    async fn test_full_run_posts_summary_and_persists_batch() {
        let (server, _dir, agent) = setup().await;
        server.set_transactions(mixed_transactions());
        server.set_completion(
            "```json\n[{\"transaction_number\": 2, \"category\": \"Gas\", \"confidence\": \"high\"},\n {\"transaction_number\": 1, \"category\": \"Groceries\"}]\n```",
        );

        let outcome = agent.run(false).await.unwrap();
        assert_eq!(outcome.fetched, 4);
        assert_eq!(outcome.pairs, 1);
        assert_eq!(outcome.regular, 2);
        let ts = outcome.message_ts.unwrap();

        let messages = server.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].channel, "#budget");
        let blocks = messages[0].blocks.as_ref().unwrap();
        assert_eq!(
            blocks[0]["text"]["text"],
            "📋 Good morning! You have 4 unapproved transaction(s):"
        );
        assert_eq!(blocks[3]["text"]["text"], "• $50.00 - Checking ↔ Savings");

        let completions = server.completions();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].authorization.as_deref(), Some("Bearer sk-or-test"));
        assert!(completions[0].referer.is_some());
        assert!(completions[0].title.is_some());
        assert_eq!(completions[0].body["max_tokens"], 2000);
        let prompt = completions[0].body["messages"][0]["content"].as_str().unwrap();
        assert!(prompt.contains("1. Whole Foods - $12.34"));
        assert!(prompt.contains("2. Shell - $45.00"));
        assert!(!prompt.contains("Transfer : Savings"));

        let state = StateStore::new(agent.config.state_file.clone()).load().unwrap();
        let batch = state.pending_batch(&ts).unwrap();
        assert_eq!(batch.transactions[0].suggested_category, "Groceries");
        assert_eq!(batch.transactions[1].suggested_category, "Gas");
        assert_eq!(batch.transfer_pairs[0].ids(), ["tr-a", "tr-b"]);
    }

    #[tokio::test]
    async fn test_no_work_posts_nothing() {
        let (server, _dir, agent) = setup().await;
        server.set_transactions(vec![txn("processed", "Old News", "acc-checking", -2_000, None)]);

        let outcome = agent.run(false).await.unwrap();
        assert_eq!(outcome, RunSummary::default());
        assert!(server.messages().is_empty());
        assert!(server.completions().is_empty());
    }

    #[tokio::test]
    async fn test_transfers_only_skips_ai_call() {
        let (server, _dir, agent) = setup().await;
        server.set_transactions(vec![
            txn("tr-a", "Transfer : Savings", "acc-checking", -50_000, Some("acc-savings")),
            txn("tr-b", "Transfer : Checking", "acc-savings", 50_000, Some("acc-checking")),
        ]);

        let outcome = agent.run(false).await.unwrap();
        assert_eq!(outcome.pairs, 1);
        assert_eq!(outcome.regular, 0);
        assert!(server.completions().is_empty());
        assert_eq!(server.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_posts_and_persists_nothing() {
        let (server, _dir, agent) = setup().await;
        let agent = agent.with_ai(AIClient::mock());
        server.set_transactions(vec![txn("t1", "Whole Foods Market", "acc-card", -12_340, None)]);

        let outcome = agent.run(true).await.unwrap();
        let preview = outcome.preview.unwrap();
        assert!(preview.contains("*Whole Foods Market* - $12.34"));
        assert!(outcome.message_ts.is_none());
        assert!(server.messages().is_empty());

        let state = StateStore::new(agent.config.state_file.clone()).load().unwrap();
        assert!(state.pending.is_empty());
    }

    #[tokio::test]
    async fn test_unreconcilable_suggestions_abort() {
        let (server, _dir, agent) = setup().await;
        server.set_transactions(vec![
            txn("t1", "Whole Foods", "acc-card", -12_340, None),
            txn("t2", "Shell", "acc-card", -45_000, None),
        ]);
        server.set_completion(r#"[{"transaction_number": 1, "category": "Groceries"}]"#);

        let err = agent.run(false).await.unwrap_err();
        assert!(matches!(err, Error::Suggestion(_)));
        assert!(server.messages().is_empty());
    }

    #[tokio::test]
    async fn test_slack_failure_persists_nothing() {
        let (server, _dir, agent) = setup().await;
        let agent = agent.with_ai(AIClient::mock());
        server.set_transactions(vec![txn("t1", "Shell", "acc-card", -45_000, None)]);
        server.fail_slack("not_in_channel");

        let err = agent.run(false).await.unwrap_err();
        assert!(matches!(err, Error::Chat(ref code) if code == "not_in_channel"));

        let state = StateStore::new(agent.config.state_file.clone()).load().unwrap();
        assert!(state.pending.is_empty());
    }

    #[tokio::test]
    async fn test_lookback_window() {
        let (server, _dir, agent) = setup().await;
        server.set_transactions(vec![]);
        agent.run(false).await.unwrap();

        let expected = Local::now().date_naive() - Duration::days(7);
        assert_eq!(
            server.last_since_date(),
            Some(expected.format("%Y-%m-%d").to_string())
        );
    }

    #[test]
    fn test_lookback_start() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        assert_eq!(
            lookback_start(today, 7).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 10).unwrap()
        );
        assert_eq!(lookback_start(today, 0).unwrap(), today);
        assert!(matches!(lookback_start(today, -1), Err(Error::InvalidConfig(_))));
        assert!(matches!(
            lookback_start(today, 9_999_999_999_999),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_window_is_a_config_error() {
        let server = MockApiServer::start().await;
        let dir = TempDir::new().unwrap();
        let mut config = server.config(&dir.path().join("state.json"));
        config.days_back = 9_999_999_999_999;
        let agent = Agent::from_config(config).unwrap();

        let err = agent.run(false).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(server.last_since_date().is_none());
        assert!(server.messages().is_empty());
    }
}
