//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use chrono::NaiveDate;
use clap::Parser;
use tempfile::TempDir;

use penny_core::test_utils::MockApiServer;
use penny_core::{
    CategorizedTransaction, Config, Confidence, Credential, PendingBatch, StateStore, Transaction,
};

use crate::cli::{Cli, Commands};
use crate::commands;

fn txn(id: &str, payee: &str) -> Transaction {
    Transaction {
        id: id.to_string(),
        date: NaiveDate::from_ymd_opt(2026, 10, 3).unwrap(),
        amount: -12_340,
        payee_name: Some(payee.to_string()),
        memo: None,
        account_id: "acc-card".to_string(),
        account_name: None,
        category_id: None,
        category_name: None,
        transfer_account_id: None,
        approved: false,
        deleted: false,
        subtransactions: vec![],
    }
}

fn empty_config() -> Config {
    Config::from_lookup(|_| None).unwrap()
}

// ========== Argument Parsing Tests ==========

#[test]
fn test_parse_run_flags() {
    let cli = Cli::try_parse_from(["penny", "run", "--dry-run", "--days-back", "14"]).unwrap();
    match cli.command {
        Commands::Run { dry_run, days_back } => {
            assert!(dry_run);
            assert_eq!(days_back, Some(14));
        }
        _ => panic!("expected run"),
    }
}

#[test]
fn test_parse_rejects_negative_days_back() {
    assert!(Cli::try_parse_from(["penny", "run", "--days-back", "-1"]).is_err());
}

#[test]
fn test_parse_rejects_oversized_days_back() {
    assert!(Cli::try_parse_from(["penny", "run", "--days-back", "3650"]).is_ok());
    assert!(Cli::try_parse_from(["penny", "run", "--days-back", "9999999999999"]).is_err());
}

#[test]
fn test_parse_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["penny", "serve", "--port", "9000", "--state", "/tmp/s.json", "-v"])
        .unwrap();
    assert!(cli.verbose);
    assert_eq!(cli.state.as_deref(), Some(std::path::Path::new("/tmp/s.json")));
    match cli.command {
        Commands::Serve { port, host } => {
            assert_eq!(port, Some(9000));
            assert!(host.is_none());
        }
        _ => panic!("expected serve"),
    }
}

// ========== Credential Tests ==========

#[test]
fn test_require_credentials_lists_missing() {
    let config = empty_config();
    let err = commands::require_credentials(
        &config,
        &[Credential::YnabToken, Credential::SlackToken],
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Missing credentials: YNAB_API_TOKEN, SLACK_BOT_TOKEN"
    );
}

#[test]
fn test_require_credentials_ok() {
    let config = Config::from_lookup(|key| match key {
        "YNAB_API_TOKEN" => Some("t".to_string()),
        _ => None,
    })
    .unwrap();
    assert!(commands::require_credentials(&config, &[Credential::YnabToken]).is_ok());
}

#[tokio::test]
async fn test_cmd_run_missing_credentials_fails_early() {
    let dir = TempDir::new().unwrap();
    let mut config = empty_config();
    config.state_file = dir.path().join("state.json");

    assert!(commands::cmd_run(config, false).await.is_err());
    assert!(!dir.path().join("state.json").exists());
}

// ========== Run Command Tests ==========

#[tokio::test]
async fn test_cmd_run_posts_and_saves() {
    let server = MockApiServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = server.config(&dir.path().join("state.json"));
    server.set_transactions(vec![txn("t1", "Whole Foods")]);
    server.set_completion(r#"[{"transaction_number": 1, "category": "Groceries", "confidence": "high"}]"#);

    commands::cmd_run(config.clone(), false).await.unwrap();

    assert_eq!(server.messages().len(), 1);
    let state = StateStore::new(config.state_file).load().unwrap();
    assert_eq!(state.pending.len(), 1);
}

#[tokio::test]
async fn test_cmd_run_dry_run() {
    let server = MockApiServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = server.config(&dir.path().join("state.json"));
    server.set_transactions(vec![txn("t1", "Whole Foods")]);
    server.set_completion(r#"[{"transaction_number": 1, "category": "Groceries"}]"#);

    commands::cmd_run(config.clone(), true).await.unwrap();

    assert!(server.messages().is_empty());
    assert!(!config.state_file.exists());
}

// ========== Check Command Tests ==========

#[tokio::test]
async fn test_cmd_check_passes() {
    let server = MockApiServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = server.config(&dir.path().join("state.json"));

    assert!(commands::cmd_check(&config).await.is_ok());
}

#[tokio::test]
async fn test_cmd_check_fails_on_rejected_token() {
    let server = MockApiServer::start().await;
    server.reject_ynab_token();
    let dir = TempDir::new().unwrap();
    let config = server.config(&dir.path().join("state.json"));

    let err = commands::cmd_check(&config).await.unwrap_err();
    assert_eq!(err.to_string(), "2 of 4 checks failed");
}

// ========== Status Command Tests ==========

#[test]
fn test_cmd_status_without_state_file() {
    let dir = TempDir::new().unwrap();
    let mut config = empty_config();
    config.state_file = dir.path().join("missing.json");

    assert!(commands::cmd_status(&config).is_ok());
}

#[tokio::test]
async fn test_cmd_status_with_state() {
    let dir = TempDir::new().unwrap();
    let mut config = empty_config();
    config.state_file = dir.path().join("state.json");

    let store = StateStore::new(config.state_file.clone());
    {
        let mut state = store.lock().await.unwrap();
        state.mark_processed("t0");
        state.learn_pattern("Shell", "Gas");
        state.pending.insert(
            "1700000001.000100".to_string(),
            PendingBatch::new(
                vec![CategorizedTransaction {
                    transaction: txn("t1", "Whole Foods"),
                    suggested_category: "Groceries".to_string(),
                    confidence: Confidence::High,
                }],
                vec![],
            ),
        );
        state.save().unwrap();
    }

    assert!(commands::cmd_status(&config).is_ok());
}

#[test]
fn test_cmd_status_corrupt_state_fails() {
    let dir = TempDir::new().unwrap();
    let mut config = empty_config();
    config.state_file = dir.path().join("state.json");
    std::fs::write(&config.state_file, "{not json").unwrap();

    assert!(commands::cmd_status(&config).is_err());
}
