//! Test utilities for penny-core
//!
//! This module provides a mock API server emulating the YNAB, Slack and
//! OpenRouter endpoints Penny talks to. It records every category patch, every
//! posted message and every completion request so tests can assert on them.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Json, Path as UrlPath, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::config::Config;
use crate::models::Transaction;

/// A PATCH received on a transaction
#[derive(Debug, Clone)]
pub struct RecordedPatch {
    pub transaction_id: String,
    pub body: Value,
}

/// A `chat.postMessage` call
#[derive(Debug, Clone)]
pub struct RecordedMessage {
    pub channel: String,
    pub text: String,
    pub blocks: Option<Value>,
    pub thread_ts: Option<String>,
}

/// A chat completion request with its attribution headers
#[derive(Debug, Clone)]
pub struct RecordedCompletion {
    pub body: Value,
    pub authorization: Option<String>,
    pub referer: Option<String>,
    pub title: Option<String>,
}

#[derive(Default)]
struct MockState {
    transactions: Vec<Value>,
    completion: String,
    failing_updates: HashSet<String>,
    slack_error: Option<String>,
    ynab_unauthorized: bool,
    patches: Vec<RecordedPatch>,
    messages: Vec<RecordedMessage>,
    completions: Vec<RecordedCompletion>,
    last_since_date: Option<String>,
    next_ts: u64,
}

type Shared = Arc<Mutex<MockState>>;

/// Mock YNAB/Slack/OpenRouter server for tests
pub struct MockApiServer {
    addr: SocketAddr,
    state: Shared,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockApiServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(MockState {
            completion: "[]".to_string(),
            next_ts: 1_700_000_000,
            ..Default::default()
        }));

        let app = Router::new()
            .route("/ynab/v1/user", get(handle_user))
            .route("/ynab/v1/budgets/:budget/categories", get(handle_categories))
            .route("/ynab/v1/budgets/:budget/transactions", get(handle_transactions))
            .route(
                "/ynab/v1/budgets/:budget/transactions/:id",
                patch(handle_patch_transaction),
            )
            .route("/ynab/v1/budgets/:budget/accounts", get(handle_accounts))
            .route("/slack/chat.postMessage", post(handle_post_message))
            .route("/slack/auth.test", post(handle_auth_test))
            .route("/openrouter/v1/chat/completions", post(handle_completion))
            .route("/openrouter/v1/auth/key", get(handle_auth_key))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ynab_url(&self) -> String {
        format!("{}/ynab/v1", self.url())
    }

    pub fn slack_url(&self) -> String {
        format!("{}/slack", self.url())
    }

    pub fn openrouter_url(&self) -> String {
        format!("{}/openrouter", self.url())
    }

    /// A configuration pointing every client at this server
    pub fn config(&self, state_file: &Path) -> Config {
        let vars: HashMap<&str, String> = HashMap::from([
            ("YNAB_API_TOKEN", "ynab-test-token".to_string()),
            ("YNAB_BUDGET_ID", "budget-1".to_string()),
            ("SLACK_BOT_TOKEN", "xoxb-test".to_string()),
            ("SLACK_CHANNEL", "#budget".to_string()),
            ("OPENROUTER_API_KEY", "sk-or-test".to_string()),
            ("STATE_FILE", state_file.display().to_string()),
            ("YNAB_API_URL", self.ynab_url()),
            ("SLACK_API_URL", self.slack_url()),
            ("OPENROUTER_API_URL", self.openrouter_url()),
        ]);
        Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    /// Transactions returned by the transactions endpoint
    pub fn set_transactions(&self, transactions: Vec<Transaction>) {
        self.state.lock().unwrap().transactions = transactions
            .iter()
            .map(|t| serde_json::to_value(t).unwrap())
            .collect();
    }

    /// Message content returned by the chat completions endpoint
    pub fn set_completion(&self, content: &str) {
        self.state.lock().unwrap().completion = content.to_string();
    }

    /// Make PATCHes on this transaction fail with a 500
    pub fn fail_update(&self, transaction_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_updates
            .insert(transaction_id.to_string());
    }

    /// Make every Slack call answer `ok: false` with this error code
    pub fn fail_slack(&self, error: &str) {
        self.state.lock().unwrap().slack_error = Some(error.to_string());
    }

    /// Make every YNAB call answer 401
    pub fn reject_ynab_token(&self) {
        self.state.lock().unwrap().ynab_unauthorized = true;
    }

    pub fn patches(&self) -> Vec<RecordedPatch> {
        self.state.lock().unwrap().patches.clone()
    }

    pub fn messages(&self) -> Vec<RecordedMessage> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn completions(&self) -> Vec<RecordedCompletion> {
        self.state.lock().unwrap().completions.clone()
    }

    pub fn last_since_date(&self) -> Option<String> {
        self.state.lock().unwrap().last_since_date.clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockApiServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"id": "401", "name": "unauthorized", "detail": "Unauthorized"}})),
    )
        .into_response()
}

async fn handle_user(State(state): State<Shared>) -> Response {
    if state.lock().unwrap().ynab_unauthorized {
        return unauthorized();
    }
    Json(json!({"data": {"user": {"id": "mock-user"}}})).into_response()
}

/// Two visible groups plus the internal group and one hidden category
async fn handle_categories(State(state): State<Shared>) -> Response {
    if state.lock().unwrap().ynab_unauthorized {
        return unauthorized();
    }
    Json(json!({"data": {"category_groups": [
        {
            "id": "grp-internal",
            "name": "Internal Master Category",
            "hidden": false,
            "deleted": false,
            "categories": [
                {"id": "cat-inflow", "name": "Inflow: Ready to Assign", "hidden": false, "deleted": false}
            ]
        },
        {
            "id": "grp-everyday",
            "name": "Everyday",
            "hidden": false,
            "deleted": false,
            "categories": [
                {"id": "cat-groceries", "name": "Groceries", "hidden": false, "deleted": false},
                {"id": "cat-dining", "name": "Dining Out", "hidden": false, "deleted": false},
                {"id": "cat-gas", "name": "Gas", "hidden": false, "deleted": false},
                {"id": "cat-coffee", "name": "Coffee", "hidden": false, "deleted": false},
                {"id": "cat-hobby", "name": "Old Hobby", "hidden": true, "deleted": false}
            ]
        },
        {
            "id": "grp-bills",
            "name": "Bills",
            "hidden": false,
            "deleted": false,
            "categories": [
                {"id": "cat-rent", "name": "Rent", "hidden": false, "deleted": false},
                {"id": "cat-utilities", "name": "Utilities", "hidden": false, "deleted": false}
            ]
        }
    ]}}))
    .into_response()
}

async fn handle_transactions(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().unwrap();
    if state.ynab_unauthorized {
        return unauthorized();
    }
    state.last_since_date = params.get("since_date").cloned();
    Json(json!({"data": {"transactions": state.transactions, "server_knowledge": 1}}))
        .into_response()
}

async fn handle_patch_transaction(
    State(state): State<Shared>,
    UrlPath((_budget, id)): UrlPath<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    if state.failing_updates.contains(&id) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": {"id": "500", "name": "internal_server_error"}})),
        )
            .into_response();
    }
    state.patches.push(RecordedPatch {
        transaction_id: id.clone(),
        body,
    });
    Json(json!({"data": {"transaction": {"id": id}}})).into_response()
}

async fn handle_accounts(State(state): State<Shared>) -> Response {
    if state.lock().unwrap().ynab_unauthorized {
        return unauthorized();
    }
    Json(json!({"data": {"accounts": [
        {"id": "acc-checking", "name": "Checking", "closed": false, "deleted": false},
        {"id": "acc-savings", "name": "Savings", "closed": false, "deleted": false},
        {"id": "acc-card", "name": "Credit Card", "closed": false, "deleted": false}
    ]}}))
    .into_response()
}

async fn handle_post_message(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    if let Some(ref error) = state.slack_error {
        return Json(json!({"ok": false, "error": error}));
    }

    state.next_ts += 1;
    let ts = format!("{}.000100", state.next_ts);
    let channel = body["channel"].as_str().unwrap_or_default().to_string();
    state.messages.push(RecordedMessage {
        channel: channel.clone(),
        text: body["text"].as_str().unwrap_or_default().to_string(),
        blocks: body.get("blocks").cloned(),
        thread_ts: body["thread_ts"].as_str().map(String::from),
    });
    Json(json!({"ok": true, "channel": channel, "ts": ts}))
}

async fn handle_auth_test(State(state): State<Shared>) -> Json<Value> {
    if let Some(ref error) = state.lock().unwrap().slack_error {
        return Json(json!({"ok": false, "error": error}));
    }
    Json(json!({"ok": true, "team": "Mock Team", "user": "penny", "team_id": "T1", "user_id": "U1"}))
}

async fn handle_completion(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };

    let mut state = state.lock().unwrap();
    state.completions.push(RecordedCompletion {
        body: body.clone(),
        authorization: header("authorization"),
        referer: header("http-referer"),
        title: header("x-title"),
    });

    Json(json!({
        "id": "gen-mock",
        "model": body["model"],
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": state.completion},
            "finish_reason": "stop"
        }]
    }))
}

async fn handle_auth_key() -> Json<Value> {
    Json(json!({"data": {"label": "sk-or-v1-test", "limit": 10.0, "usage": 1.5}}))
}
