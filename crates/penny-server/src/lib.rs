//! Penny Webhook Server
//!
//! Axum server receiving Slack callbacks for the daily summary:
//! - `/slack/events`: thread replies (`approve all`, `2: Groceries`, ...)
//! - `/slack/interactions`: button presses and dropdown selections
//! - `/health`: liveness probe
//!
//! Every command is applied through [`ApprovalService`] and the reply is posted
//! back into the summary thread.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use penny_core::{ApprovalService, Config, Credential, SlackClient, StateStore, YnabClient};

mod handlers;

/// Credentials the server cannot start without
pub const REQUIRED_CREDENTIALS: &[Credential] = &[Credential::YnabToken, Credential::SlackToken];

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub slack: SlackClient,
    pub approvals: ApprovalService,
}

impl AppState {
    pub fn from_config(config: Config) -> penny_core::Result<Self> {
        config.require(REQUIRED_CREDENTIALS)?;

        let store = StateStore::new(config.state_file.clone());
        Ok(Self {
            slack: SlackClient::from_config(&config)?,
            approvals: ApprovalService::new(store, YnabClient::from_config(&config)?),
            config,
        })
    }

    /// Post `text` into the thread of `thread_ts`; failures are only logged
    pub(crate) async fn post_reply(&self, channel: Option<&str>, thread_ts: &str, text: &str) {
        let channel = channel.unwrap_or(&self.config.slack_channel);
        if let Err(e) = self
            .slack
            .post_message(channel, text, None, Some(thread_ts))
            .await
        {
            warn!(channel, thread_ts, error = %e, "Failed to post reply");
        }
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/slack/events", post(handlers::slack_events))
        .route("/slack/interactions", post(handlers::slack_interactions))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the server
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::from_config(config)?);

    info!(
        state_file = %state.approvals.store().path().display(),
        "Approval handler ready"
    );

    let app = create_router(state);
    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            internal: Some(err.into()),
        }
    }
}
