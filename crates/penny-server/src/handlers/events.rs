//! Slack Events API handler

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{AppError, AppState};

/// Outer Events API envelope
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        #[serde(default)]
        event: MessageEvent,
    },
    #[serde(other)]
    Other,
}

/// The inner event; only message events are acted on
#[derive(Debug, Default, Deserialize)]
pub struct MessageEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

impl MessageEvent {
    /// Summary timestamp the reply belongs to
    fn thread_key(&self) -> Option<&str> {
        self.thread_ts.as_deref().or(self.ts.as_deref())
    }
}

/// Set by Slack on redelivery of an event it considers unacknowledged
pub const RETRY_NUM_HEADER: &str = "x-slack-retry-num";

/// POST /slack/events - URL verification and thread replies
pub async fn slack_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(envelope): Json<EventEnvelope>,
) -> Result<Json<Value>, AppError> {
    let event = match envelope {
        EventEnvelope::UrlVerification { challenge } => {
            return Ok(Json(json!({ "challenge": challenge })));
        }
        EventEnvelope::EventCallback { event } if event.kind == "message" => event,
        _ => return Ok(Json(json!({"ok": true}))),
    };

    // The first delivery already ran the command; a rerun would patch twice
    if let Some(retry) = headers.get(RETRY_NUM_HEADER) {
        info!(retry = ?retry, "Acknowledging redelivered event");
        return Ok(Json(json!({"ok": true})));
    }

    // Our own replies come back as events
    if event.bot_id.is_some() {
        debug!("Ignoring bot message");
        return Ok(Json(json!({"ok": true})));
    }

    let (Some(text), Some(thread_ts)) = (event.text.as_deref(), event.thread_key()) else {
        return Ok(Json(json!({"ok": true})));
    };
    if text.trim().is_empty() {
        return Ok(Json(json!({"ok": true})));
    }

    let reply = state.approvals.handle_message(thread_ts, text).await?;
    state
        .post_reply(event.channel.as_deref(), thread_ts, &reply)
        .await;

    Ok(Json(json!({"ok": true})))
}
