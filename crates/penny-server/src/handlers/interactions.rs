//! Slack interactivity handler (Block Kit buttons and selects)

use std::sync::Arc;

use axum::{extract::State, Form, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{AppError, AppState};
use penny_core::ApprovalAction;

/// Slack posts interactions form-encoded with a single JSON field
#[derive(Debug, Deserialize)]
pub struct InteractionForm {
    pub payload: String,
}

#[derive(Debug, Deserialize)]
pub struct InteractionPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub container: Option<Container>,
    #[serde(default)]
    pub message: Option<MessageRef>,
    #[serde(default)]
    pub channel: Option<ChannelRef>,
    #[serde(default)]
    pub actions: Vec<BlockAction>,
}

#[derive(Debug, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub message_ts: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRef {
    #[serde(default)]
    pub ts: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct BlockAction {
    pub action_id: String,
    #[serde(default)]
    pub block_id: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub selected_option: Option<SelectedOption>,
}

#[derive(Debug, Deserialize)]
pub struct SelectedOption {
    pub value: String,
}

impl InteractionPayload {
    fn message_ts(&self) -> Option<&str> {
        self.container
            .as_ref()
            .and_then(|c| c.message_ts.as_deref())
            .or_else(|| self.message.as_ref().and_then(|m| m.ts.as_deref()))
    }

    fn channel_id(&self) -> Option<&str> {
        self.channel
            .as_ref()
            .map(|c| c.id.as_str())
            .or_else(|| self.container.as_ref().and_then(|c| c.channel_id.as_deref()))
    }
}

impl BlockAction {
    fn to_action(&self) -> Option<ApprovalAction> {
        ApprovalAction::from_interaction(
            &self.action_id,
            self.value.as_deref(),
            self.selected_option.as_ref().map(|o| o.value.as_str()),
            self.block_id.as_deref(),
        )
    }
}

/// POST /slack/interactions - apply each action and reply in the thread
pub async fn slack_interactions(
    State(state): State<Arc<AppState>>,
    Form(form): Form<InteractionForm>,
) -> Result<Json<Value>, AppError> {
    let payload: InteractionPayload = serde_json::from_str(&form.payload)
        .map_err(|_| AppError::bad_request("Invalid interaction payload"))?;

    if payload.kind != "block_actions" {
        debug!(kind = %payload.kind, "Ignoring interaction");
        return Ok(Json(json!({"ok": true})));
    }

    let Some(message_ts) = payload.message_ts() else {
        return Err(AppError::bad_request("Interaction has no message timestamp"));
    };

    for block_action in &payload.actions {
        let Some(action) = block_action.to_action() else {
            warn!(action_id = %block_action.action_id, "Unknown interaction action");
            continue;
        };

        let reply = state.approvals.handle_action(message_ts, action).await?;
        state
            .post_reply(payload.channel_id(), message_ts, &reply)
            .await;
    }

    Ok(Json(json!({"ok": true})))
}
