//! Slack Web API client
//!
//! Slack answers 200 for most failures and reports them as `ok: false`; those
//! become [`Error::Chat`].

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocks: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
    unfurl_links: bool,
    unfurl_media: bool,
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    team: Option<String>,
    #[serde(default)]
    user: Option<String>,
}

/// Identity of the bot token, from `auth.test`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthInfo {
    pub team: String,
    pub user: String,
}

#[derive(Clone)]
pub struct SlackClient {
    http_client: Client,
    base_url: String,
    token: String,
}

impl SlackClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(&config.slack_api_url, config.slack_token()?))
    }

    async fn call<B: Serialize>(&self, method: &str, body: &B) -> Result<SlackResponse> {
        let response = self
            .http_client
            .post(format!("{}/{}", self.base_url, method))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                service: "Slack",
                status,
                body,
            });
        }

        let result: SlackResponse = response.json().await?;
        if !result.ok {
            return Err(Error::Chat(
                result.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }
        Ok(result)
    }

    /// Post a message (optionally with blocks, optionally into a thread)
    ///
    /// Returns the new message's timestamp.
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        blocks: Option<&Value>,
        thread_ts: Option<&str>,
    ) -> Result<String> {
        let body = PostMessage {
            channel,
            text,
            blocks,
            thread_ts,
            unfurl_links: false,
            unfurl_media: false,
        };
        let result = self.call("chat.postMessage", &body).await?;
        let ts = result
            .ts
            .ok_or_else(|| Error::Chat("chat.postMessage returned no ts".into()))?;
        debug!(channel, ts = %ts, "Posted Slack message");
        Ok(ts)
    }

    pub async fn auth_test(&self) -> Result<AuthInfo> {
        let result = self.call("auth.test", &serde_json::json!({})).await?;
        Ok(AuthInfo {
            team: result.team.unwrap_or_default(),
            user: result.user.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockApiServer;

    #[tokio::test]
    async fn test_post_message_returns_ts() {
        let server = MockApiServer::start().await;
        let client = SlackClient::new(&server.slack_url(), "xoxb-test");

        let ts = client
            .post_message("#budget", "hello", None, Some("111.222"))
            .await
            .unwrap();
        assert!(!ts.is_empty());

        let messages = server.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].channel, "#budget");
        assert_eq!(messages[0].text, "hello");
        assert_eq!(messages[0].thread_ts.as_deref(), Some("111.222"));
    }

    #[tokio::test]
    async fn test_not_ok_is_chat_error() {
        let server = MockApiServer::start().await;
        server.fail_slack("channel_not_found");
        let client = SlackClient::new(&server.slack_url(), "xoxb-test");

        let err = client.post_message("#nope", "hi", None, None).await.unwrap_err();
        match err {
            Error::Chat(code) => assert_eq!(code, "channel_not_found"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_auth_test() {
        let server = MockApiServer::start().await;
        let client = SlackClient::new(&server.slack_url(), "xoxb-test");
        let info = client.auth_test().await.unwrap();
        assert_eq!(info.team, "Mock Team");
        assert_eq!(info.user, "penny");
    }
}
