//! OpenAI-compatible backend implementation
//!
//! Talks to OpenRouter by default, but works with any server that implements
//! the OpenAI chat completions API.
//!
//! # Configuration
//!
//! Environment variables:
//! - `OPENROUTER_API_KEY`: API key (required)
//! - `OPENROUTER_MODEL`: Model name (default: deepseek/deepseek-chat)
//! - `OPENROUTER_API_URL`: Base URL (default: https://openrouter.ai/api)

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::categories::CategorySet;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::Transaction;
use crate::prompts::{render_categorization, PromptId, PromptLibrary};

use super::parsing::parse_suggestions;
use super::types::{CategorySuggestion, KeyInfo};
use super::AIBackend;

/// Sent as `HTTP-Referer` for OpenRouter app attribution
const APP_REFERER: &str = "https://github.com/penny-budget/penny";
/// Sent as `X-Title` for OpenRouter app attribution
const APP_TITLE: &str = "Penny YNAB Categorizer";

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 2000;

/// OpenAI-compatible backend
///
/// Posts a single user message to `{base}/v1/chat/completions` with bearer
/// auth.
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl Clone for OpenAICompatibleBackend {
    fn clone(&self) -> Self {
        Self {
            http_client: self.http_client.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            prompts: self.prompts.clone(),
        }
    }
}

impl OpenAICompatibleBackend {
    /// Create a new OpenAI-compatible backend
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        let mut backend = Self::new(base_url, model);
        backend.api_key = Some(api_key.to_string());
        backend
    }

    /// Replace the prompt library (e.g. to point at a custom override dir)
    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Arc::new(RwLock::new(prompts));
        self
    }

    /// Create from configuration; `None` when no API key is set
    pub fn from_config(config: &Config) -> Option<Self> {
        let api_key = config.openrouter_key.as_deref()?;
        let prompts = match config.prompts_dir {
            Some(ref dir) => PromptLibrary::with_override_dir(dir.clone()),
            None => PromptLibrary::new(),
        };
        Some(
            Self::with_api_key(&config.openrouter_api_url, &config.model, api_key)
                .with_prompts(prompts),
        )
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key {
            Some(ref api_key) => builder.header("Authorization", format!("Bearer {}", api_key)),
            None => builder,
        }
    }

    fn render_prompt(
        &self,
        transactions: &[Transaction],
        categories: &CategorySet,
        patterns: &BTreeMap<String, String>,
    ) -> Result<String> {
        let mut prompts = self
            .prompts
            .write()
            .map_err(|_| Error::Prompt("Prompt library lock poisoned".into()))?;
        let template = prompts.get(PromptId::CategorizeTransactions)?;
        Ok(render_categorization(
            template,
            transactions,
            categories,
            patterns,
        ))
    }

    /// Make a chat completion request
    async fn chat_completion(&self, prompt: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: Some(TEMPERATURE),
            max_tokens: Some(MAX_TOKENS),
            stream: false,
        };

        let response = self
            .authorized(
                self.http_client
                    .post(format!("{}/v1/chat/completions", self.base_url)),
            )
            .header("HTTP-Referer", APP_REFERER)
            .header("X-Title", APP_TITLE)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                service: "OpenRouter",
                status,
                body,
            });
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::InvalidData("No response from OpenRouter API".into()))
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// `GET /v1/auth/key` envelope
#[derive(Debug, Deserialize)]
struct KeyResponse {
    data: KeyInfo,
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn suggest_categories(
        &self,
        transactions: &[Transaction],
        categories: &CategorySet,
        patterns: &BTreeMap<String, String>,
    ) -> Result<Vec<CategorySuggestion>> {
        if transactions.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = self.render_prompt(transactions, categories, patterns)?;
        let response = self.chat_completion(&prompt).await?;
        debug!("OpenRouter categorization response: {}", response);

        parse_suggestions(&response, transactions.len())
    }

    async fn key_info(&self) -> Result<KeyInfo> {
        let response = self
            .authorized(
                self.http_client
                    .get(format!("{}/v1/auth/key", self.base_url)),
            )
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                service: "OpenRouter",
                status,
                body,
            });
        }

        let key: KeyResponse = response.json().await?;
        Ok(key.data)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
