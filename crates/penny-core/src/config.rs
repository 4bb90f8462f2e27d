//! Environment-driven configuration
//!
//! Every setting comes from an environment variable; there is no config file.
//! CLI flags may override individual values after loading.

use std::path::PathBuf;

use crate::error::{Error, Result};

pub const DEFAULT_BUDGET_ID: &str = "last-used";
pub const DEFAULT_SLACK_CHANNEL: &str = "#ynab-transactions";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat";
pub const DEFAULT_DAYS_BACK: i64 = 7;
/// Longest accepted lookback window (ten years)
pub const MAX_DAYS_BACK: i64 = 3650;
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_STATE_FILE: &str = "/tmp/ynab_agent_state.json";
pub const DEFAULT_YNAB_API_URL: &str = "https://api.ynab.com/v1";
pub const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api";
pub const DEFAULT_OPENROUTER_API_URL: &str = "https://openrouter.ai/api";

/// A secret the process cannot run without
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    YnabToken,
    SlackToken,
    OpenRouterKey,
}

impl Credential {
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::YnabToken => "YNAB_API_TOKEN",
            Self::SlackToken => "SLACK_BOT_TOKEN",
            Self::OpenRouterKey => "OPENROUTER_API_KEY",
        }
    }
}

/// Runtime configuration shared by all three entry points
#[derive(Debug, Clone)]
pub struct Config {
    pub ynab_token: Option<String>,
    pub budget_id: String,
    pub slack_token: Option<String>,
    pub slack_channel: String,
    pub openrouter_key: Option<String>,
    pub model: String,
    /// Lookback window for the transaction fetch, in days
    pub days_back: i64,
    pub host: String,
    pub port: u16,
    pub state_file: PathBuf,
    pub ynab_api_url: String,
    pub slack_api_url: String,
    pub openrouter_api_url: String,
    /// `openrouter` (default) or `mock`
    pub ai_backend: String,
    pub prompts_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup (used by tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let days_back = match get("DAYS_BACK") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|d| (0..=MAX_DAYS_BACK).contains(d))
                .ok_or_else(|| Error::InvalidConfig(format!("DAYS_BACK={raw}")))?,
            None => DEFAULT_DAYS_BACK,
        };

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::InvalidConfig(format!("PORT={raw}")))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            ynab_token: get("YNAB_API_TOKEN"),
            budget_id: get("YNAB_BUDGET_ID").unwrap_or_else(|| DEFAULT_BUDGET_ID.to_string()),
            slack_token: get("SLACK_BOT_TOKEN"),
            slack_channel: get("SLACK_CHANNEL").unwrap_or_else(|| DEFAULT_SLACK_CHANNEL.to_string()),
            openrouter_key: get("OPENROUTER_API_KEY"),
            model: get("OPENROUTER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            days_back,
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            state_file: get("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
            ynab_api_url: get("YNAB_API_URL").unwrap_or_else(|| DEFAULT_YNAB_API_URL.to_string()),
            slack_api_url: get("SLACK_API_URL")
                .unwrap_or_else(|| DEFAULT_SLACK_API_URL.to_string()),
            openrouter_api_url: get("OPENROUTER_API_URL")
                .unwrap_or_else(|| DEFAULT_OPENROUTER_API_URL.to_string()),
            ai_backend: get("PENNY_AI_BACKEND")
                .map(|b| b.to_lowercase())
                .unwrap_or_else(|| "openrouter".to_string()),
            prompts_dir: get("PENNY_PROMPTS_DIR").map(PathBuf::from),
        })
    }

    /// Whether a credential has a value
    pub fn has(&self, credential: Credential) -> bool {
        match credential {
            Credential::YnabToken => self.ynab_token.is_some(),
            Credential::SlackToken => self.slack_token.is_some(),
            // The mock backend never talks to OpenRouter
            Credential::OpenRouterKey => {
                self.openrouter_key.is_some() || self.ai_backend == "mock"
            }
        }
    }

    /// Fail with every missing credential listed, before any network call
    pub fn require(&self, credentials: &[Credential]) -> Result<()> {
        let missing: Vec<String> = credentials
            .iter()
            .filter(|c| !self.has(**c))
            .map(|c| c.env_var().to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingCredentials(missing))
        }
    }

    pub(crate) fn ynab_token(&self) -> Result<&str> {
        self.ynab_token
            .as_deref()
            .ok_or_else(|| Error::MissingCredentials(vec!["YNAB_API_TOKEN".into()]))
    }

    pub(crate) fn slack_token(&self) -> Result<&str> {
        self.slack_token
            .as_deref()
            .ok_or_else(|| Error::MissingCredentials(vec!["SLACK_BOT_TOKEN".into()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.budget_id, "last-used");
        assert_eq!(config.slack_channel, "#ynab-transactions");
        assert_eq!(config.model, "deepseek/deepseek-chat");
        assert_eq!(config.days_back, 7);
        assert_eq!(config.port, 8080);
        assert_eq!(config.state_file, PathBuf::from("/tmp/ynab_agent_state.json"));
        assert_eq!(config.ai_backend, "openrouter");
        assert!(config.ynab_token.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("YNAB_API_TOKEN", "ynab"),
            ("YNAB_BUDGET_ID", "budget-1"),
            ("DAYS_BACK", "14"),
            ("PORT", "3000"),
            ("STATE_FILE", "/var/lib/penny/state.json"),
        ])
        .unwrap();
        assert_eq!(config.ynab_token.as_deref(), Some("ynab"));
        assert_eq!(config.budget_id, "budget-1");
        assert_eq!(config.days_back, 14);
        assert_eq!(config.port, 3000);
        assert_eq!(config.state_file, PathBuf::from("/var/lib/penny/state.json"));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = config_from(&[("SLACK_BOT_TOKEN", "  ")]).unwrap();
        assert!(config.slack_token.is_none());
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        assert!(matches!(
            config_from(&[("DAYS_BACK", "soon")]),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            config_from(&[("DAYS_BACK", "-1")]),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            config_from(&[("DAYS_BACK", "9999999999999")]),
            Err(Error::InvalidConfig(_))
        ));
        assert_eq!(
            config_from(&[("DAYS_BACK", "3650")]).unwrap().days_back,
            MAX_DAYS_BACK
        );
        assert!(matches!(
            config_from(&[("PORT", "99999")]),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_require_lists_every_missing_credential() {
        let config = config_from(&[("SLACK_BOT_TOKEN", "xoxb")]).unwrap();
        let err = config
            .require(&[
                Credential::YnabToken,
                Credential::SlackToken,
                Credential::OpenRouterKey,
            ])
            .unwrap_err();
        match err {
            Error::MissingCredentials(missing) => {
                assert_eq!(missing, vec!["YNAB_API_TOKEN", "OPENROUTER_API_KEY"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mock_backend_needs_no_openrouter_key() {
        let config = config_from(&[("PENNY_AI_BACKEND", "Mock")]).unwrap();
        assert!(config.require(&[Credential::OpenRouterKey]).is_ok());
    }
}
