//! Connectivity checks
//!
//! Each check runs independently so one bad credential does not hide the state
//! of the others.

use tracing::debug;

use crate::ai::{AIBackend, AIClient};
use crate::config::{Config, Credential};
use crate::error::Result;
use crate::slack::SlackClient;
use crate::ynab::YnabClient;

/// Result of one connectivity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl CheckOutcome {
    fn from_result(name: &'static str, result: Result<String>) -> Self {
        match result {
            Ok(detail) => Self {
                name,
                ok: true,
                detail,
            },
            Err(e) => {
                debug!(check = name, error = %e, "Check failed");
                Self {
                    name,
                    ok: false,
                    detail: e.to_string(),
                }
            }
        }
    }

    fn missing(name: &'static str, credential: Credential) -> Self {
        Self {
            name,
            ok: false,
            detail: format!("{} not set", credential.env_var()),
        }
    }
}

/// Run the budget, chat, completion and category checks in that order
pub async fn run_checks(config: &Config) -> Vec<CheckOutcome> {
    vec![
        check_ynab(config).await,
        check_slack(config).await,
        check_openrouter(config).await,
        check_categories(config).await,
    ]
}

pub fn all_passed(outcomes: &[CheckOutcome]) -> bool {
    outcomes.iter().all(|o| o.ok)
}

async fn check_ynab(config: &Config) -> CheckOutcome {
    const NAME: &str = "YNAB";
    if !config.has(Credential::YnabToken) {
        return CheckOutcome::missing(NAME, Credential::YnabToken);
    }

    let result = async {
        let user_id = YnabClient::from_config(config)?.get_user().await?;
        Ok(format!("User ID: {user_id}"))
    }
    .await;
    CheckOutcome::from_result(NAME, result)
}

async fn check_slack(config: &Config) -> CheckOutcome {
    const NAME: &str = "Slack";
    if !config.has(Credential::SlackToken) {
        return CheckOutcome::missing(NAME, Credential::SlackToken);
    }

    let result = async {
        let info = SlackClient::from_config(config)?.auth_test().await?;
        Ok(format!("Team: {}, Bot: {}", info.team, info.user))
    }
    .await;
    CheckOutcome::from_result(NAME, result)
}

async fn check_openrouter(config: &Config) -> CheckOutcome {
    const NAME: &str = "OpenRouter";
    if !config.has(Credential::OpenRouterKey) {
        return CheckOutcome::missing(NAME, Credential::OpenRouterKey);
    }

    let result = async {
        let info = AIClient::from_config(config)?.key_info().await?;
        Ok(format!(
            "Limit: {}, Used: ${:.2}",
            info.limit_display(),
            info.usage
        ))
    }
    .await;
    CheckOutcome::from_result(NAME, result)
}

async fn check_categories(config: &Config) -> CheckOutcome {
    const NAME: &str = "YNAB categories";
    if !config.has(Credential::YnabToken) {
        return CheckOutcome::missing(NAME, Credential::YnabToken);
    }

    let result = async {
        let groups = YnabClient::from_config(config)?.get_category_groups().await?;
        let total: usize = groups.iter().map(|g| g.categories.len()).sum();
        Ok(format!("Found {total} categories in your budget"))
    }
    .await;
    CheckOutcome::from_result(NAME, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockApiServer;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_all_checks_pass() {
        let server = MockApiServer::start().await;
        let dir = TempDir::new().unwrap();
        let config = server.config(&dir.path().join("state.json"));

        let outcomes = run_checks(&config).await;
        assert!(all_passed(&outcomes));

        let names: Vec<&str> = outcomes.iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["YNAB", "Slack", "OpenRouter", "YNAB categories"]);
        assert_eq!(outcomes[0].detail, "User ID: mock-user");
        assert_eq!(outcomes[1].detail, "Team: Mock Team, Bot: penny");
        assert_eq!(outcomes[2].detail, "Limit: $10.00, Used: $1.50");
        // Hidden and internal categories are counted too
        assert_eq!(outcomes[3].detail, "Found 8 categories in your budget");
    }

    #[tokio::test]
    async fn test_failures_are_independent() {
        let server = MockApiServer::start().await;
        server.reject_ynab_token();
        server.fail_slack("invalid_auth");
        let dir = TempDir::new().unwrap();
        let config = server.config(&dir.path().join("state.json"));

        let outcomes = run_checks(&config).await;
        assert!(!all_passed(&outcomes));
        assert!(!outcomes[0].ok);
        assert!(outcomes[0].detail.contains("401"));
        assert!(!outcomes[1].ok);
        assert!(outcomes[1].detail.contains("invalid_auth"));
        assert!(outcomes[2].ok);
        assert!(!outcomes[3].ok);
    }

    #[tokio::test]
    async fn test_missing_credentials_skip_network() {
        let config = Config::from_lookup(|key| match key {
            // Unroutable: any request would fail with a connection error instead
            "YNAB_API_URL" | "SLACK_API_URL" | "OPENROUTER_API_URL" => {
                Some("http://127.0.0.1:9".to_string())
            }
            _ => None,
        })
        .unwrap();

        let outcomes = run_checks(&config).await;
        let details: Vec<&str> = outcomes.iter().map(|o| o.detail.as_str()).collect();
        assert_eq!(
            details,
            vec![
                "YNAB_API_TOKEN not set",
                "SLACK_BOT_TOKEN not set",
                "OPENROUTER_API_KEY not set",
                "YNAB_API_TOKEN not set",
            ]
        );
    }
}
