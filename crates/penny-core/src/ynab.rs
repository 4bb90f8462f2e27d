//! YNAB budgeting API client
//!
//! Thin typed wrapper over the handful of endpoints Penny needs. Every
//! non-2xx response becomes [`Error::Api`].

use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::categories::CategorySet;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Account, CategoryGroup, Transaction};

const SERVICE: &str = "YNAB";

/// Every YNAB response wraps its payload in `data`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct UserData {
    user: User,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CategoryGroupsData {
    category_groups: Vec<CategoryGroup>,
}

#[derive(Debug, Deserialize)]
struct TransactionsData {
    transactions: Vec<Transaction>,
}

#[derive(Debug, Deserialize)]
struct AccountsData {
    accounts: Vec<Account>,
}

#[derive(Clone)]
pub struct YnabClient {
    http_client: Client,
    base_url: String,
    token: String,
    budget_id: String,
}

impl YnabClient {
    pub fn new(base_url: &str, token: &str, budget_id: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            budget_id: budget_id.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            &config.ynab_api_url,
            config.ynab_token()?,
            &config.budget_id,
        ))
    }

    pub fn budget_id(&self) -> &str {
        &self.budget_id
    }

    fn budget_url(&self, path: &str) -> String {
        format!("{}/budgets/{}/{}", self.base_url, self.budget_id, path)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.bearer_auth(&self.token).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                service: SERVICE,
                status,
                body,
            });
        }

        let envelope: Envelope<T> = response.json().await?;
        Ok(envelope.data)
    }

    /// Id of the user the token belongs to
    pub async fn get_user(&self) -> Result<String> {
        let data: UserData = self
            .send(self.http_client.get(format!("{}/user", self.base_url)))
            .await?;
        Ok(data.user.id)
    }

    /// All category groups, including hidden, deleted and internal ones
    pub async fn get_category_groups(&self) -> Result<Vec<CategoryGroup>> {
        let data: CategoryGroupsData = self
            .send(self.http_client.get(self.budget_url("categories")))
            .await?;
        Ok(data.category_groups)
    }

    /// Visible categories only
    pub async fn get_categories(&self) -> Result<CategorySet> {
        let groups = self.get_category_groups().await?;
        Ok(CategorySet::from_groups(groups))
    }

    /// Transactions dated on or after `since`
    pub async fn get_transactions(&self, since: NaiveDate) -> Result<Vec<Transaction>> {
        let since_date = since.format("%Y-%m-%d").to_string();
        let data: TransactionsData = self
            .send(
                self.http_client
                    .get(self.budget_url("transactions"))
                    .query(&[("since_date", since_date.as_str())]),
            )
            .await?;
        debug!(
            count = data.transactions.len(),
            since = %since_date,
            "Fetched transactions"
        );
        Ok(data.transactions)
    }

    pub async fn get_accounts(&self) -> Result<Vec<Account>> {
        let data: AccountsData = self
            .send(self.http_client.get(self.budget_url("accounts")))
            .await?;
        Ok(data.accounts)
    }

    async fn patch_transaction(&self, transaction_id: &str, body: serde_json::Value) -> Result<()> {
        let _: serde_json::Value = self
            .send(
                self.http_client
                    .patch(self.budget_url(&format!("transactions/{}", transaction_id)))
                    .json(&body),
            )
            .await?;
        Ok(())
    }

    /// Set a transaction's category
    pub async fn update_category(&self, transaction_id: &str, category_id: &str) -> Result<()> {
        self.patch_transaction(
            transaction_id,
            json!({ "transaction": { "category_id": category_id } }),
        )
        .await
    }

    /// Mark a transaction approved
    pub async fn approve_transaction(&self, transaction_id: &str) -> Result<()> {
        self.patch_transaction(transaction_id, json!({ "transaction": { "approved": true } }))
            .await
    }
}
