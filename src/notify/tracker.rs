//! Notion-style task tracker — appends pages to a database.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::NotifyError;
use crate::notify::TaskTracker;

const NOTION_PAGES_URL: &str = "https://api.notion.com/v1/pages";
const NOTION_VERSION: &str = "2022-06-28";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct NotionTracker {
    http: reqwest::Client,
    token: SecretString,
    database_id: String,
}

impl NotionTracker {
    pub fn new(token: SecretString, database_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
            database_id: database_id.into(),
        }
    }

    fn page_body(&self, kind: &str, summary: &Value) -> Value {
        let title = summary
            .get("subject")
            .or_else(|| summary.get("batch_id"))
            .and_then(Value::as_str)
            .unwrap_or(kind);

        json!({
            "parent": { "database_id": self.database_id },
            "properties": {
                "Name": {
                    "title": [{ "text": { "content": format!("[{kind}] {title}") } }]
                },
                "Kind": {
                    "rich_text": [{ "text": { "content": kind } }]
                },
                "Details": {
                    "rich_text": [{ "text": { "content": summary.to_string() } }]
                }
            }
        })
    }

    async fn create_page(&self, kind: &str, summary: Value) -> Result<(), NotifyError> {
        let body = self.page_body(kind, &summary);
        let response = self
            .http
            .post(NOTION_PAGES_URL)
            .bearer_auth(self.token.expose_secret())
            .header("Notion-Version", NOTION_VERSION)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Timeout
                } else {
                    NotifyError::Http(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!("{status}: {text}")));
        }

        debug!(kind, "Tracker page created");
        Ok(())
    }
}

#[async_trait]
impl TaskTracker for NotionTracker {
    async fn log_email(&self, summary: Value) -> Result<(), NotifyError> {
        self.create_page("email", summary).await
    }

    async fn log_batch(&self, summary: Value) -> Result<(), NotifyError> {
        self.create_page("batch", summary).await
    }

    async fn log_escalation(&self, details: Value) -> Result<(), NotifyError> {
        self.create_page("escalation", details).await
    }
}
