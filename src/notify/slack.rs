//! Slack chat notifier — `chat.postMessage` with block formatting.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::NotifyError;
use crate::notify::{ChatNotifier, NotifyKind};

const SLACK_API_URL: &str = "https://slack.com/api/chat.postMessage";

/// Per-request timeout; a slow Slack must not hold the pipeline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SlackNotifier {
    http: reqwest::Client,
    token: SecretString,
    channel: String,
}

impl SlackNotifier {
    pub fn new(token: SecretString, channel: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
            channel: channel.into(),
        }
    }

    fn render(&self, kind: NotifyKind, payload: &Value) -> (String, Value) {
        let header = match kind {
            NotifyKind::Urgent => "🚨 Urgent email",
            NotifyKind::Vip => "⭐ VIP email",
            NotifyKind::Escalation => "⚠️ Escalation — human review required",
            NotifyKind::BatchSummary => "📬 Inbox triage summary",
            NotifyKind::Clarification => "❓ Clarification needed",
        };

        let mut fields = Vec::new();
        for (key, label) in [
            ("subject", "Subject"),
            ("sender", "From"),
            ("score", "Priority"),
            ("category", "Category"),
            ("severity", "Severity"),
            ("reason", "Reason"),
            ("total", "Emails"),
            ("drafts_created", "Drafts"),
            ("blocked", "Blocked"),
        ] {
            if let Some(value) = payload.get(key) {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                fields.push(json!({ "type": "mrkdwn", "text": format!("*{label}:*\n{text}") }));
            }
        }

        let mut blocks = vec![json!({
            "type": "header",
            "text": { "type": "plain_text", "text": header, "emoji": true }
        })];
        if !fields.is_empty() {
            blocks.push(json!({ "type": "section", "fields": fields }));
        }

        (header.to_string(), Value::Array(blocks))
    }
}

#[async_trait]
impl ChatNotifier for SlackNotifier {
    async fn notify(&self, kind: NotifyKind, payload: Value) -> Result<(), NotifyError> {
        let (text, blocks) = self.render(kind, &payload);
        let body = json!({
            "channel": self.channel,
            "text": text,
            "blocks": blocks,
        });

        let response = self
            .http
            .post(SLACK_API_URL)
            .bearer_auth(self.token.expose_secret())
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

        let status = response.status();
        let parsed: Value = response
            .json()
            .await
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        if !status.is_success() || parsed.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = parsed
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            warn!(kind = kind.label(), error, "Slack rejected notification");
            return Err(NotifyError::Rejected(error.to_string()));
        }

        debug!(kind = kind.label(), channel = %self.channel, "Slack notification sent");
        Ok(())
    }
}
