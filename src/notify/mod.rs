//! Asynchronous collaborators: chat notifications and task tracking.
//!
//! Both are best-effort. They run after queue assembly, bounded by
//! their own timeouts, and their failures never affect the batch
//! result.

pub mod slack;
pub mod tracker;

pub use slack::SlackNotifier;
pub use tracker::NotionTracker;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NotifyError;

/// Notification kinds the pipeline emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyKind {
    Urgent,
    Vip,
    Escalation,
    BatchSummary,
    Clarification,
}

impl NotifyKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::Vip => "vip",
            Self::Escalation => "escalation",
            Self::BatchSummary => "batch_summary",
            Self::Clarification => "clarification",
        }
    }
}

/// Chat collaborator (e.g. Slack).
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn notify(&self, kind: NotifyKind, payload: serde_json::Value)
    -> Result<(), NotifyError>;
}

/// Task-tracking collaborator (e.g. Notion). Idempotency is not
/// required; duplicates are acceptable.
#[async_trait]
pub trait TaskTracker: Send + Sync {
    async fn log_email(&self, summary: serde_json::Value) -> Result<(), NotifyError>;
    async fn log_batch(&self, summary: serde_json::Value) -> Result<(), NotifyError>;
    async fn log_escalation(&self, details: serde_json::Value) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels() {
        assert_eq!(NotifyKind::Urgent.label(), "urgent");
        assert_eq!(NotifyKind::BatchSummary.label(), "batch_summary");
        let json = serde_json::to_string(&NotifyKind::Escalation).unwrap();
        assert_eq!(json, "\"escalation\"");
    }
}
