//! Output queue assembly and metrics.
//!
//! The queue order is deterministic given the batch and config:
//! (priority_level DESC, score DESC, date DESC, message_id ASC).

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    ClarificationRequest, EmailStatus, PriorityLevel, ProcessedEmail, ProcessingBatch, UserScope,
};

/// Counts by priority level.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub not_required: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_processed: usize,
    pub by_level: LevelCounts,
    pub drafts_created: usize,
    pub blocked: usize,
    pub approval_required: usize,
    pub spam: usize,
    pub vip: usize,
}

/// Compact view of a top-ranked email, reasoning included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopEmail {
    pub message_id: String,
    pub sender: String,
    pub subject: String,
    pub priority_level: PriorityLevel,
    pub score: u8,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchInfo {
    pub batch_id: Uuid,
    pub user_command: String,
    pub user_scope: UserScope,
    /// "full" or "draft_only" (send scope missing).
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub total_emails: usize,
    pub high_priority: usize,
    pub medium_priority: usize,
    pub low_priority: usize,
    pub drafts_created: usize,
    pub blocked_items: usize,
    pub vip_emails: usize,
    pub approval_required: usize,
    pub follow_ups_scheduled: usize,
    pub categories: BTreeMap<String, usize>,
    /// Rough triage-minutes saved, for the summary panel.
    pub time_saved_minutes: usize,
}

/// The full `run` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageReport {
    pub batch_id: Uuid,
    pub summary: BatchSummary,
    pub items: Vec<ProcessedEmail>,
    pub top_10_emails: Vec<TopEmail>,
    pub clarifications: Vec<ClarificationRequest>,
    pub batch_info: BatchInfo,
    pub metrics: MetricsReport,
}

/// Sort the queue in place by the canonical ordering.
pub fn sort_queue(emails: &mut [ProcessedEmail]) {
    emails.sort_by(|a, b| {
        b.priority_level()
            .rank()
            .cmp(&a.priority_level().rank())
            .then(b.score().cmp(&a.score()))
            .then(compare_dates_desc(a.metadata.date, b.metadata.date))
            .then(a.metadata.message_id.cmp(&b.metadata.message_id))
    });
}

/// Newer dates first; missing dates last.
fn compare_dates_desc(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Assemble the report from a completed batch. The batch's email list
/// must already be queue-sorted.
pub fn build_report(batch: ProcessingBatch, mode: &str) -> TriageReport {
    let mut by_level = LevelCounts::default();
    let mut categories: BTreeMap<String, usize> = BTreeMap::new();
    let mut drafts_created = 0;
    let mut blocked = 0;
    let mut approval_required = 0;
    let mut spam = 0;
    let mut vip = 0;
    let mut follow_ups_scheduled = 0;
    let mut time_saved_minutes = 0;

    for email in &batch.emails {
        match email.priority_level() {
            PriorityLevel::High => by_level.high += 1,
            PriorityLevel::Medium => by_level.medium += 1,
            PriorityLevel::Low => by_level.low += 1,
            PriorityLevel::NotRequired => by_level.not_required += 1,
        }
        *categories.entry(email.category.label().to_string()).or_default() += 1;

        // Triage plus categorization per email, drafting when present.
        time_saved_minutes += 3;
        if email.draft_reply.is_some() {
            drafts_created += 1;
            time_saved_minutes += 5;
        }
        if email.is_blocked {
            blocked += 1;
        }
        if email.status == EmailStatus::ApprovalRequired {
            approval_required += 1;
        }
        if email.is_spam {
            spam += 1;
        }
        if email.classification.as_ref().is_some_and(|c| c.is_vip) {
            vip += 1;
        }
        if email
            .processing_notes
            .iter()
            .any(|n| n.contains("follow-up scheduled"))
        {
            follow_ups_scheduled += 1;
        }
    }

    let summary = BatchSummary {
        total_processed: batch.total_processed,
        by_level: by_level.clone(),
        drafts_created,
        blocked,
        approval_required,
        spam,
        vip,
    };

    let metrics = MetricsReport {
        total_emails: batch.emails.len(),
        high_priority: by_level.high,
        medium_priority: by_level.medium,
        low_priority: by_level.low,
        drafts_created,
        blocked_items: blocked,
        vip_emails: vip,
        approval_required,
        follow_ups_scheduled,
        categories,
        time_saved_minutes,
    };

    let top_10_emails = batch
        .emails
        .iter()
        .take(10)
        .map(|email| TopEmail {
            message_id: email.metadata.message_id.clone(),
            sender: email.metadata.sender.clone(),
            subject: email.metadata.subject.clone(),
            priority_level: email.priority_level(),
            score: email.score(),
            reasoning: email
                .priority
                .as_ref()
                .map(|p| p.reasoning.clone())
                .unwrap_or_default(),
        })
        .collect();

    let clarifications = batch
        .emails
        .iter()
        .filter_map(|e| e.clarification_request.clone())
        .collect();

    TriageReport {
        batch_id: batch.batch_id,
        summary,
        top_10_emails,
        clarifications,
        batch_info: BatchInfo {
            batch_id: batch.batch_id,
            user_command: batch.user_command.clone(),
            user_scope: batch.user_scope.clone(),
            mode: mode.to_string(),
            started_at: batch.started_at,
            completed_at: batch.completed_at,
            errors: batch.errors.clone(),
        },
        metrics,
        items: batch.emails,
    }
}
