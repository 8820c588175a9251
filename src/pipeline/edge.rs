//! Batch-level edge cases: cross-email conflicts, DND, permission
//! mode, and legal/finance escalation.

use chrono::{DateTime, Timelike, Utc};
use serde_json::json;
use tracing::{debug, info};

use crate::config::TriageConfig;
use crate::guardrails::DomainChecker;
use crate::model::{
    EmailStatus, FlagType, Intent, PriorityLevel, ProcessedEmail, SecurityFlag, Severity,
};

/// Note appended to conflict-resolution losers.
const SUPERSEDED_NOTE: &str = "Superseded by a newer email from the same sender";

/// How the batch may touch the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    Full,
    DraftOnly,
}

impl BatchMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::DraftOnly => "draft_only",
        }
    }
}

/// A legal/finance escalation surfaced to the chat/tracker
/// collaborators.
#[derive(Debug, Clone)]
pub struct EscalationEvent {
    pub message_id: String,
    pub subject: String,
    pub category: &'static str,
    pub severity: Severity,
}

pub struct EdgeResolver<'a> {
    config: &'a TriageConfig,
}

impl<'a> EdgeResolver<'a> {
    pub fn new(config: &'a TriageConfig) -> Self {
        Self { config }
    }

    /// For each sender with multiple emails in the batch, keep the most
    /// recent (by date); older ones are excluded from reply drafting
    /// but stay in the queue with status unchanged.
    pub fn resolve_conflicts(&self, emails: &mut [ProcessedEmail]) {
        for i in 0..emails.len() {
            let sender = emails[i].metadata.sender.to_lowercase();
            let date = emails[i].metadata.date;
            let newer_exists = emails.iter().enumerate().any(|(j, other)| {
                j != i
                    && other.metadata.sender.to_lowercase() == sender
                    && is_newer(other.metadata.date, date, j, i)
            });
            if newer_exists {
                debug!(
                    message_id = %emails[i].metadata.message_id,
                    sender = %sender,
                    "Email superseded within batch"
                );
                emails[i].note(SUPERSEDED_NOTE);
                emails[i].requires_reply = false;
            }
        }
    }

    /// Legal/finance intent at HIGH priority needs a human: flag it
    /// and emit an escalation event. The email keeps its
    /// `requires_reply` verdict but the drafter must skip it — the
    /// reply is a human's to write.
    pub fn resolve_escalations(&self, emails: &mut [ProcessedEmail]) -> Vec<EscalationEvent> {
        let mut events = Vec::new();
        for email in emails.iter_mut() {
            if email.priority_level() != PriorityLevel::High {
                continue;
            }
            let Some(intent) = email.intent.as_ref() else {
                continue;
            };
            let category = if intent.has(Intent::Legal) {
                "legal"
            } else if intent.has(Intent::Finance) {
                "finance"
            } else {
                continue;
            };

            info!(
                message_id = %email.metadata.message_id,
                category,
                "Escalating for human review"
            );
            email.add_flag(
                SecurityFlag::new(
                    FlagType::EscalationRequired,
                    Severity::High,
                    format!("{category} content at high priority requires human review"),
                )
                .with_details(json!({ "category": category })),
            );
            email.note(format!("Escalated: {category} content at high priority"));
            events.push(EscalationEvent {
                message_id: email.metadata.message_id.clone(),
                subject: email.metadata.subject.clone(),
                category,
                severity: Severity::High,
            });
        }
        events
    }

    /// DND gate: inside the window, external-recipient drafts are never
    /// auto-approved; a follow-up is scheduled instead.
    pub fn apply_dnd(&self, email: &mut ProcessedEmail, now: DateTime<Utc>) {
        let Some(window) = self.config.dnd else { return };
        if !window.contains_hour(now.hour()) {
            return;
        }
        let Some(draft) = email.draft_reply.as_mut() else {
            return;
        };

        let domains = DomainChecker::new(self.config);
        let external = draft
            .recipients
            .iter()
            .chain(draft.cc.iter())
            .any(|r| !domains.is_internal(r));
        if external {
            draft.requires_approval = true;
            email.note("DND window active for external recipients; follow-up scheduled");
        }
    }

    /// Mailbox scopes decide the batch mode: without `send`, every
    /// draft is forced to approval and the batch is labeled draft_only.
    pub fn permission_mode(&self, can_send: bool, emails: &mut [ProcessedEmail]) -> BatchMode {
        if can_send {
            return BatchMode::Full;
        }
        for email in emails.iter_mut() {
            if let Some(draft) = email.draft_reply.as_mut() {
                draft.requires_approval = true;
            }
        }
        BatchMode::DraftOnly
    }

    /// Final status for an email after drafting and guardrails.
    pub fn resolve_status(&self, email: &mut ProcessedEmail) {
        if email.is_spam || (email.is_blocked && email.draft_reply.is_none()) {
            email.status = EmailStatus::Blocked;
        } else if email.has_blocking_flag()
            || email.clarification_request.is_some()
            || email
                .security_flags
                .iter()
                .any(|f| f.flag_type == FlagType::EscalationRequired)
        {
            email.status = EmailStatus::ApprovalRequired;
        } else {
            email.status = EmailStatus::DraftReady;
        }
    }
}

/// Newer-than comparison with deterministic tie-breaks: a missing date
/// always loses; equal dates fall back to ingestion position.
fn is_newer(
    a: Option<DateTime<Utc>>,
    b: Option<DateTime<Utc>>,
    a_pos: usize,
    b_pos: usize,
) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a > b || (a == b && a_pos > b_pos),
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (None, None) => a_pos > b_pos,
    }
}
