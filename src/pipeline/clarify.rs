//! Clarification requests — when the agent needs a human before it can
//! finish a reply.

use serde_json::json;
use tracing::debug;

use crate::model::{ClarificationReason, ClarificationRequest, ProcessedEmail};

/// Generic addresses a reply probably shouldn't target blindly.
const AMBIGUOUS_LOCAL_PARTS: &[&str] = &[
    "info@", "contact@", "support@", "help@", "sales@", "admin@", "team@", "noreply@",
];

/// A draft shorter than this cannot plausibly answer a question.
const MIN_ANSWER_LENGTH: usize = 50;

/// Verbs a draft needs to count as addressing a requested action.
const ACTION_RESPONSE_VERBS: &[&str] = &["will", "can", "schedule", "send", "provide", "confirm"];

/// Too many detected topics to answer coherently.
const MAX_CLEAR_INTENTS: usize = 3;

pub struct ClarificationDetector;

impl ClarificationDetector {
    /// Inspect a drafted email; returns the clarification to attach,
    /// if any.
    pub fn check(email: &ProcessedEmail) -> Option<ClarificationRequest> {
        let draft = email.draft_reply.as_ref()?;

        let mut reasons = Vec::new();
        let mut questions = Vec::new();

        // Ambiguous recipients.
        let generic = draft
            .recipients
            .iter()
            .find(|r| is_ambiguous_address(r));
        if draft.recipients.is_empty() {
            reasons.push(ClarificationReason::AmbiguousRecipients);
            questions.push(format!(
                "Who should receive the reply for '{}'? Original sender: {}",
                email.metadata.subject, email.metadata.sender
            ));
        } else if let Some(address) = generic {
            reasons.push(ClarificationReason::AmbiguousRecipients);
            questions.push(format!(
                "The recipient '{address}' appears to be a generic address. \
                 Should we send to it or to a specific person?"
            ));
        }

        // Unclear intent.
        if let Some(intent) = email.intent.as_ref() {
            if intent.intents.is_empty() && intent.action_required {
                reasons.push(ClarificationReason::UnclearIntent);
                questions.push(
                    "This email asks for an action but the topic is unclear. \
                     What should be done?"
                        .into(),
                );
            } else if intent.intents.len() > MAX_CLEAR_INTENTS {
                reasons.push(ClarificationReason::UnclearIntent);
                questions.push(format!(
                    "This email covers several topics at once ({} detected). \
                     Which should the reply prioritize?",
                    intent.intents.len()
                ));
            }
        }

        // Missing critical information in the draft itself.
        if let Some(intent) = email.intent.as_ref() {
            let body = draft.body.to_lowercase();
            if intent.action_required
                && !ACTION_RESPONSE_VERBS.iter().any(|v| body.contains(v))
            {
                reasons.push(ClarificationReason::MissingInformation);
                questions.push(
                    "An action was requested but the draft does not address it. \
                     What should we commit to?"
                        .into(),
                );
            }
            if intent.question_detected && draft.body.len() < MIN_ANSWER_LENGTH {
                reasons.push(ClarificationReason::MissingInformation);
                questions
                    .push("The email contains a question the draft may not answer. \
                           Do you have the needed information?"
                        .into());
            }
        }

        if reasons.is_empty() {
            return None;
        }

        debug!(
            message_id = %email.metadata.message_id,
            questions = questions.len(),
            "Clarification required"
        );
        Some(ClarificationRequest {
            email_id: email.metadata.message_id.clone(),
            subject: email.metadata.subject.clone(),
            reasons,
            questions,
            context: json!({
                "sender": email.metadata.sender,
                "original_recipients": email.metadata.recipients,
                "cc": email.metadata.cc,
                "priority_score": email.score(),
            }),
        })
    }
}

fn is_ambiguous_address(address: &str) -> bool {
    let lower = address.to_lowercase();
    AMBIGUOUS_LOCAL_PARTS.iter().any(|p| lower.starts_with(p))
}
