//! Reply drafting — scrubbed LLM prompt with deterministic template
//! fallback.
//!
//! The prompt is routed through `anonymize` before any network call.
//! Every failure path (no client, timeout, quota, empty response) ends
//! in a fixed template keyed by the primary intent, so drafting never
//! fails.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::guardrails::PiiDetector;
use crate::llm::LlmClient;
use crate::memory::VectorMemory;
use crate::model::{DraftReply, Intent, IntentDetection, ProcessedEmail};

/// How the draft body was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftSource {
    Llm,
    Template,
}

pub struct Drafter {
    llm: Option<Arc<dyn LlmClient>>,
    memory: Arc<dyn VectorMemory>,
    pii: PiiDetector,
    timeout: Duration,
}

impl Drafter {
    pub fn new(
        llm: Option<Arc<dyn LlmClient>>,
        memory: Arc<dyn VectorMemory>,
        timeout: Duration,
    ) -> Self {
        Self {
            llm,
            memory,
            pii: PiiDetector::new(),
            timeout,
        }
    }

    /// Produce a draft for an email that requires a reply. `budget`
    /// caps the LLM wait below the per-batch deadline.
    pub async fn draft(
        &self,
        email: &ProcessedEmail,
        budget: Duration,
        created_at: DateTime<Utc>,
    ) -> (DraftReply, DraftSource) {
        let intent = email.intent.clone().unwrap_or_default();
        let key = template_key(&intent);

        let (body, source) = match self.generate_body(email, &intent, budget).await {
            Some(text) => (text, DraftSource::Llm),
            None => {
                info!(
                    message_id = %email.metadata.message_id,
                    template = key,
                    "Using template fallback for draft"
                );
                (template_body(key).to_string(), DraftSource::Template)
            }
        };

        let mut reply = DraftReply::new(
            reply_subject(&email.metadata.subject),
            body,
            vec![email.metadata.sender.clone()],
        );
        reply.created_at = created_at;
        reply.requires_approval = true;
        (reply, source)
    }

    async fn generate_body(
        &self,
        email: &ProcessedEmail,
        intent: &IntentDetection,
        budget: Duration,
    ) -> Option<String> {
        let llm = self.llm.as_ref()?;
        let timeout = self.timeout.min(budget);
        if timeout.is_zero() {
            warn!(
                message_id = %email.metadata.message_id,
                "Batch deadline exhausted before drafting"
            );
            return None;
        }

        let prompt = self.build_prompt(email, intent).await;
        match llm.generate(&prompt, timeout).await {
            Ok(text) => {
                debug!(message_id = %email.metadata.message_id, "LLM draft generated");
                Some(text.trim().to_string())
            }
            Err(e) => {
                warn!(
                    message_id = %email.metadata.message_id,
                    error = %e,
                    "LLM draft failed, falling back to template"
                );
                None
            }
        }
    }

    /// Minimal prompt, scrubbed of PII before it leaves the process.
    async fn build_prompt(&self, email: &ProcessedEmail, intent: &IntentDetection) -> String {
        let mut prompt = format!(
            "Write a short, professional email reply.\n\n\
             Original subject: {}\n\
             Sender: {}\n\
             Intent: {}\n\
             Action required: {}\n",
            email.metadata.subject,
            email.metadata.sender,
            intent
                .primary_intent
                .map(intent_label)
                .unwrap_or("general"),
            intent.action_required,
        );

        let examples = self.memory.retrieve(&email.metadata.subject, 2).await;
        if !examples.is_empty() {
            prompt.push_str("\nPrior replies to similar emails:\n");
            for example in examples {
                prompt.push_str(&format!("- {}\n", example.reply_summary));
            }
        }

        prompt.push_str(
            "\nReply rules:\n\
             - Be polite and professional\n\
             - Acknowledge the email\n\
             - Do not promise actions\n\
             - Keep it to 2-3 sentences\n\n\
             Draft reply:",
        );

        self.pii.anonymize(&prompt)
    }
}

/// Reply-subject rule: reuse an existing `Re:`, else prepend one.
pub fn reply_subject(original: &str) -> String {
    if original.to_lowercase().starts_with("re:") {
        original.to_string()
    } else {
        format!("Re: {original}")
    }
}

fn intent_label(intent: Intent) -> &'static str {
    match intent {
        Intent::Legal => "legal",
        Intent::Finance => "finance",
        Intent::It => "it",
        Intent::Hr => "hr",
        Intent::Meeting => "meeting",
        Intent::Invitation => "invitation",
        Intent::Complaint => "complaint",
        Intent::Academic => "academic",
    }
}

/// Template key derivation, most specific first.
fn template_key(intent: &IntentDetection) -> &'static str {
    if intent.has(Intent::Complaint) {
        "complaint"
    } else if intent.has(Intent::Meeting) || intent.has(Intent::Invitation) {
        "meeting"
    } else if intent.question_detected {
        "question"
    } else if intent.action_required {
        "request"
    } else {
        "default"
    }
}

fn template_body(key: &str) -> &'static str {
    match key {
        "question" => {
            "Thank you for your email. I've received your question and will \
             review it shortly. I'll get back to you with more details.\n\n\
             Best regards"
        }
        "request" => {
            "Thank you for reaching out. I've noted your request and will \
             review it shortly. I'll follow up soon.\n\n\
             Best regards"
        }
        "meeting" => {
            "Thank you for your message. I'll check my availability and \
             get back to you shortly.\n\n\
             Best regards"
        }
        "complaint" => {
            "Thank you for bringing this to my attention. I understand your \
             concerns and will look into this matter.\n\n\
             Best regards"
        }
        _ => {
            "Thank you for your email. I've received your message and will \
             respond accordingly.\n\n\
             Best regards"
        }
    }
}
