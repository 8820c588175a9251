//! Spam filtering and final categorization.

use regex::Regex;
use tracing::debug;

use crate::config::TriageConfig;
use crate::model::{EmailCategory, EmailMetadata, Intent, IntentDetection, SenderClassification, SenderType};

/// Spam decision over sender label, subject patterns and link density.
pub struct SpamFilter<'a> {
    config: &'a TriageConfig,
    subject_patterns: Vec<Regex>,
}

impl<'a> SpamFilter<'a> {
    pub fn new(config: &'a TriageConfig) -> Self {
        let subject_patterns = config
            .spam_subject_patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self {
            config,
            subject_patterns,
        }
    }

    /// Returns the block reason when the message is spam.
    pub fn check(
        &self,
        metadata: &EmailMetadata,
        classification: &SenderClassification,
    ) -> Option<String> {
        if classification.sender_type == SenderType::Spam {
            return Some("sender classified as spam".into());
        }

        if let Some(pattern) = self
            .subject_patterns
            .iter()
            .find(|p| p.is_match(&metadata.subject))
        {
            debug!(subject = %metadata.subject, "Spam subject pattern matched");
            return Some(format!("spam subject pattern: {}", pattern.as_str()));
        }

        let density = link_density(&metadata.body);
        if density > self.config.max_link_density {
            return Some(format!("link density {density:.2} over limit"));
        }

        None
    }
}

/// Links per word in the body. An empty body has zero density.
fn link_density(body: &str) -> f32 {
    let words = body.split_whitespace().count();
    if words == 0 {
        return 0.0;
    }
    let links = body.matches("http://").count() + body.matches("https://").count();
    links as f32 / words as f32
}

/// Maps detected intents and flags to a single category.
/// Precedence is fixed: spam overrides all, then legal > finance >
/// complaint > it > hr > meeting/invitation > academic > action.
pub struct Categorizer;

impl Categorizer {
    pub fn categorize(intent: &IntentDetection, is_spam: bool) -> EmailCategory {
        if is_spam {
            return EmailCategory::Spam;
        }
        if intent.has(Intent::Legal) {
            return EmailCategory::Legal;
        }
        if intent.has(Intent::Finance) {
            return EmailCategory::Finance;
        }
        if intent.has(Intent::Complaint) {
            return EmailCategory::Action;
        }
        if intent.has(Intent::It) {
            return EmailCategory::It;
        }
        if intent.has(Intent::Hr) {
            return EmailCategory::Hr;
        }
        if intent.has(Intent::Meeting) || intent.has(Intent::Invitation) {
            return EmailCategory::Meeting;
        }
        if intent.has(Intent::Academic) {
            return EmailCategory::Other;
        }
        if intent.action_required {
            return EmailCategory::Action;
        }
        EmailCategory::Informational
    }
}
