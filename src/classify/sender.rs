//! Sender classification — who is this from, and how much do we care?
//!
//! First match wins, in this order: VIP address → VIP domain → operator
//! domain (TEAM) → vendor heuristics → consumer provider (CUSTOMER) →
//! malformed/bad patterns (SPAM) → UNKNOWN.

use tracing::debug;

use crate::config::TriageConfig;
use crate::model::{EmailMetadata, SenderClassification, SenderType};

pub struct SenderClassifier<'a> {
    config: &'a TriageConfig,
}

impl<'a> SenderClassifier<'a> {
    pub fn new(config: &'a TriageConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, metadata: &EmailMetadata) -> SenderClassification {
        let sender = metadata.sender.trim().to_lowercase();
        let Some((local, domain)) = split_address(&sender) else {
            debug!(sender = %metadata.sender, "Malformed sender address");
            return self.labeled(
                SenderType::Spam,
                "",
                0.9,
                "malformed sender address",
            );
        };

        // VIP address beats VIP domain beats everything else.
        if self.config.vip_emails.iter().any(|v| v.eq_ignore_ascii_case(&sender)) {
            return self.labeled(SenderType::Vip, domain, 1.0, "address on VIP list");
        }
        if self.config.vip_domains.iter().any(|v| v.eq_ignore_ascii_case(domain)) {
            return self.labeled(SenderType::Vip, domain, 0.9, "domain on VIP list");
        }
        if self
            .config
            .operator_domain
            .as_deref()
            .is_some_and(|d| d.eq_ignore_ascii_case(domain))
        {
            return self.labeled(SenderType::Team, domain, 0.8, "operator domain");
        }

        // Vendor heuristics on local part and domain keywords.
        if self
            .config
            .vendor_local_parts
            .iter()
            .any(|v| local == *v || local.starts_with(&format!("{v}+")))
            || domain.contains("marketing")
            || domain.contains("newsletter")
        {
            return self.labeled(SenderType::Vendor, domain, 0.7, "vendor address pattern");
        }

        // Consumer providers with an ordinary local part read as customers.
        if self
            .config
            .consumer_providers
            .iter()
            .any(|p| p.eq_ignore_ascii_case(domain))
            && looks_personal(local)
        {
            return self.labeled(SenderType::Customer, domain, 0.6, "consumer provider");
        }

        if is_bad_pattern(local, domain) {
            return self.labeled(SenderType::Spam, domain, 0.8, "known bad pattern");
        }

        self.labeled(SenderType::Unknown, domain, 0.2, "no rule matched")
    }

    fn labeled(
        &self,
        sender_type: SenderType,
        domain: &str,
        confidence: f32,
        notes: &str,
    ) -> SenderClassification {
        SenderClassification {
            sender_type,
            is_vip: sender_type == SenderType::Vip,
            is_internal: sender_type == SenderType::Team,
            domain: domain.to_string(),
            confidence,
            notes: notes.to_string(),
        }
    }
}

/// Split `local@domain`; None when the address is not well-formed.
fn split_address(address: &str) -> Option<(&str, &str)> {
    let (local, domain) = address.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.') {
        return None;
    }
    Some((local, domain))
}

/// A local part that reads like a person rather than an automaton.
fn looks_personal(local: &str) -> bool {
    !local.chars().all(|c| c.is_ascii_digit())
        && !local.contains("bounce")
        && !local.contains("mailer")
}

fn is_bad_pattern(local: &str, domain: &str) -> bool {
    local.contains("mailer-daemon")
        || local.starts_with("bounce")
        || domain.ends_with(".invalid")
        || domain.split('.').next().is_some_and(|label| {
            label.len() > 20 && label.chars().filter(|c| c.is_ascii_digit()).count() > 8
        })
}
