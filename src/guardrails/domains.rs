//! Recipient domain checks — internal vs. external.

use crate::config::TriageConfig;
use crate::model::{EmailCategory, FlagType, SecurityFlag, Severity};

pub struct DomainChecker<'a> {
    config: &'a TriageConfig,
}

impl<'a> DomainChecker<'a> {
    pub fn new(config: &'a TriageConfig) -> Self {
        Self { config }
    }

    pub fn is_internal(&self, address: &str) -> bool {
        domain_of(address).is_some_and(|d| self.config.is_internal_domain(d))
    }

    /// Split addresses into (internal, external), preserving order.
    pub fn split<'b>(&self, addresses: &'b [String]) -> (Vec<&'b str>, Vec<&'b str>) {
        let mut internal = Vec::new();
        let mut external = Vec::new();
        for address in addresses {
            if self.is_internal(address) {
                internal.push(address.as_str());
            } else {
                external.push(address.as_str());
            }
        }
        (internal, external)
    }

    /// Informational flag for an external sender. Never blocks on its
    /// own.
    pub fn external_sender_flag(&self, sender: &str) -> Option<SecurityFlag> {
        if self.is_internal(sender) {
            return None;
        }
        Some(
            SecurityFlag::new(
                FlagType::ExternalSender,
                Severity::Low,
                format!("sender {sender} is outside the allowed domains"),
            )
            .with_details(serde_json::json!({ "sender": sender })),
        )
    }

    /// Blocking flag when draft recipients leave the organization on a
    /// sensitive category or with PII present.
    pub fn check_draft_recipients(
        &self,
        recipients: &[String],
        cc: &[String],
        category: EmailCategory,
        has_pii: bool,
    ) -> Option<SecurityFlag> {
        let all: Vec<String> = recipients.iter().chain(cc.iter()).cloned().collect();
        let (_, external) = self.split(&all);
        if external.is_empty() {
            return None;
        }

        let sensitive = matches!(category, EmailCategory::Legal | EmailCategory::Finance);
        if !sensitive && !has_pii {
            return None;
        }

        let (flag_type, reason) = if has_pii {
            (FlagType::PiiDetected, "PII would leave the organization")
        } else if category == EmailCategory::Legal {
            (FlagType::LegalContent, "legal content to external recipients")
        } else {
            (FlagType::FinanceContent, "finance content to external recipients")
        };

        Some(
            SecurityFlag::new(flag_type, Severity::High, reason)
                .with_details(serde_json::json!({
                    "external_recipients": external,
                    "category": format!("{category:?}").to_lowercase(),
                }))
                .blocking(),
        )
    }
}

fn domain_of(address: &str) -> Option<&str> {
    address.rsplit_once('@').map(|(_, domain)| domain)
}
