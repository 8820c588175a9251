//! Reply-all risk analysis.
//!
//! Looks at the draft's full recipient list against the original
//! thread: list size, external count, mixed audiences, PII, sensitive
//! categories. High/critical risks block sending; medium requires
//! approval.

use serde_json::json;
use tracing::warn;

use crate::guardrails::DomainChecker;
use crate::model::{EmailCategory, FlagType, ProcessedEmail, SecurityFlag, Severity};

/// Warn above this many total draft recipients.
const MAX_RECIPIENTS_WARNING: usize = 5;

/// Block above this many external draft recipients.
const MAX_EXTERNAL_RECIPIENTS: usize = 3;

/// Mixed audiences block above this many external recipients.
const MAX_MIXED_EXTERNAL: usize = 2;

/// Warn when the original thread had more recipients than this.
const MAX_ORIGINAL_LIST: usize = 10;

#[derive(Debug, Clone)]
pub struct ReplyAllAnalysis {
    /// None means no significant risk.
    pub risk_level: Option<Severity>,
    pub total_recipients: usize,
    pub external_count: usize,
    pub internal_count: usize,
    pub risk_factors: Vec<String>,
}

pub struct ReplyAllChecker<'a> {
    domains: DomainChecker<'a>,
}

impl<'a> ReplyAllChecker<'a> {
    pub fn new(domains: DomainChecker<'a>) -> Self {
        Self { domains }
    }

    pub fn analyze(&self, email: &ProcessedEmail) -> ReplyAllAnalysis {
        let Some(draft) = &email.draft_reply else {
            return ReplyAllAnalysis {
                risk_level: None,
                total_recipients: 0,
                external_count: 0,
                internal_count: 0,
                risk_factors: Vec::new(),
            };
        };

        let all: Vec<String> = draft
            .recipients
            .iter()
            .chain(draft.cc.iter())
            .cloned()
            .collect();
        let (internal, external) = self.domains.split(&all);
        let original_list = email.metadata.recipients.len() + email.metadata.cc.len();

        let mut findings: Vec<(Severity, String)> = Vec::new();

        if email.has_pii && !external.is_empty() {
            findings.push((Severity::Critical, "PII with external recipients".into()));
        }
        let sensitive = matches!(email.category, EmailCategory::Legal | EmailCategory::Finance);
        if sensitive && !external.is_empty() {
            findings.push((
                Severity::High,
                format!(
                    "sensitive category ({}) with external recipients",
                    email.category.label()
                ),
            ));
        }
        if external.len() > MAX_EXTERNAL_RECIPIENTS {
            findings.push((
                Severity::High,
                format!("{} external recipients", external.len()),
            ));
        }
        if !internal.is_empty() && external.len() > MAX_MIXED_EXTERNAL {
            findings.push((
                Severity::High,
                format!("mixed audience with {} external recipients", external.len()),
            ));
        }
        if all.len() > MAX_RECIPIENTS_WARNING {
            findings.push((
                Severity::Medium,
                format!("large recipient list ({})", all.len()),
            ));
        }
        if original_list > MAX_ORIGINAL_LIST {
            findings.push((
                Severity::Medium,
                format!("original thread had {original_list} recipients"),
            ));
        }

        ReplyAllAnalysis {
            risk_level: findings.iter().map(|(severity, _)| *severity).max(),
            total_recipients: all.len(),
            external_count: external.len(),
            internal_count: internal.len(),
            risk_factors: findings.into_iter().map(|(_, factor)| factor).collect(),
        }
    }

    /// Analyze and attach the appropriate flag. High/critical blocks;
    /// medium requires approval without blocking.
    pub fn apply(&self, email: &mut ProcessedEmail) {
        let analysis = self.analyze(email);
        let Some(level) = analysis.risk_level else {
            return;
        };

        let details = json!({
            "total_recipients": analysis.total_recipients,
            "external_count": analysis.external_count,
            "internal_count": analysis.internal_count,
            "risk_factors": analysis.risk_factors,
        });

        if level >= Severity::High {
            warn!(
                message_id = %email.metadata.message_id,
                level = ?level,
                "Reply-all risk blocks sending"
            );
            email.add_flag(
                SecurityFlag::new(FlagType::ReplyAllRisk, level, "reply-all risk detected")
                    .with_details(details)
                    .blocking(),
            );
        } else {
            email.add_flag(
                SecurityFlag::new(
                    FlagType::ReplyAllWarning,
                    level,
                    "reply-all warning - approval recommended",
                )
                .with_details(details),
            );
            if let Some(draft) = email.draft_reply.as_mut() {
                draft.requires_approval = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TriageConfig;
    use crate::model::{DraftReply, EmailMetadata};

    fn config() -> TriageConfig {
        let mut config = TriageConfig::default();
        config.operator_domain = Some("company.com".into());
        config
    }

    fn email_with_draft(to: Vec<&str>, cc: Vec<&str>) -> ProcessedEmail {
        let metadata = EmailMetadata {
            message_id: "m-1".into(),
            thread_id: None,
            sender: "alice@outside.example".into(),
            subject: "Re: numbers".into(),
            body: "see attached".into(),
            recipients: vec!["me@company.com".into()],
            cc: vec![],
            date: None,
            has_attachments: false,
        };
        let mut email = ProcessedEmail::new(metadata);
        email.draft_reply = Some(DraftReply::new(
            "Re: numbers",
            "Thanks, will review.",
            to.into_iter().map(String::from).collect(),
        ));
        if let Some(draft) = email.draft_reply.as_mut() {
            draft.cc = cc.into_iter().map(String::from).collect();
        }
        email
    }

    #[test]
    fn no_draft_no_risk() {
        let config = config();
        let checker = ReplyAllChecker::new(DomainChecker::new(&config));
        let email = ProcessedEmail::new(EmailMetadata {
            message_id: "m".into(),
            thread_id: None,
            sender: "a@b.example".into(),
            subject: String::new(),
            body: String::new(),
            recipients: vec![],
            cc: vec![],
            date: None,
            has_attachments: false,
        });
        assert!(checker.analyze(&email).risk_level.is_none());
    }

    #[test]
    fn pii_plus_external_is_critical() {
        let config = config();
        let checker = ReplyAllChecker::new(DomainChecker::new(&config));
        let mut email = email_with_draft(vec!["alice@outside.example"], vec![]);
        email.has_pii = true;
        let analysis = checker.analyze(&email);
        assert_eq!(analysis.risk_level, Some(Severity::Critical));

        checker.apply(&mut email);
        assert!(email.is_blocked);
        assert!(
            email
                .security_flags
                .iter()
                .any(|f| f.flag_type == FlagType::ReplyAllRisk && f.blocks_sending)
        );
    }

    #[test]
    fn sensitive_category_external_is_high() {
        let config = config();
        let checker = ReplyAllChecker::new(DomainChecker::new(&config));
        let mut email = email_with_draft(vec!["alice@outside.example"], vec![]);
        email.category = EmailCategory::Finance;
        assert_eq!(checker.analyze(&email).risk_level, Some(Severity::High));
    }

    #[test]
    fn many_external_recipients_block() {
        let config = config();
        let checker = ReplyAllChecker::new(DomainChecker::new(&config));
        let email = email_with_draft(
            vec!["a@x.example", "b@x.example", "c@x.example", "d@x.example"],
            vec![],
        );
        assert_eq!(checker.analyze(&email).risk_level, Some(Severity::High));
    }

    #[test]
    fn mixed_audience_with_three_external_blocks() {
        let config = config();
        let checker = ReplyAllChecker::new(DomainChecker::new(&config));
        let email = email_with_draft(
            vec!["in@company.com", "a@x.example", "b@x.example", "c@x.example"],
            vec![],
        );
        assert_eq!(checker.analyze(&email).risk_level, Some(Severity::High));
    }

    #[test]
    fn large_list_is_medium_and_requires_approval() {
        let config = config();
        let checker = ReplyAllChecker::new(DomainChecker::new(&config));
        let mut email = email_with_draft(
            vec![
                "a@company.com",
                "b@company.com",
                "c@company.com",
                "d@company.com",
                "e@company.com",
                "f@company.com",
            ],
            vec![],
        );
        let analysis = checker.analyze(&email);
        assert_eq!(analysis.risk_level, Some(Severity::Medium));

        checker.apply(&mut email);
        assert!(!email.is_blocked);
        assert!(email.draft_reply.as_ref().unwrap().requires_approval);
        assert!(
            email
                .security_flags
                .iter()
                .any(|f| f.flag_type == FlagType::ReplyAllWarning)
        );
    }

    #[test]
    fn large_original_thread_is_medium() {
        let config = config();
        let checker = ReplyAllChecker::new(DomainChecker::new(&config));
        let mut email = email_with_draft(vec!["in@company.com"], vec![]);
        email.metadata.recipients = (0..11).map(|i| format!("r{i}@company.com")).collect();
        assert_eq!(checker.analyze(&email).risk_level, Some(Severity::Medium));
    }

    #[test]
    fn single_internal_recipient_is_clean() {
        let config = config();
        let checker = ReplyAllChecker::new(DomainChecker::new(&config));
        let email = email_with_draft(vec!["in@company.com"], vec![]);
        assert!(checker.analyze(&email).risk_level.is_none());
    }
}
