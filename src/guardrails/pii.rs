//! PII detection and scrubbing.
//!
//! `anonymize` replaces PII substrings with bracketed placeholders and
//! is idempotent: placeholders contain no digits and no `@`, so no
//! pattern can re-match scrubbed text.

use regex::Regex;

/// PII categories we scan for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PiiKind {
    CreditCard,
    NationalId,
    Passport,
    BankAccount,
    Phone,
    Email,
    Address,
}

impl PiiKind {
    pub fn placeholder(self) -> &'static str {
        match self {
            Self::CreditCard => "[CREDIT_CARD]",
            Self::NationalId => "[NATIONAL_ID]",
            Self::Passport => "[PASSPORT]",
            Self::BankAccount => "[BANK_ACCOUNT]",
            Self::Phone => "[PHONE]",
            Self::Email => "[EMAIL]",
            Self::Address => "[ADDRESS]",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::NationalId => "national_id",
            Self::Passport => "passport",
            Self::BankAccount => "bank_account",
            Self::Phone => "phone",
            Self::Email => "email",
            Self::Address => "address",
        }
    }
}

pub struct PiiDetector {
    // Ordered: broader numeric patterns must run after the more
    // specific ones (a card number would otherwise read as a bank
    // account).
    patterns: Vec<(PiiKind, Regex)>,
}

impl PiiDetector {
    pub fn new() -> Self {
        let table: [(PiiKind, &str); 7] = [
            (PiiKind::CreditCard, r"\b(?:\d{4}[ -]?){3}\d{4}\b"),
            (PiiKind::NationalId, r"\b\d{3}-\d{2}-\d{4}\b"),
            (PiiKind::Passport, r"\b[A-Z]{1,2}\d{7,8}\b"),
            (PiiKind::BankAccount, r"\b\d{9,17}\b"),
            (
                PiiKind::Phone,
                r"\b(?:\+\d{1,3}[ .-]?)?\(?\d{3}\)?[ .-]\d{3}[ .-]\d{4}\b",
            ),
            (
                PiiKind::Email,
                r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            ),
            (
                PiiKind::Address,
                r"(?i)\b\d{1,5} [a-z]+ (street|st|avenue|ave|road|rd|boulevard|blvd|lane|ln|drive|dr)\b",
            ),
        ];
        let patterns = table
            .into_iter()
            .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("PII pattern is valid")))
            .collect();
        Self { patterns }
    }

    /// Which PII kinds occur in the text, in pattern order, deduplicated.
    pub fn detect(&self, text: &str) -> Vec<PiiKind> {
        let mut found = Vec::new();
        let mut remaining = text.to_string();
        for (kind, pattern) in &self.patterns {
            if pattern.is_match(&remaining) {
                found.push(*kind);
                // Mask before the next (possibly overlapping) pattern.
                remaining = pattern.replace_all(&remaining, kind.placeholder()).into_owned();
            }
        }
        found
    }

    /// Replace every PII substring with its placeholder. Idempotent:
    /// `anonymize(anonymize(t)) == anonymize(t)`.
    pub fn anonymize(&self, text: &str) -> String {
        let mut scrubbed = text.to_string();
        for (kind, pattern) in &self.patterns {
            scrubbed = pattern
                .replace_all(&scrubbed, kind.placeholder())
                .into_owned();
        }
        scrubbed
    }
}

impl Default for PiiDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_credit_card_variants() {
        let detector = PiiDetector::new();
        for text in [
            "card 4111111111111111 on file",
            "card 4111 1111 1111 1111 on file",
            "card 4111-1111-1111-1111 on file",
        ] {
            assert_eq!(detector.detect(text), vec![PiiKind::CreditCard], "{text}");
        }
    }

    #[test]
    fn card_number_is_not_double_counted_as_bank_account() {
        let detector = PiiDetector::new();
        let found = detector.detect("pay with 4111111111111111 please");
        assert!(found.contains(&PiiKind::CreditCard));
        assert!(!found.contains(&PiiKind::BankAccount));
    }

    #[test]
    fn detects_national_id() {
        let detector = PiiDetector::new();
        assert_eq!(
            detector.detect("SSN is 123-45-6789"),
            vec![PiiKind::NationalId]
        );
    }

    #[test]
    fn detects_passport_and_bank_account() {
        let detector = PiiDetector::new();
        assert_eq!(detector.detect("passport AB1234567"), vec![PiiKind::Passport]);
        assert_eq!(
            detector.detect("wire to account 123456789012"),
            vec![PiiKind::BankAccount]
        );
    }

    #[test]
    fn detects_phone_and_email() {
        let detector = PiiDetector::new();
        assert_eq!(
            detector.detect("call +1 555-123-4567 tonight"),
            vec![PiiKind::Phone]
        );
        assert_eq!(
            detector.detect("write to jane@secret.example please"),
            vec![PiiKind::Email]
        );
    }

    #[test]
    fn detects_street_address() {
        let detector = PiiDetector::new();
        assert_eq!(
            detector.detect("ship to 42 Elm Street before Friday"),
            vec![PiiKind::Address]
        );
    }

    #[test]
    fn clean_text_has_no_findings() {
        let detector = PiiDetector::new();
        assert!(detector.detect("See you at the meeting tomorrow.").is_empty());
    }

    #[test]
    fn anonymize_replaces_with_placeholders() {
        let detector = PiiDetector::new();
        let scrubbed =
            detector.anonymize("Card 4111111111111111, call 555-123-4567, mail a@b.example");
        assert!(scrubbed.contains("[CREDIT_CARD]"));
        assert!(scrubbed.contains("[PHONE]"));
        assert!(scrubbed.contains("[EMAIL]"));
        assert!(!scrubbed.contains("4111"));
        assert!(!scrubbed.contains("a@b.example"));
    }

    #[test]
    fn anonymize_is_idempotent() {
        let detector = PiiDetector::new();
        let text = "SSN 123-45-6789, card 4111 1111 1111 1111, 42 Oak Ave, \
                    jane@secret.example, +44 555-123-4567, account 12345678901";
        let once = detector.anonymize(text);
        let twice = detector.anonymize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn anonymize_leaves_clean_text_untouched() {
        let detector = PiiDetector::new();
        let text = "Thanks for the update, talk soon.";
        assert_eq!(detector.anonymize(text), text);
    }

    #[test]
    fn scrubbed_text_detects_nothing() {
        let detector = PiiDetector::new();
        let scrubbed = detector.anonymize("SSN 123-45-6789 and card 4111111111111111");
        assert!(detector.detect(&scrubbed).is_empty());
    }
}
