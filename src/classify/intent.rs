//! Intent and urgency scanning over subject + body text.
//!
//! Subject hits outweigh body hits by [`SUBJECT_WEIGHT`]. A subject
//! hard-override term fixes the urgency score outright and skips all
//! further urgency arithmetic; domain-intent membership and the
//! question/follow-up flags are still computed because the categorizer
//! and the priority category factor consume them.

use regex::Regex;
use tracing::debug;

use crate::config::{SUBJECT_WEIGHT, TriageConfig, URGENCY_CAP};
use crate::model::{Intent, IntentDetection};

/// Urgency fixed by a subject hard-override term.
const SUBJECT_OVERRIDE_URGENCY: i32 = 35;

/// Penalty per subject low-priority term.
const SUBJECT_LOW_PENALTY: i32 = 8;

/// Bonus for forwarded subjects.
const FORWARD_BONUS: i32 = 4;

/// Bonus for a matched deadline pattern.
const DEADLINE_BONUS: i32 = 8;

/// Minimum urgency when finance intent and a near deadline coincide.
const FINANCE_DEADLINE_FLOOR: i32 = 32;

/// Penalty per low-priority indicator hit.
const LOW_PRIORITY_PENALTY: i32 = 5;

/// Phrases that negate an action request; masked out before action and
/// urgency keyword matching so "no action required" does not read as
/// "action required".
const NEGATED_ACTION_PHRASES: &[&str] = &[
    "no action required",
    "no action needed",
    "no response needed",
    "no response required",
];

pub struct IntentScanner<'a> {
    config: &'a TriageConfig,
    deadline_patterns: Vec<Regex>,
}

impl<'a> IntentScanner<'a> {
    pub fn new(config: &'a TriageConfig) -> Self {
        let deadline_patterns = [
            r"(?i)due (today|tomorrow|this week)",
            r"(?i)deadline.*(today|tomorrow)",
            r"(?i)by (today|tomorrow|eod)",
            r"(?i)within (24|48) hours?",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("deadline pattern is valid"))
        .collect();
        Self {
            config,
            deadline_patterns,
        }
    }

    pub fn scan(&self, subject: &str, body: &str) -> IntentDetection {
        let subject_lower = subject.to_lowercase();
        let body_lower = body.to_lowercase();
        let text = format!("{subject_lower} {body_lower}");

        let masked_text = mask_negations(&text);
        let masked_subject = mask_negations(&subject_lower);
        let masked_body = mask_negations(&body_lower);

        let is_follow_up = self
            .config
            .follow_up_phrases
            .iter()
            .any(|p| text.contains(p.as_str()));
        let question_detected = text.contains('?');
        let action_required = self
            .config
            .action_phrases
            .iter()
            .any(|p| masked_text.contains(p.as_str()));

        let (intents, domain_bonus) = self.detect_intents(&text);

        let mut urgency_keywords: Vec<String> = Vec::new();

        // Subject hard override dominates all urgency arithmetic.
        if let Some(term) = self
            .config
            .subject_high_priority
            .iter()
            .find(|t| subject_lower.contains(t.as_str()))
        {
            debug!(term = %term, "Subject override triggered");
            urgency_keywords.push(format!("subject_override:{term}"));
            return IntentDetection {
                primary_intent: intents.first().copied(),
                intents,
                urgency_keywords,
                urgency_score: SUBJECT_OVERRIDE_URGENCY,
                action_required: true,
                question_detected,
                is_follow_up,
            };
        }

        let mut score = 0i32;

        for term in &self.config.subject_low_priority {
            if subject_lower.contains(term.as_str()) {
                score -= SUBJECT_LOW_PENALTY;
                urgency_keywords.push(format!("low_priority_indicator:subject:{term}"));
            }
        }

        if subject_lower.starts_with("fwd:") || subject_lower.starts_with("fw:") {
            score += FORWARD_BONUS;
            urgency_keywords.push("forwarded".into());
        }

        for (keyword, weight) in &self.config.urgency_keywords {
            let mut hit = false;
            if masked_subject.contains(keyword.as_str()) {
                score += (*weight as f32 * SUBJECT_WEIGHT).round() as i32;
                hit = true;
            }
            if masked_body.contains(keyword.as_str()) {
                score += weight;
                hit = true;
            }
            if hit {
                urgency_keywords.push(keyword.clone());
            }
        }

        score += domain_bonus;

        let near_deadline = self.deadline_patterns.iter().any(|p| p.is_match(&text));
        if near_deadline {
            score += DEADLINE_BONUS;
            urgency_keywords.push("near_deadline".into());
        }

        if near_deadline && intents.contains(&Intent::Finance) {
            score = score.max(FINANCE_DEADLINE_FLOOR);
        }

        let reducer_hits = self
            .config
            .low_priority_indicators
            .iter()
            .filter(|i| text.contains(i.as_str()))
            .count() as i32;
        if reducer_hits > 0 {
            score -= reducer_hits * LOW_PRIORITY_PENALTY;
            urgency_keywords.push(format!("low_priority_indicator:{reducer_hits}"));
        }

        IntentDetection {
            primary_intent: intents.first().copied(),
            intents,
            urgency_keywords,
            urgency_score: score.clamp(0, URGENCY_CAP),
            action_required,
            question_detected,
            is_follow_up,
        }
    }

    /// Match domain keyword sets; a matched set records its intent once.
    /// Finance and academic add +6, legal +5; other sets carry no
    /// urgency bonus (their weight lives in the category factor).
    fn detect_intents(&self, text: &str) -> (Vec<Intent>, i32) {
        let mut intents = Vec::new();
        let mut bonus = 0;

        let sets: [(&[String], Intent, i32); 7] = [
            (&self.config.legal_keywords, Intent::Legal, 5),
            (&self.config.finance_keywords, Intent::Finance, 6),
            (&self.config.it_keywords, Intent::It, 0),
            (&self.config.hr_keywords, Intent::Hr, 0),
            (&self.config.meeting_keywords, Intent::Meeting, 0),
            (&self.config.invitation_keywords, Intent::Invitation, 0),
            (&self.config.academic_keywords, Intent::Academic, 6),
        ];
        for (keywords, intent, set_bonus) in sets {
            if keywords.iter().any(|k| text.contains(k.as_str())) {
                intents.push(intent);
                bonus += set_bonus;
            }
        }

        let complaint_hits = self
            .config
            .complaint_keywords
            .iter()
            .filter(|k| text.contains(k.as_str()))
            .count();
        if complaint_hits >= 2 || text.contains("complaint") {
            intents.push(Intent::Complaint);
        }

        (intents, bonus)
    }
}

fn mask_negations(text: &str) -> String {
    let mut masked = text.to_string();
    for phrase in NEGATED_ACTION_PHRASES {
        while let Some(pos) = masked.find(phrase) {
            masked.replace_range(pos..pos + phrase.len(), &" ".repeat(phrase.len()));
        }
    }
    masked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(subject: &str, body: &str) -> IntentDetection {
        let config = TriageConfig::default();
        IntentScanner::new(&config).scan(subject, body)
    }

    #[test]
    fn subject_override_fixes_urgency() {
        let result = scan("URGENT: Payment due tomorrow", "please pay by eod");
        assert_eq!(result.urgency_score, 35);
        assert!(result.action_required);
        assert!(
            result
                .urgency_keywords
                .iter()
                .any(|k| k.starts_with("subject_override:"))
        );
        // Domain intents still detected for the categorizer.
        assert!(result.has(Intent::Finance));
    }

    #[test]
    fn subject_hit_outweighs_body_hit() {
        let in_subject = scan("deadline approaching", "");
        let in_body = scan("status", "deadline approaching");
        assert!(in_subject.urgency_score > in_body.urgency_score);
    }

    #[test]
    fn forwarded_subject_bonus() {
        let forwarded = scan("Fwd: quarterly numbers", "see below");
        let plain = scan("quarterly numbers", "see below");
        assert_eq!(forwarded.urgency_score - plain.urgency_score, 4);
        assert!(forwarded.urgency_keywords.contains(&"forwarded".into()));
    }

    #[test]
    fn deadline_pattern_adds_bonus_and_tag() {
        let result = scan("report", "this is due tomorrow");
        assert!(result.urgency_keywords.contains(&"near_deadline".into()));
        assert!(result.urgency_score >= 8);
    }

    #[test]
    fn finance_with_deadline_floors_at_32() {
        let result = scan("invoice", "the invoice is due tomorrow");
        // invoice (finance +6) + deadline (+8) alone would be 14; floored.
        assert!(result.urgency_score >= 32);
        assert!(result.has(Intent::Finance));
    }

    #[test]
    fn urgency_clamped_at_cap() {
        let result = scan(
            "emergency outage",
            "emergency! production down, system down, data loss, urgent, asap, critical outage",
        );
        assert_eq!(result.urgency_score, 35); // subject override path
        let result = scan(
            "bad day",
            "emergency! production down, system down, data loss, urgent, asap, immediately",
        );
        assert_eq!(result.urgency_score, URGENCY_CAP);
    }

    #[test]
    fn low_priority_indicators_reduce_score() {
        let noisy = scan("weekly digest", "newsletter content, unsubscribe anytime");
        assert_eq!(noisy.urgency_score, 0);
        assert!(
            noisy
                .urgency_keywords
                .iter()
                .any(|k| k.starts_with("low_priority_indicator"))
        );
        assert!(!noisy.has_urgency_signal());
    }

    #[test]
    fn negated_action_is_not_action() {
        let result = scan("Weekly FYI", "Summary attached. No action required.");
        assert!(!result.action_required);
        assert_eq!(result.urgency_score, 0);
    }

    #[test]
    fn plain_action_detected() {
        let result = scan("Review", "Could you review this? Action required by the team.");
        assert!(result.action_required);
        assert!(result.question_detected);
    }

    #[test]
    fn complaint_needs_two_keywords_or_literal() {
        let single = scan("service", "I am unhappy with the delay");
        assert!(!single.has(Intent::Complaint));

        let double = scan("service", "I am unhappy and frustrated with the delay");
        assert!(double.has(Intent::Complaint));

        let literal = scan("formal complaint", "details below");
        assert!(literal.has(Intent::Complaint));
    }

    #[test]
    fn follow_up_detected() {
        let result = scan("Re: proposal", "Just checking in — any update on this?");
        assert!(result.is_follow_up);
        assert!(result.question_detected);
    }

    #[test]
    fn academic_intent_carries_bonus() {
        let with = scan("peer review request", "the journal needs your review");
        let without = scan("request", "needs your review");
        assert!(with.has(Intent::Academic));
        assert!(with.urgency_score >= without.urgency_score + 6);
    }

    #[test]
    fn primary_intent_is_first_detected() {
        let result = scan("contract invoice", "the contract and the invoice");
        assert_eq!(result.primary_intent, Some(Intent::Legal));
    }

    #[test]
    fn adding_urgency_keyword_is_monotone() {
        let base = scan("status update request", "please look at this");
        let more = scan("status update request", "please look at this urgent item");
        assert!(more.urgency_score >= base.urgency_score);
    }

    #[test]
    fn adding_low_priority_indicator_is_antitone() {
        let base = scan("notes", "summary of the meeting");
        let less = scan("notes", "summary of the meeting, fyi");
        assert!(less.urgency_score <= base.urgency_score);
    }
}
