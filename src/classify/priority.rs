//! Composite priority scoring.
//!
//! Six factors, each with its own cap, summed then clamped to [0, 100].
//! Deterministic: for fixed config, identical inputs yield identical
//! output — the only clock is the injected `now`.

use chrono::{DateTime, Duration, Utc};

use crate::config::TriageConfig;
use crate::model::{
    EmailMetadata, FactorContribution, Intent, IntentDetection, PriorityLevel, PriorityScore,
    SenderClassification, SenderType,
};

/// Urgency score at or above this floors the total to MEDIUM minimum.
const URGENCY_FLOOR_TRIGGER: i32 = 15;
const URGENCY_FLOOR_SCORE: i32 = 50;

/// Sender factor floor when a complaint is present.
const COMPLAINT_SENDER_FLOOR: i32 = 25;

/// Sender factor cap for quiet emails (no urgency signal, no action,
/// no complaint, no invitation).
const QUIET_SENDER_CAP: i32 = 20;

pub struct PriorityScorer<'a> {
    config: &'a TriageConfig,
}

impl<'a> PriorityScorer<'a> {
    pub fn new(config: &'a TriageConfig) -> Self {
        Self { config }
    }

    pub fn score(
        &self,
        metadata: &EmailMetadata,
        classification: &SenderClassification,
        intent: &IntentDetection,
        now: DateTime<Utc>,
    ) -> PriorityScore {
        let factors = vec![
            FactorContribution {
                name: "sender_importance".into(),
                points: score_sender(classification, intent),
            },
            FactorContribution {
                name: "urgency".into(),
                points: intent.urgency_score.min(20),
            },
            FactorContribution {
                name: "action".into(),
                points: score_action(intent),
            },
            FactorContribution {
                name: "age".into(),
                points: score_age(metadata.date, now),
            },
            FactorContribution {
                name: "thread".into(),
                points: score_thread(metadata),
            },
            FactorContribution {
                name: "category".into(),
                points: score_category(intent),
            },
        ];

        let mut total: i32 = factors.iter().map(|f| f.points).sum();

        if intent.urgency_score >= URGENCY_FLOOR_TRIGGER {
            total = total.max(URGENCY_FLOOR_SCORE);
        }

        let score = total.clamp(0, 100) as u8;
        let priority_level = self.level(score);
        let reasoning = build_reasoning(score, priority_level, &factors);

        PriorityScore {
            score,
            priority_level,
            factors,
            reasoning,
        }
    }

    /// Step function over the configured threshold table — the single
    /// source of truth for levels.
    pub fn level(&self, score: u8) -> PriorityLevel {
        let t = self.config.thresholds;
        if score >= t.high {
            PriorityLevel::High
        } else if score >= t.medium {
            PriorityLevel::Medium
        } else if score >= t.low {
            PriorityLevel::Low
        } else {
            PriorityLevel::NotRequired
        }
    }
}

/// Sender importance, 0–40.
fn score_sender(classification: &SenderClassification, intent: &IntentDetection) -> i32 {
    let mut score = match classification.sender_type {
        SenderType::Vip => 40,
        SenderType::Team => 30,
        SenderType::Customer => 25,
        SenderType::Vendor => 15,
        SenderType::Unknown => 5,
        SenderType::Spam => 0,
    };

    let complaint = intent.has(Intent::Complaint);
    if complaint {
        score = score.max(COMPLAINT_SENDER_FLOOR);
    }
    if !intent.has_urgency_signal()
        && !intent.action_required
        && !complaint
        && !intent.has(Intent::Invitation)
    {
        score = score.min(QUIET_SENDER_CAP);
    }
    score
}

/// Action/question/follow-up, 0–15.
fn score_action(intent: &IntentDetection) -> i32 {
    let mut score = 0;
    if intent.action_required {
        score += 8;
    }
    if intent.question_detected {
        score += 4;
    }
    if intent.action_required && intent.question_detected {
        score += 3;
    }
    if intent.is_follow_up {
        score += 3;
    }
    score.min(15)
}

/// Email age, 0–10 — newer scores higher. Missing date scores zero.
fn score_age(date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i32 {
    let Some(date) = date else { return 0 };
    let age = now.signed_duration_since(date).max(Duration::zero());
    if age < Duration::hours(1) {
        10
    } else if age < Duration::hours(4) {
        8
    } else if age < Duration::hours(24) {
        5
    } else if age < Duration::days(3) {
        2
    } else {
        0
    }
}

/// Thread context, 0–10.
fn score_thread(metadata: &EmailMetadata) -> i32 {
    let mut score = 0;
    if metadata.subject.to_lowercase().starts_with("re:") {
        score += 5;
    }
    if !metadata.recipients.is_empty() {
        score += 3;
    }
    if metadata.has_attachments {
        score += 2;
    }
    score.min(10)
}

/// Special category, 0–15, first match wins in priority order.
fn score_category(intent: &IntentDetection) -> i32 {
    const ORDER: [(Intent, i32); 7] = [
        (Intent::Complaint, 15),
        (Intent::Invitation, 15),
        (Intent::Legal, 5),
        (Intent::Finance, 5),
        (Intent::It, 5),
        (Intent::Hr, 5),
        (Intent::Meeting, 3),
    ];
    ORDER
        .iter()
        .find(|(intent_kind, _)| intent.has(*intent_kind))
        .map(|(_, points)| *points)
        .unwrap_or(0)
}

/// Top three nonzero factors by contribution; ties break on the fixed
/// factor order.
fn build_reasoning(score: u8, level: PriorityLevel, factors: &[FactorContribution]) -> String {
    let mut contributing: Vec<&FactorContribution> =
        factors.iter().filter(|f| f.points != 0).collect();
    contributing.sort_by_key(|f| std::cmp::Reverse(f.points));

    let reasons: Vec<String> = contributing
        .iter()
        .take(3)
        .map(|f| format!("{} (+{})", describe_factor(&f.name), f.points))
        .collect();

    if reasons.is_empty() {
        format!("Priority: {} ({score}/100) - no contributing factors", level.label())
    } else {
        format!(
            "Priority: {} ({score}/100) - {}",
            level.label(),
            reasons.join(", ")
        )
    }
}

fn describe_factor(name: &str) -> &'static str {
    match name {
        "sender_importance" => "important sender",
        "urgency" => "urgent keywords",
        "action" => "action needed",
        "age" => "recent email",
        "thread" => "active thread",
        "category" => "priority category",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{IntentScanner, SenderClassifier};

    fn metadata(sender: &str, subject: &str, body: &str) -> EmailMetadata {
        EmailMetadata {
            message_id: "m-1".into(),
            thread_id: None,
            sender: sender.into(),
            subject: subject.into(),
            body: body.into(),
            recipients: vec!["me@company.com".into()],
            cc: vec![],
            date: Some(Utc::now() - Duration::minutes(10)),
            has_attachments: false,
        }
    }

    fn score_email(config: &TriageConfig, metadata: &EmailMetadata) -> PriorityScore {
        let classification = SenderClassifier::new(config).classify(metadata);
        let intent = IntentScanner::new(config).scan(&metadata.subject, &metadata.body);
        PriorityScorer::new(config).score(metadata, &classification, &intent, Utc::now())
    }

    #[test]
    fn vip_urgent_payment_scores_high() {
        // VIP sender, urgent subject, deadline in the body, received
        // minutes ago.
        let config = TriageConfig::default();
        let metadata = metadata(
            "cfo@google.com",
            "URGENT: Payment due tomorrow",
            "Please process the transfer by EOD.",
        );
        let result = score_email(&config, &metadata);
        assert!(result.score >= 83, "got {}", result.score);
        assert_eq!(result.priority_level, PriorityLevel::High);
    }

    #[test]
    fn newsletter_scores_not_required() {
        let config = TriageConfig::default();
        let metadata = metadata(
            "newsletter@marketingco.example",
            "Weekly FYI",
            "Industry roundup. No action required.",
        );
        let result = score_email(&config, &metadata);
        assert_eq!(result.priority_level, PriorityLevel::NotRequired);
    }

    #[test]
    fn quiet_email_sender_capped_at_20() {
        let classification = SenderClassification {
            sender_type: SenderType::Team,
            is_vip: false,
            is_internal: true,
            domain: "company.com".into(),
            confidence: 0.8,
            notes: String::new(),
        };
        let intent = IntentDetection::default();
        assert_eq!(score_sender(&classification, &intent), 20);
    }

    #[test]
    fn complaint_floors_sender_at_25() {
        let classification = SenderClassification {
            sender_type: SenderType::Unknown,
            is_vip: false,
            is_internal: false,
            domain: "x.example".into(),
            confidence: 0.2,
            notes: String::new(),
        };
        let intent = IntentDetection {
            intents: vec![Intent::Complaint],
            ..Default::default()
        };
        assert_eq!(score_sender(&classification, &intent), 25);
    }

    #[test]
    fn urgency_factor_capped_at_20() {
        let intent = IntentDetection {
            urgency_score: 40,
            urgency_keywords: vec!["urgent".into()],
            ..Default::default()
        };
        assert_eq!(intent.urgency_score.min(20), 20);
    }

    #[test]
    fn action_factor_combination() {
        let intent = IntentDetection {
            action_required: true,
            question_detected: true,
            is_follow_up: true,
            ..Default::default()
        };
        // 8 + 4 + 3 + 3 = 18, capped at 15.
        assert_eq!(score_action(&intent), 15);
    }

    #[test]
    fn age_buckets() {
        let now = Utc::now();
        assert_eq!(score_age(Some(now - Duration::minutes(30)), now), 10);
        assert_eq!(score_age(Some(now - Duration::hours(2)), now), 8);
        assert_eq!(score_age(Some(now - Duration::hours(12)), now), 5);
        assert_eq!(score_age(Some(now - Duration::days(2)), now), 2);
        assert_eq!(score_age(Some(now - Duration::days(10)), now), 0);
        assert_eq!(score_age(None, now), 0);
    }

    #[test]
    fn thread_factor() {
        let mut m = metadata("a@b.example", "Re: contract", "x");
        m.has_attachments = true;
        // re: +5, recipients +3, attachments +2
        assert_eq!(score_thread(&m), 10);
        m.subject = "contract".into();
        assert_eq!(score_thread(&m), 5);
    }

    #[test]
    fn category_first_match_wins() {
        let intent = IntentDetection {
            intents: vec![Intent::Meeting, Intent::Legal, Intent::Complaint],
            ..Default::default()
        };
        assert_eq!(score_category(&intent), 15); // complaint outranks the rest
        let intent = IntentDetection {
            intents: vec![Intent::Meeting, Intent::Finance],
            ..Default::default()
        };
        assert_eq!(score_category(&intent), 5);
    }

    #[test]
    fn urgency_floor_pushes_to_medium() {
        let config = TriageConfig::default();
        let classification = SenderClassification {
            sender_type: SenderType::Unknown,
            is_vip: false,
            is_internal: false,
            domain: "x.example".into(),
            confidence: 0.2,
            notes: String::new(),
        };
        let intent = IntentDetection {
            urgency_score: 16,
            urgency_keywords: vec!["urgent".into()],
            ..Default::default()
        };
        let m = EmailMetadata {
            message_id: "m".into(),
            thread_id: None,
            sender: "x@x.example".into(),
            subject: "x".into(),
            body: "x".into(),
            recipients: vec![],
            cc: vec![],
            date: None,
            has_attachments: false,
        };
        let result = PriorityScorer::new(&config).score(&m, &classification, &intent, Utc::now());
        assert!(result.score >= 50);
        assert_eq!(result.priority_level, PriorityLevel::Medium);
    }

    #[test]
    fn level_step_function_over_full_range() {
        // Threshold consistency across every score in [0, 100].
        let config = TriageConfig::default();
        let scorer = PriorityScorer::new(&config);
        for score in 0u8..=100 {
            let expected = if score >= 70 {
                PriorityLevel::High
            } else if score >= 50 {
                PriorityLevel::Medium
            } else if score >= 30 {
                PriorityLevel::Low
            } else {
                PriorityLevel::NotRequired
            };
            assert_eq!(scorer.level(score), expected, "score {score}");
        }
    }

    #[test]
    fn reasoning_lists_only_nonzero_factors() {
        let config = TriageConfig::default();
        let m = metadata("cfo@google.com", "URGENT: outage", "production down right now");
        let result = score_email(&config, &m);
        assert!(result.reasoning.starts_with(&format!(
            "Priority: {} ({}/100) - ",
            result.priority_level.label(),
            result.score
        )));
        for factor in result.factors.iter().filter(|f| f.points == 0) {
            assert!(
                !result.reasoning.contains(describe_factor(&factor.name)),
                "zero factor {} leaked into reasoning",
                factor.name
            );
        }
    }

    #[test]
    fn deterministic_for_fixed_now() {
        let config = TriageConfig::default();
        let m = metadata("cfo@google.com", "URGENT: Payment due tomorrow", "by EOD");
        let now = Utc::now();
        let classification = SenderClassifier::new(&config).classify(&m);
        let intent = IntentScanner::new(&config).scan(&m.subject, &m.body);
        let a = PriorityScorer::new(&config).score(&m, &classification, &intent, now);
        let b = PriorityScorer::new(&config).score(&m, &classification, &intent, now);
        assert_eq!(a.score, b.score);
        assert_eq!(a.reasoning, b.reasoning);
    }
}
