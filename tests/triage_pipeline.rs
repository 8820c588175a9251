//! End-to-end pipeline scenarios over mock capabilities.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use inbox_triage::config::TriageConfig;
use inbox_triage::error::{LlmError, MailboxError, NotifyError};
use inbox_triage::llm::LlmClient;
use inbox_triage::mail::{ApprovalStatus, Mailbox, MessageRef, PermissionScope};
use inbox_triage::model::{
    EmailMetadata, EmailStatus, FlagType, PriorityLevel, Severity, UserScope,
};
use inbox_triage::notify::{ChatNotifier, NotifyKind, TaskTracker};
use inbox_triage::output::TriageReport;
use inbox_triage::pipeline::TriagePipeline;

// ── Mock capabilities ───────────────────────────────────────────────

struct MockMailbox {
    messages: Vec<EmailMetadata>,
    scopes: Vec<PermissionScope>,
    draft_counter: AtomicUsize,
}

impl MockMailbox {
    fn new(messages: Vec<EmailMetadata>) -> Arc<Self> {
        Arc::new(Self {
            messages,
            scopes: vec![
                PermissionScope::Read,
                PermissionScope::Compose,
                PermissionScope::Send,
            ],
            draft_counter: AtomicUsize::new(0),
        })
    }

    fn without_send(messages: Vec<EmailMetadata>) -> Arc<Self> {
        Arc::new(Self {
            messages,
            scopes: vec![PermissionScope::Read, PermissionScope::Compose],
            draft_counter: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Mailbox for MockMailbox {
    async fn list(
        &self,
        _query: Option<&str>,
        max_results: usize,
        _time_range_days: u32,
    ) -> Result<Vec<MessageRef>, MailboxError> {
        Ok(self
            .messages
            .iter()
            .take(max_results)
            .enumerate()
            .map(|(i, _)| MessageRef { id: i.to_string() })
            .collect())
    }

    async fn fetch(&self, message: &MessageRef) -> Result<EmailMetadata, MailboxError> {
        let index: usize = message.id.parse().unwrap();
        Ok(self.messages[index].clone())
    }

    async fn create_draft(
        &self,
        _to: &[String],
        _cc: &[String],
        _subject: &str,
        _body: &str,
    ) -> Result<String, MailboxError> {
        let n = self.draft_counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("draft-{n}"))
    }

    async fn send(&self, draft_id: &str, approval: ApprovalStatus) -> Result<(), MailboxError> {
        if approval != ApprovalStatus::Approved {
            return Err(MailboxError::NotApproved {
                draft_id: draft_id.to_string(),
            });
        }
        Ok(())
    }

    fn scopes(&self) -> Vec<PermissionScope> {
        self.scopes.clone()
    }

    fn operator_domain(&self) -> Option<String> {
        Some("company.com".into())
    }
}

struct FixedLlm;

#[async_trait]
impl LlmClient for FixedLlm {
    fn model_name(&self) -> &str {
        "fixed"
    }

    async fn generate(&self, _prompt: &str, _timeout: Duration) -> Result<String, LlmError> {
        Ok("Thanks for reaching out — I will review this and confirm by tomorrow.".into())
    }
}

struct TimingOutLlm;

#[async_trait]
impl LlmClient for TimingOutLlm {
    fn model_name(&self) -> &str {
        "timing-out"
    }

    async fn generate(&self, _prompt: &str, timeout: Duration) -> Result<String, LlmError> {
        Err(LlmError::Timeout {
            provider: "timing-out".into(),
            timeout,
        })
    }
}

#[derive(Default)]
struct CollectingChat {
    events: Mutex<Vec<(NotifyKind, serde_json::Value)>>,
}

#[async_trait]
impl ChatNotifier for CollectingChat {
    async fn notify(
        &self,
        kind: NotifyKind,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push((kind, payload));
        Ok(())
    }
}

#[derive(Default)]
struct CollectingTracker {
    entries: Mutex<Vec<(String, serde_json::Value)>>,
}

#[async_trait]
impl TaskTracker for CollectingTracker {
    async fn log_email(&self, summary: serde_json::Value) -> Result<(), NotifyError> {
        self.entries.lock().unwrap().push(("email".into(), summary));
        Ok(())
    }

    async fn log_batch(&self, summary: serde_json::Value) -> Result<(), NotifyError> {
        self.entries.lock().unwrap().push(("batch".into(), summary));
        Ok(())
    }

    async fn log_escalation(&self, details: serde_json::Value) -> Result<(), NotifyError> {
        self.entries
            .lock()
            .unwrap()
            .push(("escalation".into(), details));
        Ok(())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

fn config() -> Arc<TriageConfig> {
    let mut config = TriageConfig::default();
    config.operator_domain = Some("company.com".into());
    config.allowed_domains = vec!["company.com".into(), "partner.example".into()];
    config.vip_emails.push("ceo@company.com".into());
    Arc::new(config)
}

fn message(id: &str, sender: &str, subject: &str, body: &str, age_minutes: i64) -> EmailMetadata {
    EmailMetadata {
        message_id: id.into(),
        thread_id: None,
        sender: sender.into(),
        subject: subject.into(),
        body: body.into(),
        recipients: vec!["me@company.com".into()],
        cc: vec![],
        date: Some(Utc::now() - ChronoDuration::minutes(age_minutes)),
        has_attachments: false,
    }
}

fn find<'a>(report: &'a TriageReport, id: &str) -> &'a inbox_triage::model::ProcessedEmail {
    report
        .items
        .iter()
        .find(|e| e.metadata.message_id == id)
        .unwrap_or_else(|| panic!("email {id} missing from queue"))
}

// ── Scenario 1: VIP urgent payment ──────────────────────────────────

#[tokio::test]
async fn vip_urgent_payment_is_high_with_external_flag() {
    let mailbox = MockMailbox::new(vec![message(
        "m-vip",
        "cfo@google.com",
        "URGENT: Payment due tomorrow",
        "Please process the transfer by EOD.",
        10,
    )]);
    let pipeline = TriagePipeline::new(config(), mailbox).with_llm(Arc::new(FixedLlm));

    let report = pipeline.run("check inbox", UserScope::default()).await.unwrap();
    let email = find(&report, "m-vip");

    assert_eq!(email.priority_level(), PriorityLevel::High);
    assert!(email.score() >= 83, "got {}", email.score());
    assert!(email.requires_reply);
    assert!(
        email
            .security_flags
            .iter()
            .any(|f| f.flag_type == FlagType::ExternalSender)
    );
    // Finance content at HIGH priority escalates: the reply is a
    // human's to write, so no auto-draft is produced.
    assert!(
        email
            .security_flags
            .iter()
            .any(|f| f.flag_type == FlagType::EscalationRequired)
    );
    assert!(email.draft_reply.is_none());
}

// ── Scenario 2: newsletter noise ────────────────────────────────────

#[tokio::test]
async fn newsletter_is_not_required_and_undrafted() {
    let mailbox = MockMailbox::new(vec![message(
        "m-news",
        "newsletter@marketingco.example",
        "Weekly FYI",
        "Industry roundup. No action required.",
        30,
    )]);
    let pipeline = TriagePipeline::new(config(), mailbox).with_llm(Arc::new(FixedLlm));

    let report = pipeline.run("check inbox", UserScope::default()).await.unwrap();
    let email = find(&report, "m-news");

    assert_eq!(email.priority_level(), PriorityLevel::NotRequired);
    assert!(!email.requires_reply);
    assert!(email.draft_reply.is_none());
}

// ── Scenario 3: conflicting emails from one sender ─────────────────

#[tokio::test]
async fn older_email_superseded_only_newer_drafted() {
    let body = "Can you send the updated figures? Please include Q3.";
    let mailbox = MockMailbox::new(vec![
        message("m-old", "alice@partner.example", "Figures", body, 120),
        message("m-new", "alice@partner.example", "Figures again", body, 1),
    ]);
    let pipeline = TriagePipeline::new(config(), mailbox).with_llm(Arc::new(FixedLlm));

    let report = pipeline.run("check inbox", UserScope::default()).await.unwrap();
    assert_eq!(report.items.len(), 2);

    let older = find(&report, "m-old");
    let newer = find(&report, "m-new");
    assert!(older.draft_reply.is_none());
    assert!(
        older
            .processing_notes
            .iter()
            .any(|n| n.contains("Superseded by a newer email from the same sender"))
    );
    let draft = newer.draft_reply.as_ref().expect("newer email gets the draft");
    assert!(draft.requires_approval);
    assert_eq!(draft.recipients, vec!["alice@partner.example"]);
    assert!(draft.draft_id.is_some());
}

// ── Scenario 4: PII to an external sender ───────────────────────────

#[tokio::test]
async fn pii_with_external_recipient_blocks_sending() {
    let mailbox = MockMailbox::new(vec![message(
        "m-pii",
        "bob@client.example",
        "Urgent: wrong charge?",
        "My card 4111111111111111 was charged twice. Can you fix this?",
        5,
    )]);
    let pipeline = TriagePipeline::new(config(), mailbox).with_llm(Arc::new(FixedLlm));

    let report = pipeline.run("check inbox", UserScope::default()).await.unwrap();
    let email = find(&report, "m-pii");

    assert!(email.has_pii);
    assert!(email.is_blocked);
    assert_eq!(email.status, EmailStatus::ApprovalRequired);
    let risk = email
        .security_flags
        .iter()
        .find(|f| f.flag_type == FlagType::ReplyAllRisk)
        .expect("reply-all risk flag expected");
    assert_eq!(risk.severity, Severity::Critical);
    assert!(risk.blocks_sending);
    assert!(
        email
            .security_flags
            .iter()
            .any(|f| f.flag_type == FlagType::PiiDetected)
    );
}

// ── Scenario 5: legal escalation ────────────────────────────────────

#[tokio::test]
async fn high_priority_legal_escalates_without_draft() {
    let mailbox = MockMailbox::new(vec![message(
        "m-legal",
        "ceo@company.com",
        "Re: Contract",
        "This contract needs your signature urgently. Please review, the deadline is Friday.",
        10,
    )]);
    let chat = Arc::new(CollectingChat::default());
    let pipeline = TriagePipeline::new(config(), mailbox)
        .with_llm(Arc::new(FixedLlm))
        .with_chat(chat.clone());

    let report = pipeline.run("check inbox", UserScope::default()).await.unwrap();
    let email = find(&report, "m-legal");

    assert_eq!(email.priority_level(), PriorityLevel::High);
    assert!(email.draft_reply.is_none());
    assert!(
        email
            .security_flags
            .iter()
            .any(|f| f.flag_type == FlagType::EscalationRequired && f.severity == Severity::High)
    );
    assert_eq!(email.status, EmailStatus::ApprovalRequired);

    let events = chat.events.lock().unwrap();
    let escalation = events
        .iter()
        .find(|(kind, _)| *kind == NotifyKind::Escalation)
        .expect("escalation notification expected");
    assert_eq!(escalation.1["category"], "legal");
    assert_eq!(escalation.1["severity"], "high");
}

// ── Scenario 6: LLM timeout falls back to template ──────────────────

#[tokio::test]
async fn llm_timeout_falls_back_to_question_template() {
    let mailbox = MockMailbox::new(vec![message(
        "m-q",
        "carol@client.example",
        "Login help",
        "I urgently need help: how do I reset my password? Please respond.",
        5,
    )]);
    let pipeline = TriagePipeline::new(config(), mailbox).with_llm(Arc::new(TimingOutLlm));

    let report = pipeline.run("check inbox", UserScope::default()).await.unwrap();
    let email = find(&report, "m-q");

    let draft = email.draft_reply.as_ref().expect("template draft expected");
    assert!(draft.body.contains("I've received your question"));
    assert!(draft.requires_approval);
    assert!(!report.items.is_empty());
}

// ── Spam short-circuit ──────────────────────────────────────────────

#[tokio::test]
async fn spam_is_blocked_without_draft() {
    let mailbox = MockMailbox::new(vec![message(
        "m-spam",
        "win@lucky.example",
        "You have won the lottery",
        "Act now to claim your free prize money!",
        5,
    )]);
    let pipeline = TriagePipeline::new(config(), mailbox).with_llm(Arc::new(FixedLlm));

    let report = pipeline.run("check inbox", UserScope::default()).await.unwrap();
    let email = find(&report, "m-spam");

    assert!(email.is_spam);
    assert_eq!(email.status, EmailStatus::Blocked);
    assert!(email.draft_reply.is_none());
    assert_eq!(report.summary.spam, 1);
}

// ── Permission mode ─────────────────────────────────────────────────

#[tokio::test]
async fn missing_send_scope_labels_batch_draft_only() {
    let mailbox = MockMailbox::without_send(vec![message(
        "m-1",
        "alice@partner.example",
        "Figures",
        "Can you send the updated figures? Please include Q3.",
        5,
    )]);
    let pipeline = TriagePipeline::new(config(), mailbox).with_llm(Arc::new(FixedLlm));

    let report = pipeline.run("check inbox", UserScope::default()).await.unwrap();
    assert_eq!(report.batch_info.mode, "draft_only");
    let email = find(&report, "m-1");
    assert!(email.draft_reply.as_ref().unwrap().requires_approval);
}

// ── Queue ordering (P8) ─────────────────────────────────────────────

#[tokio::test]
async fn queue_is_sorted_by_level_score_date_id() {
    let mailbox = MockMailbox::new(vec![
        message(
            "m-news",
            "newsletter@marketingco.example",
            "Weekly FYI",
            "Roundup. No action required.",
            30,
        ),
        message(
            "m-high",
            "cfo@google.com",
            "URGENT: Payment due tomorrow",
            "Process by EOD please.",
            10,
        ),
        message(
            "m-mid",
            "alice@partner.example",
            "Figures",
            "Can you send the updated figures? Please include Q3.",
            15,
        ),
    ]);
    let pipeline = TriagePipeline::new(config(), mailbox).with_llm(Arc::new(FixedLlm));

    let report = pipeline.run("check inbox", UserScope::default()).await.unwrap();
    for pair in report.items.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let ordered = (b.priority_level().rank(), b.score())
            <= (a.priority_level().rank(), a.score());
        assert!(ordered, "queue out of order: {:?}", report.top_10_emails);
    }
    assert_eq!(report.items[0].metadata.message_id, "m-high");
}

// ── Determinism (P1) ────────────────────────────────────────────────

#[tokio::test]
async fn identical_runs_produce_identical_queues() {
    let messages = vec![
        message(
            "m-a",
            "cfo@google.com",
            "URGENT: Payment due tomorrow",
            "Process by EOD please.",
            10,
        ),
        message(
            "m-b",
            "alice@partner.example",
            "Figures",
            "Can you send the updated figures? Please include Q3.",
            15,
        ),
        message(
            "m-c",
            "newsletter@marketingco.example",
            "Weekly FYI",
            "Roundup. No action required.",
            30,
        ),
    ];

    let fingerprint = |report: &TriageReport| -> Vec<(String, u8, PriorityLevel, EmailStatus)> {
        report
            .items
            .iter()
            .map(|e| {
                (
                    e.metadata.message_id.clone(),
                    e.score(),
                    e.priority_level(),
                    e.status,
                )
            })
            .collect()
    };

    let first = TriagePipeline::new(config(), MockMailbox::new(messages.clone()))
        .with_llm(Arc::new(FixedLlm))
        .run("check inbox", UserScope::default())
        .await
        .unwrap();
    let second = TriagePipeline::new(config(), MockMailbox::new(messages))
        .with_llm(Arc::new(FixedLlm))
        .run("check inbox", UserScope::default())
        .await
        .unwrap();

    assert_eq!(fingerprint(&first), fingerprint(&second));
    assert_ne!(first.batch_id, second.batch_id);
}

// ── Duplicate message ids (I1) ──────────────────────────────────────

#[tokio::test]
async fn duplicate_message_ids_recorded_and_skipped() {
    let duplicate = message(
        "m-dup",
        "alice@partner.example",
        "Figures",
        "Can you send the figures? Please.",
        5,
    );
    let mailbox = MockMailbox::new(vec![duplicate.clone(), duplicate]);
    let pipeline = TriagePipeline::new(config(), mailbox).with_llm(Arc::new(FixedLlm));

    let report = pipeline.run("check inbox", UserScope::default()).await.unwrap();
    assert_eq!(report.items.len(), 1);
    assert!(
        report
            .batch_info
            .errors
            .iter()
            .any(|e| e.contains("duplicate message id"))
    );
}

// ── Notifications ───────────────────────────────────────────────────

#[tokio::test]
async fn chat_gets_urgent_vip_and_summary_events() {
    let mailbox = MockMailbox::new(vec![message(
        "m-vip",
        "cfo@google.com",
        "URGENT: Payment due tomorrow",
        "Process by EOD please.",
        10,
    )]);
    let chat = Arc::new(CollectingChat::default());
    let tracker = Arc::new(CollectingTracker::default());
    let pipeline = TriagePipeline::new(config(), mailbox)
        .with_llm(Arc::new(FixedLlm))
        .with_chat(chat.clone())
        .with_tracker(tracker.clone());

    pipeline.run("check inbox", UserScope::default()).await.unwrap();

    let events = chat.events.lock().unwrap();
    let kinds: Vec<NotifyKind> = events.iter().map(|(k, _)| *k).collect();
    assert!(kinds.contains(&NotifyKind::Urgent));
    assert!(kinds.contains(&NotifyKind::Vip));
    assert!(kinds.contains(&NotifyKind::BatchSummary));

    let entries = tracker.entries.lock().unwrap();
    assert!(entries.iter().any(|(kind, _)| kind == "batch"));
    assert!(entries.iter().any(|(kind, _)| kind == "email"));
    // Finance at HIGH priority escalates, so the tracker sees it too.
    assert!(entries.iter().any(|(kind, _)| kind == "escalation"));
}

// ── Scope limits ────────────────────────────────────────────────────

#[tokio::test]
async fn max_results_caps_ingestion() {
    let messages: Vec<EmailMetadata> = (0..8)
        .map(|i| {
            message(
                &format!("m-{i}"),
                "alice@partner.example",
                &format!("Topic {i}"),
                "Short note.",
                5 + i,
            )
        })
        .collect();
    let mailbox = MockMailbox::new(messages);
    let pipeline = TriagePipeline::new(config(), mailbox).with_llm(Arc::new(FixedLlm));

    let scope = UserScope {
        query: None,
        max_results: 3,
        time_range_days: 7,
    };
    let report = pipeline.run("check inbox", scope).await.unwrap();
    assert_eq!(report.items.len(), 3);
    assert_eq!(report.batch_info.user_scope.max_results, 3);
}
