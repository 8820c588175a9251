//! Batch orchestration: ingest → classify → resolve → draft →
//! guardrails → queue + metrics → notify.
//!
//! Per-email classification is pure and fans out over a bounded worker
//! pool; results rejoin in ingestion order so reasoning and metrics are
//! reproducible. Conflict resolution and queue assembly are barriers.
//! Drafting is bounded separately and honors the per-batch deadline.
//! Notifiers run last, concurrently, best-effort.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::future::{BoxFuture, join_all};
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::classify::{Categorizer, IntentScanner, PriorityScorer, SenderClassifier, SpamFilter};
use crate::config::TriageConfig;
use crate::error::{MailboxError, Result, TriageError};
use crate::guardrails::{DomainChecker, PiiDetector, ReplyAllChecker, ToneEnforcer};
use crate::llm::LlmClient;
use crate::mail::{Mailbox, PermissionScope};
use crate::memory::{NoopMemory, VectorMemory};
use crate::model::{
    EmailCategory, EmailMetadata, EmailStatus, FlagType, IntentDetection, PriorityLevel,
    PriorityScore, ProcessedEmail, ProcessingBatch, SecurityFlag, SenderClassification, Severity,
    UserScope,
};
use crate::notify::{ChatNotifier, NotifyKind, TaskTracker};
use crate::output::{TriageReport, build_report, sort_queue};
use crate::pipeline::clarify::ClarificationDetector;
use crate::pipeline::drafter::{DraftSource, Drafter};
use crate::pipeline::edge::{EdgeResolver, EscalationEvent};
use crate::retry::with_backoff;

/// Ingestion retry policy.
const INGEST_ATTEMPTS: u32 = 3;
const INGEST_BASE_DELAY: Duration = Duration::from_millis(500);

pub struct TriagePipeline {
    config: Arc<TriageConfig>,
    mailbox: Arc<dyn Mailbox>,
    llm: Option<Arc<dyn LlmClient>>,
    chat: Option<Arc<dyn ChatNotifier>>,
    tracker: Option<Arc<dyn TaskTracker>>,
    memory: Arc<dyn VectorMemory>,
}

impl TriagePipeline {
    pub fn new(config: Arc<TriageConfig>, mailbox: Arc<dyn Mailbox>) -> Self {
        Self {
            config,
            mailbox,
            llm: None,
            chat: None,
            tracker: None,
            memory: Arc::new(NoopMemory),
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_chat(mut self, chat: Arc<dyn ChatNotifier>) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn TaskTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn VectorMemory>) -> Self {
        self.memory = memory;
        self
    }

    /// Run one triage batch over the user's scope.
    ///
    /// Per-email failures never abort the batch; ingestion failure
    /// aborts with a structured error.
    pub async fn run(&self, user_command: &str, scope: UserScope) -> Result<TriageReport> {
        let now = Utc::now();
        let deadline = Instant::now() + Duration::from_secs(self.config.batch_deadline_secs);
        let config = self.effective_config();

        let mut batch = ProcessingBatch::new(user_command, scope.clone(), now);
        info!(batch_id = %batch.batch_id, command = user_command, "Starting triage batch");

        // ── Ingest ──────────────────────────────────────────────────
        let mut emails = self.ingest(&scope, &mut batch).await?;
        batch.total_processed = emails.len();
        info!(count = emails.len(), "Ingested messages");

        // ── Per-email pure stages, ingestion order preserved ────────
        self.classify_all(&config, &mut emails, now, &mut batch).await;

        // ── Batch barriers: conflicts and escalations ───────────────
        let resolver = EdgeResolver::new(&config);
        resolver.resolve_conflicts(&mut emails);
        let escalations = resolver.resolve_escalations(&mut emails);

        let scopes = self.mailbox.scopes();
        let can_send = scopes.contains(&PermissionScope::Send);
        let can_compose = scopes.contains(&PermissionScope::Compose);

        // ── Drafting ────────────────────────────────────────────────
        self.draft_all(&mut emails, deadline, now, can_compose).await;

        // ── Guardrails, DND, permission mode, status ────────────────
        self.apply_guardrails(&config, &mut emails, now);
        let mode = resolver.permission_mode(can_send, &mut emails);
        for email in emails.iter_mut() {
            if !email.is_spam {
                resolver.resolve_status(email);
            }
        }

        // ── Queue assembly ──────────────────────────────────────────
        sort_queue(&mut emails);
        batch.emails = emails;
        batch.completed_at = Some(Utc::now());
        let report = build_report(batch, mode.label());

        // ── Best-effort notifications ───────────────────────────────
        self.emit_notifications(&report, &escalations).await;

        info!(
            batch_id = %report.batch_id,
            total = report.metrics.total_emails,
            high = report.summary.by_level.high,
            drafts = report.summary.drafts_created,
            blocked = report.summary.blocked,
            "Batch complete"
        );
        Ok(report)
    }

    /// TEAM classification needs the operator's domain; fall back to
    /// the authenticated account when config doesn't pin one.
    fn effective_config(&self) -> Arc<TriageConfig> {
        if self.config.operator_domain.is_some() {
            return Arc::clone(&self.config);
        }
        match self.mailbox.operator_domain() {
            Some(domain) => {
                let mut config = (*self.config).clone();
                config.operator_domain = Some(domain);
                Arc::new(config)
            }
            None => Arc::clone(&self.config),
        }
    }

    async fn ingest(
        &self,
        scope: &UserScope,
        batch: &mut ProcessingBatch,
    ) -> Result<Vec<ProcessedEmail>> {
        let refs = with_backoff(
            "mailbox.list",
            INGEST_ATTEMPTS,
            INGEST_BASE_DELAY,
            MailboxError::is_transient,
            || {
                self.mailbox
                    .list(scope.query.as_deref(), scope.max_results, scope.time_range_days)
            },
        )
        .await
        .map_err(|e| TriageError::Ingestion(e.to_string()))?;

        let mut emails = Vec::with_capacity(refs.len());
        let mut seen_ids: HashSet<String> = HashSet::new();

        for message in &refs {
            let fetched = with_backoff(
                "mailbox.fetch",
                INGEST_ATTEMPTS,
                INGEST_BASE_DELAY,
                MailboxError::is_transient,
                || self.mailbox.fetch(message),
            )
            .await;

            match fetched {
                Ok(metadata) => {
                    if !seen_ids.insert(metadata.message_id.clone()) {
                        debug!(message_id = %metadata.message_id, "Duplicate message id skipped");
                        batch
                            .errors
                            .push(format!("duplicate message id: {}", metadata.message_id));
                        continue;
                    }
                    let mut email = ProcessedEmail::new(metadata);
                    email.status = EmailStatus::Processing;
                    emails.push(email);
                }
                Err(e) => {
                    // Parse/fetch failures skip the message, never the batch.
                    warn!(id = %message.id, error = %e, "Skipping unreadable message");
                    batch.errors.push(format!("{}: {e}", message.id));
                }
            }
        }
        Ok(emails)
    }

    /// Fan the pure stages out over a bounded pool; rejoin in order.
    async fn classify_all(
        &self,
        config: &Arc<TriageConfig>,
        emails: &mut [ProcessedEmail],
        now: DateTime<Utc>,
        batch: &mut ProcessingBatch,
    ) {
        let jobs: Vec<(usize, EmailMetadata)> = emails
            .iter()
            .enumerate()
            .map(|(i, e)| (i, e.metadata.clone()))
            .collect();

        let outputs: Vec<(usize, std::result::Result<StageOutputs, tokio::task::JoinError>)> =
            futures::stream::iter(jobs.into_iter().map(|(i, metadata)| {
                let config = Arc::clone(config);
                async move {
                    let result = tokio::task::spawn_blocking(move || {
                        classify_metadata(&config, &metadata, now)
                    })
                    .await;
                    (i, result)
                }
            }))
            .buffered(self.config.classify_workers)
            .collect()
            .await;

        for (i, result) in outputs {
            let email = &mut emails[i];
            match result {
                Ok(outputs) => outputs.apply(email),
                Err(e) => {
                    error!(message_id = %email.metadata.message_id, error = %e, "Classification worker failed");
                    email.is_blocked = true;
                    email.status = EmailStatus::Blocked;
                    email.note(format!("classification failed: {e}"));
                    batch
                        .errors
                        .push(format!("{}: classification failed", email.metadata.message_id));
                }
            }
        }
    }

    /// Draft replies for eligible emails with bounded concurrency and
    /// the batch deadline as a hard budget.
    async fn draft_all(
        &self,
        emails: &mut [ProcessedEmail],
        deadline: Instant,
        now: DateTime<Utc>,
        can_compose: bool,
    ) {
        let drafter = Drafter::new(
            self.llm.clone(),
            Arc::clone(&self.memory),
            Duration::from_secs(self.config.llm_timeout_secs),
        );
        let drafter = &drafter;

        let jobs: Vec<(usize, ProcessedEmail)> = emails
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                e.requires_reply
                    && !e.is_blocked
                    && !e.is_spam
                    && !e
                        .security_flags
                        .iter()
                        .any(|f| f.flag_type == FlagType::EscalationRequired)
            })
            .map(|(i, e)| (i, e.clone()))
            .collect();

        let drafted: Vec<(usize, (crate::model::DraftReply, DraftSource))> =
            futures::stream::iter(jobs.into_iter().map(|(i, email)| async move {
                let budget = deadline.saturating_duration_since(Instant::now());
                let outcome = drafter.draft(&email, budget, now).await;
                (i, outcome)
            }))
            .buffered(self.config.draft_concurrency)
            .collect()
            .await;

        for (i, (mut reply, source)) in drafted {
            let email = &mut emails[i];
            email.note(match source {
                DraftSource::Llm => "Draft generated by LLM",
                DraftSource::Template => "Draft generated from template",
            });

            // Persist the draft; failure is logged and swallowed.
            if can_compose {
                match self
                    .mailbox
                    .create_draft(&reply.recipients, &reply.cc, &reply.subject, &reply.body)
                    .await
                {
                    Ok(draft_id) => reply.draft_id = Some(draft_id),
                    Err(e) => {
                        warn!(
                            message_id = %email.metadata.message_id,
                            error = %e,
                            "Draft persistence failed"
                        );
                        email.note("Draft persistence failed; draft kept locally");
                    }
                }
            }
            email.draft_reply = Some(reply);
        }
    }

    /// C6 runs after drafting because tone and reply-all read the
    /// draft.
    fn apply_guardrails(
        &self,
        config: &Arc<TriageConfig>,
        emails: &mut [ProcessedEmail],
        now: DateTime<Utc>,
    ) {
        let pii = PiiDetector::new();
        let tone = ToneEnforcer::new();
        let resolver = EdgeResolver::new(config);

        for email in emails.iter_mut() {
            if email.is_spam {
                continue;
            }
            let domains = DomainChecker::new(config);

            // PII over body and draft.
            let mut scan_text = email.metadata.body.clone();
            if let Some(draft) = &email.draft_reply {
                scan_text.push('\n');
                scan_text.push_str(&draft.body);
            }
            let kinds = pii.detect(&scan_text);
            if !kinds.is_empty() {
                let labels: Vec<&str> = kinds.iter().map(|k| k.label()).collect();
                email.add_flag(
                    SecurityFlag::new(
                        FlagType::PiiDetected,
                        Severity::High,
                        format!("PII detected: {}", labels.join(", ")),
                    )
                    .with_details(json!({ "kinds": labels })),
                );
            }

            if let Some(flag) = domains.external_sender_flag(&email.metadata.sender) {
                email.add_flag(flag);
            }

            if let Some(draft) = &email.draft_reply {
                let recipients = draft.recipients.clone();
                let cc = draft.cc.clone();
                let body = draft.body.clone();

                if let Some(flag) =
                    domains.check_draft_recipients(&recipients, &cc, email.category, email.has_pii)
                {
                    email.add_flag(flag);
                }

                let (approved, issues) = tone.check(&body);
                if !approved {
                    email.add_flag(
                        SecurityFlag::new(
                            FlagType::ToneViolation,
                            Severity::Medium,
                            format!("tone check failed: {}", issues.join("; ")),
                        )
                        .with_details(json!({ "issues": issues }))
                        .blocking(),
                    );
                }
            }

            ReplyAllChecker::new(DomainChecker::new(config)).apply(email);

            if email.clarification_request.is_none()
                && let Some(request) = ClarificationDetector::check(email)
            {
                email.note("Clarification required before approval");
                email.clarification_request = Some(request);
                if let Some(draft) = email.draft_reply.as_mut() {
                    draft.requires_approval = true;
                }
            }

            resolver.apply_dnd(email, now);
        }
    }

    /// Fire-and-wait with individual error swallowing. Notifier
    /// failures must never affect the batch result.
    async fn emit_notifications(&self, report: &TriageReport, escalations: &[EscalationEvent]) {
        let mut tasks: Vec<BoxFuture<'_, ()>> = Vec::new();

        if let Some(chat) = &self.chat {
            for item in &report.top_10_emails {
                if item.priority_level == PriorityLevel::High {
                    let payload = json!({
                        "subject": item.subject,
                        "sender": item.sender,
                        "score": item.score,
                        "reason": item.reasoning,
                    });
                    tasks.push(Box::pin(notify_quietly(chat, NotifyKind::Urgent, payload)));
                }
            }
            for event in escalations {
                let payload = json!({
                    "subject": event.subject,
                    "category": event.category,
                    "severity": "high",
                });
                tasks.push(Box::pin(notify_quietly(chat, NotifyKind::Escalation, payload)));
            }
            for item in report.items.iter().filter(|e| {
                e.classification.as_ref().is_some_and(|c| c.is_vip)
                    && e.priority_level() != PriorityLevel::NotRequired
                    && !e.is_spam
            }) {
                let payload = json!({
                    "subject": item.metadata.subject,
                    "sender": item.metadata.sender,
                    "score": item.score(),
                });
                tasks.push(Box::pin(notify_quietly(chat, NotifyKind::Vip, payload)));
            }
            if !report.clarifications.is_empty() {
                let payload = json!({
                    "total": report.clarifications.len(),
                    "subject": report.clarifications[0].subject,
                });
                tasks.push(Box::pin(notify_quietly(
                    chat,
                    NotifyKind::Clarification,
                    payload,
                )));
            }
            let summary = json!({
                "total": report.metrics.total_emails,
                "drafts_created": report.summary.drafts_created,
                "blocked": report.summary.blocked,
            });
            tasks.push(Box::pin(notify_quietly(
                chat,
                NotifyKind::BatchSummary,
                summary,
            )));
        }

        if let Some(tracker) = &self.tracker {
            let batch_summary = json!({
                "batch_id": report.batch_id.to_string(),
                "total": report.metrics.total_emails,
                "high": report.summary.by_level.high,
                "drafts": report.summary.drafts_created,
            });
            tasks.push(Box::pin(async move {
                if let Err(e) = tracker.log_batch(batch_summary).await {
                    warn!(error = %e, "Tracker log_batch failed");
                }
            }));
            for item in &report.top_10_emails {
                if item.priority_level != PriorityLevel::High {
                    continue;
                }
                let summary = json!({
                    "subject": item.subject,
                    "sender": item.sender,
                    "score": item.score,
                    "reasoning": item.reasoning,
                });
                tasks.push(Box::pin(async move {
                    if let Err(e) = tracker.log_email(summary).await {
                        warn!(error = %e, "Tracker log_email failed");
                    }
                }));
            }
            for event in escalations {
                let details = json!({
                    "subject": event.subject,
                    "message_id": event.message_id,
                    "category": event.category,
                });
                tasks.push(Box::pin(async move {
                    if let Err(e) = tracker.log_escalation(details).await {
                        warn!(error = %e, "Tracker log_escalation failed");
                    }
                }));
            }
        }

        join_all(tasks).await;
    }
}

async fn notify_quietly(
    chat: &Arc<dyn ChatNotifier>,
    kind: NotifyKind,
    payload: serde_json::Value,
) {
    if let Err(e) = chat.notify(kind, payload).await {
        warn!(kind = kind.label(), error = %e, "Chat notification failed");
    }
}

// ── Pure per-email stage composition ────────────────────────────────

/// Outputs of the pure stages C2 → C3 → C5 → C4 for one email.
struct StageOutputs {
    classification: SenderClassification,
    intent: IntentDetection,
    spam_reason: Option<String>,
    category: EmailCategory,
    priority: Option<PriorityScore>,
    requires_reply: bool,
}

impl StageOutputs {
    fn apply(self, email: &mut ProcessedEmail) {
        email.classification = Some(self.classification);
        email.intent = Some(self.intent);
        email.category = self.category;
        match self.spam_reason {
            Some(reason) => {
                email.is_spam = true;
                email.is_blocked = true;
                email.status = EmailStatus::Blocked;
                email.requires_reply = false;
                email.note(format!("Blocked as spam: {reason}"));
            }
            None => {
                email.priority = self.priority;
                email.requires_reply = self.requires_reply;
            }
        }
    }
}

/// Strict per-email stage order: sender → intent → spam/category →
/// priority. Spam short-circuits scoring.
fn classify_metadata(
    config: &TriageConfig,
    metadata: &EmailMetadata,
    now: DateTime<Utc>,
) -> StageOutputs {
    let classification = SenderClassifier::new(config).classify(metadata);
    let intent = IntentScanner::new(config).scan(&metadata.subject, &metadata.body);
    let spam_reason = SpamFilter::new(config).check(metadata, &classification);
    let is_spam = spam_reason.is_some();
    let category = Categorizer::categorize(&intent, is_spam);

    let priority = (!is_spam)
        .then(|| PriorityScorer::new(config).score(metadata, &classification, &intent, now));

    let requires_reply = priority.as_ref().is_some_and(|p| match p.priority_level {
        PriorityLevel::High | PriorityLevel::Medium => true,
        PriorityLevel::Low => intent.action_required || intent.question_detected,
        PriorityLevel::NotRequired => false,
    });

    StageOutputs {
        classification,
        intent,
        spam_reason,
        category,
        priority,
        requires_reply,
    }
}
