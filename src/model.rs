//! Data model for the triage pipeline.
//!
//! A [`ProcessedEmail`] is created at ingestion and mutated only by the
//! pipeline stages in their declared order; it is frozen when the batch
//! completes. [`ProcessingBatch`] is short-lived — one per invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Ingested message ────────────────────────────────────────────────

/// Immutable message metadata, fixed at ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMetadata {
    /// Unique message ID (RFC5322 Message-ID or generated).
    pub message_id: String,
    /// Thread/conversation ID, when the mailbox provides one.
    pub thread_id: Option<String>,
    /// Sender address.
    pub sender: String,
    /// Subject line (may be empty).
    pub subject: String,
    /// Plain-text body (may be empty).
    pub body: String,
    /// To: addresses, in header order.
    pub recipients: Vec<String>,
    /// Cc: addresses.
    pub cc: Vec<String>,
    /// Date header as an absolute instant. None if the header was
    /// missing or unparseable — the age factor then scores zero.
    pub date: Option<DateTime<Utc>>,
    /// Whether the message carries attachments.
    pub has_attachments: bool,
}

// ── Sender classification ───────────────────────────────────────────

/// Sender bucket, first-match-wins (see `classify::sender`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    Vip,
    Team,
    Vendor,
    Customer,
    Spam,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderClassification {
    pub sender_type: SenderType,
    pub is_vip: bool,
    pub is_internal: bool,
    /// Domain part of the sender address, lowercased.
    pub domain: String,
    /// Confidence in the label, [0, 1].
    pub confidence: f32,
    /// Audit-only free text.
    pub notes: String,
}

// ── Intent detection ────────────────────────────────────────────────

/// Domain intent detected from subject/body keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Legal,
    Finance,
    It,
    Hr,
    Meeting,
    Invitation,
    Complaint,
    Academic,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentDetection {
    /// Detected intent sets, in detection order, deduplicated.
    pub intents: Vec<Intent>,
    /// Matched urgency tokens and tags (e.g. `near_deadline`,
    /// `subject_override:urgent`, `low_priority_indicator:2`).
    pub urgency_keywords: Vec<String>,
    /// Accumulated urgency, clamped to [0, 40].
    pub urgency_score: i32,
    pub action_required: bool,
    pub question_detected: bool,
    pub is_follow_up: bool,
    /// First detected intent, for collaborators that want one label.
    pub primary_intent: Option<Intent>,
}

impl IntentDetection {
    pub fn has(&self, intent: Intent) -> bool {
        self.intents.contains(&intent)
    }

    /// Whether any positive urgency signal matched. Reducer tags
    /// (`low_priority_indicator:*`) are not positive signals.
    pub fn has_urgency_signal(&self) -> bool {
        self.urgency_keywords
            .iter()
            .any(|k| !k.starts_with("low_priority_indicator"))
    }
}

// ── Priority ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    High,
    Medium,
    Low,
    NotRequired,
}

impl PriorityLevel {
    /// Ordering rank — higher means more urgent.
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
            Self::NotRequired => 0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::NotRequired => "NOT_REQUIRED",
        }
    }
}

/// One scoring factor's contribution to the composite score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorContribution {
    pub name: String,
    pub points: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityScore {
    /// Composite score, [0, 100].
    pub score: u8,
    pub priority_level: PriorityLevel,
    /// Per-factor contributions in fixed factor order.
    pub factors: Vec<FactorContribution>,
    /// Human-readable trace listing the top contributing factors.
    pub reasoning: String,
}

// ── Security flags ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagType {
    PiiDetected,
    ReplyAllWarning,
    ReplyAllRisk,
    LegalContent,
    FinanceContent,
    ExternalSender,
    ToneViolation,
    EscalationRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityFlag {
    pub flag_type: FlagType,
    pub severity: Severity,
    pub description: String,
    /// Free-form structured detail for audit.
    pub details: serde_json::Value,
    pub blocks_sending: bool,
}

impl SecurityFlag {
    pub fn new(flag_type: FlagType, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            flag_type,
            severity,
            description: description.into(),
            details: serde_json::Value::Null,
            blocks_sending: false,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn blocking(mut self) -> Self {
        self.blocks_sending = true;
        self
    }
}

// ── Draft reply ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftReply {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
    pub cc: Vec<String>,
    pub tone: String,
    pub preserves_tone: bool,
    pub created_at: DateTime<Utc>,
    /// Never auto-send: defaults to true and is only ever tightened.
    pub requires_approval: bool,
    /// Mailbox-assigned ID when the draft was persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<String>,
}

impl DraftReply {
    pub fn new(subject: impl Into<String>, body: impl Into<String>, to: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            recipients: to,
            cc: Vec::new(),
            tone: "professional".into(),
            preserves_tone: true,
            created_at: Utc::now(),
            requires_approval: true,
            draft_id: None,
        }
    }

    /// Recipient/cc disjointness required before any send.
    pub fn recipients_disjoint(&self) -> bool {
        !self.recipients.iter().any(|r| self.cc.contains(r))
    }
}

// ── Clarification ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarificationReason {
    AmbiguousRecipients,
    UnclearIntent,
    MissingInformation,
}

/// Structured questions attached when the agent cannot proceed without
/// human input. Blocks auto-approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationRequest {
    pub email_id: String,
    pub subject: String,
    pub reasons: Vec<ClarificationReason>,
    pub questions: Vec<String>,
    pub context: serde_json::Value,
}

// ── Processed email ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Pending,
    Processing,
    Blocked,
    DraftReady,
    ApprovalRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailCategory {
    Action,
    Informational,
    Spam,
    Meeting,
    Legal,
    Finance,
    Hr,
    It,
    Other,
}

impl EmailCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Informational => "informational",
            Self::Spam => "spam",
            Self::Meeting => "meeting",
            Self::Legal => "legal",
            Self::Finance => "finance",
            Self::Hr => "hr",
            Self::It => "it",
            Self::Other => "other",
        }
    }
}

/// Ownership root for a single message moving through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedEmail {
    pub metadata: EmailMetadata,
    pub classification: Option<SenderClassification>,
    pub intent: Option<IntentDetection>,
    pub priority: Option<PriorityScore>,
    pub category: EmailCategory,
    pub is_spam: bool,
    pub is_blocked: bool,
    pub requires_reply: bool,
    pub has_pii: bool,
    pub draft_reply: Option<DraftReply>,
    pub security_flags: Vec<SecurityFlag>,
    /// Audit log, append-only.
    pub processing_notes: Vec<String>,
    pub status: EmailStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification_request: Option<ClarificationRequest>,
}

impl ProcessedEmail {
    pub fn new(metadata: EmailMetadata) -> Self {
        Self {
            metadata,
            classification: None,
            intent: None,
            priority: None,
            category: EmailCategory::Informational,
            is_spam: false,
            is_blocked: false,
            requires_reply: false,
            has_pii: false,
            draft_reply: None,
            security_flags: Vec::new(),
            processing_notes: Vec::new(),
            status: EmailStatus::Pending,
            clarification_request: None,
        }
    }

    /// Append an audit note.
    pub fn note(&mut self, note: impl Into<String>) {
        self.processing_notes.push(note.into());
    }

    /// Attach a security flag, maintaining the blocking invariant: any
    /// flag with `blocks_sending` forces `is_blocked` and tightens the
    /// draft's approval requirement.
    pub fn add_flag(&mut self, flag: SecurityFlag) {
        if flag.flag_type == FlagType::PiiDetected {
            self.has_pii = true;
        }
        if flag.blocks_sending {
            self.is_blocked = true;
            if let Some(draft) = self.draft_reply.as_mut() {
                draft.requires_approval = true;
            }
        }
        self.security_flags.push(flag);
    }

    /// Whether any attached flag blocks sending.
    pub fn has_blocking_flag(&self) -> bool {
        self.security_flags.iter().any(|f| f.blocks_sending)
    }

    pub fn priority_level(&self) -> PriorityLevel {
        self.priority
            .as_ref()
            .map(|p| p.priority_level)
            .unwrap_or(PriorityLevel::NotRequired)
    }

    pub fn score(&self) -> u8 {
        self.priority.as_ref().map(|p| p.score).unwrap_or(0)
    }
}

// ── Batch ───────────────────────────────────────────────────────────

/// User-supplied scope for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserScope {
    /// Optional mailbox query (provider-native syntax).
    pub query: Option<String>,
    /// Maximum messages to ingest.
    pub max_results: usize,
    /// Look-back window in days.
    pub time_range_days: u32,
}

impl Default for UserScope {
    fn default() -> Self {
        Self {
            query: None,
            max_results: 50,
            time_range_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingBatch {
    pub batch_id: Uuid,
    pub user_command: String,
    pub user_scope: UserScope,
    /// Ingestion order, then reordered by queue assembly.
    pub emails: Vec<ProcessedEmail>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Per-email failures that did not abort the batch.
    pub errors: Vec<String>,
    pub total_processed: usize,
}

impl ProcessingBatch {
    pub fn new(user_command: impl Into<String>, user_scope: UserScope, started_at: DateTime<Utc>) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            user_command: user_command.into(),
            user_scope,
            emails: Vec::new(),
            started_at,
            completed_at: None,
            errors: Vec::new(),
            total_processed: 0,
        }
    }
}
