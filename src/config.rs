//! Static configuration tables and tunables.
//!
//! All keyword tables, weights and thresholds are typed, immutable, and
//! loaded once at startup. The pipeline never mutates config.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Subject hits weigh more than body hits.
pub const SUBJECT_WEIGHT: f32 = 1.7;

/// Urgency score is clamped to this cap after accumulation.
pub const URGENCY_CAP: i32 = 40;

/// Priority level thresholds. Single source of truth — `level(score)`
/// in `classify::priority` is the only consumer.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub high: u8,
    pub medium: u8,
    pub low: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high: 70,
            medium: 50,
            low: 30,
        }
    }
}

/// Do-not-disturb window in local wall-clock hours. May wrap midnight
/// (e.g. 22 → 7).
#[derive(Debug, Clone, Copy)]
pub struct DndWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl DndWindow {
    /// Whether the given hour falls inside the window.
    pub fn contains_hour(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            (self.start_hour..self.end_hour).contains(&hour)
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Feature switches. Defaults yield a minimally-functional agent with
/// template-only drafting.
#[derive(Debug, Clone, Default)]
pub struct FeatureFlags {
    pub llm_drafting: bool,
    pub notifications: bool,
}

/// Secrets for the external collaborators. All optional — a missing
/// secret disables that collaborator.
#[derive(Clone, Default)]
pub struct Secrets {
    pub llm_api_key: Option<SecretString>,
    pub chat_token: Option<SecretString>,
    pub tracker_token: Option<SecretString>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("llm_api_key", &self.llm_api_key.is_some())
            .field("chat_token", &self.chat_token.is_some())
            .field("tracker_token", &self.tracker_token.is_some())
            .finish()
    }
}

/// Read-only triage configuration.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    // ── Sender tables ──
    pub vip_emails: Vec<String>,
    pub vip_domains: Vec<String>,
    /// The operator's own domain; senders here classify as TEAM.
    pub operator_domain: Option<String>,
    /// Domains considered internal for recipient checks.
    pub allowed_domains: Vec<String>,
    pub vendor_local_parts: Vec<String>,
    pub consumer_providers: Vec<String>,

    // ── Keyword tables ──
    pub urgency_keywords: Vec<(String, i32)>,
    pub subject_high_priority: Vec<String>,
    pub subject_low_priority: Vec<String>,
    pub legal_keywords: Vec<String>,
    pub finance_keywords: Vec<String>,
    pub it_keywords: Vec<String>,
    pub hr_keywords: Vec<String>,
    pub meeting_keywords: Vec<String>,
    pub invitation_keywords: Vec<String>,
    pub academic_keywords: Vec<String>,
    pub complaint_keywords: Vec<String>,
    pub low_priority_indicators: Vec<String>,
    pub action_phrases: Vec<String>,
    pub follow_up_phrases: Vec<String>,

    // ── Spam ──
    pub spam_subject_patterns: Vec<String>,
    /// Links per word above which a body is treated as spam.
    pub max_link_density: f32,

    // ── Scoring ──
    pub thresholds: Thresholds,

    // ── Policy ──
    pub dnd: Option<DndWindow>,
    pub features: FeatureFlags,

    // ── Concurrency / timeouts ──
    pub classify_workers: usize,
    pub draft_concurrency: usize,
    pub llm_timeout_secs: u64,
    pub batch_deadline_secs: u64,

    pub secrets: Secrets,
}

impl Default for TriageConfig {
    fn default() -> Self {
        let s = |items: &[&str]| items.iter().map(|i| (*i).to_string()).collect::<Vec<_>>();

        Self {
            vip_emails: s(&["boss@example.com", "ceo@example.com"]),
            vip_domains: s(&[
                "google.com",
                "deepmind.com",
                "ycombinator.com",
                "microsoft.com",
                "apple.com",
                "amazon.com",
                "meta.com",
                "openai.com",
                "anthropic.com",
                "nvidia.com",
            ]),
            operator_domain: None,
            allowed_domains: Vec::new(),
            vendor_local_parts: s(&[
                "billing",
                "noreply",
                "no-reply",
                "marketing",
                "newsletter",
                "sales",
                "promo",
                "notifications",
            ]),
            consumer_providers: s(&[
                "gmail.com",
                "yahoo.com",
                "outlook.com",
                "hotmail.com",
                "icloud.com",
            ]),
            urgency_keywords: vec![
                // Critical
                ("emergency".into(), 11),
                ("production down".into(), 11),
                ("system down".into(), 11),
                ("security breach".into(), 11),
                ("immediately".into(), 10),
                ("critical".into(), 10),
                ("outage".into(), 10),
                ("data loss".into(), 10),
                ("right now".into(), 9),
                // High
                ("urgent".into(), 8),
                ("asap".into(), 8),
                ("blocked".into(), 8),
                ("blocker".into(), 8),
                ("time sensitive".into(), 8),
                ("before eod".into(), 7),
                ("by end of day".into(), 7),
                ("today".into(), 7),
                ("stuck".into(), 7),
                // Medium
                ("deadline".into(), 6),
                ("action required".into(), 6),
                ("attention needed".into(), 6),
                ("need help".into(), 6),
                ("waiting on".into(), 6),
                ("response needed".into(), 6),
                ("priority".into(), 5),
                ("important".into(), 5),
                ("please review".into(), 5),
                // Low
                ("reminder".into(), 4),
                ("follow up".into(), 4),
                ("checking in".into(), 3),
                ("when you can".into(), 2),
                ("no rush".into(), 1),
            ],
            subject_high_priority: s(&[
                "urgent",
                "emergency",
                "critical",
                "asap",
                "production down",
                "outage",
                "security breach",
            ]),
            subject_low_priority: s(&["fyi", "newsletter", "digest", "out of office"]),
            legal_keywords: s(&[
                "contract",
                "agreement",
                "legal",
                "lawyer",
                "suing",
                "court",
                "compliance",
            ]),
            finance_keywords: s(&[
                "invoice", "payment", "bank", "transfer", "salary", "budget", "tax",
            ]),
            it_keywords: s(&[
                "access", "password", "login", "git", "repo", "server", "database", "api",
            ]),
            hr_keywords: s(&["benefit", "offer", "hiring", "resume", "leave", "vacation"]),
            meeting_keywords: s(&[
                "schedule",
                "calendar",
                "meet",
                "zoom",
                "hangout",
                "availability",
            ]),
            invitation_keywords: s(&["invited you", "invitation", "invited to", "collaborate"]),
            academic_keywords: s(&[
                "paper",
                "journal",
                "peer review",
                "conference",
                "thesis",
                "citation",
            ]),
            complaint_keywords: s(&[
                "dissatisfied",
                "terrible",
                "bad service",
                "angry",
                "unhappy",
                "complaint",
                "disappointed",
                "frustrated",
                "unacceptable",
                "not working",
                "escalate",
            ]),
            low_priority_indicators: s(&[
                "fyi",
                "for your information",
                "heads up",
                "just so you know",
                "no action required",
                "no response needed",
                "optional",
                "when you have time",
                "read when convenient",
                "newsletter",
                "automated",
                "unsubscribe",
                "notification only",
            ]),
            action_phrases: s(&[
                "action required",
                "please",
                "need you to",
                "approval",
                "required",
            ]),
            follow_up_phrases: s(&["any update", "following up", "reminder", "checking in"]),
            spam_subject_patterns: s(&[
                r"(?i)\byou (have )?won\b",
                r"(?i)\bfree (money|gift|prize)\b",
                r"(?i)\bact now\b",
                r"(?i)100% (free|off)",
                r"(?i)\blottery\b",
                r"(?i)\bviagra\b",
            ]),
            max_link_density: 0.2,
            thresholds: Thresholds::default(),
            dnd: None,
            features: FeatureFlags::default(),
            classify_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            draft_concurrency: 4,
            llm_timeout_secs: 20,
            batch_deadline_secs: 300,
            secrets: Secrets::default(),
        }
    }
}

impl TriageConfig {
    /// Build config from environment variables, starting from defaults.
    ///
    /// Recognized variables (all optional):
    /// `TRIAGE_OPERATOR_DOMAIN`, `TRIAGE_VIP_EMAILS`, `TRIAGE_VIP_DOMAINS`,
    /// `TRIAGE_ALLOWED_DOMAINS` (comma-separated), `TRIAGE_DND_WINDOW`
    /// ("22-7"), `TRIAGE_LLM_API_KEY`, `TRIAGE_CHAT_TOKEN`,
    /// `TRIAGE_TRACKER_TOKEN`, `TRIAGE_LLM_TIMEOUT_SECS`,
    /// `TRIAGE_BATCH_DEADLINE_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(domain) = std::env::var("TRIAGE_OPERATOR_DOMAIN") {
            config.operator_domain = Some(domain.trim().to_lowercase());
        }
        if let Ok(list) = std::env::var("TRIAGE_VIP_EMAILS") {
            config.vip_emails = split_csv(&list);
        }
        if let Ok(list) = std::env::var("TRIAGE_VIP_DOMAINS") {
            config.vip_domains = split_csv(&list);
        }
        if let Ok(list) = std::env::var("TRIAGE_ALLOWED_DOMAINS") {
            config.allowed_domains = split_csv(&list);
        }
        if let Ok(window) = std::env::var("TRIAGE_DND_WINDOW") {
            config.dnd = Some(parse_dnd_window(&window)?);
        }
        if let Ok(secs) = std::env::var("TRIAGE_LLM_TIMEOUT_SECS") {
            config.llm_timeout_secs = parse_u64("TRIAGE_LLM_TIMEOUT_SECS", &secs)?;
        }
        if let Ok(secs) = std::env::var("TRIAGE_BATCH_DEADLINE_SECS") {
            config.batch_deadline_secs = parse_u64("TRIAGE_BATCH_DEADLINE_SECS", &secs)?;
        }

        if let Ok(key) = std::env::var("TRIAGE_LLM_API_KEY") {
            config.secrets.llm_api_key = Some(SecretString::from(key));
            config.features.llm_drafting = true;
        }
        if let Ok(token) = std::env::var("TRIAGE_CHAT_TOKEN") {
            config.secrets.chat_token = Some(SecretString::from(token));
            config.features.notifications = true;
        }
        if let Ok(token) = std::env::var("TRIAGE_TRACKER_TOKEN") {
            config.secrets.tracker_token = Some(SecretString::from(token));
            config.features.notifications = true;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration. A failure here is fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.thresholds;
        if !(t.low < t.medium && t.medium < t.high) {
            return Err(ConfigError::InvalidValue {
                key: "thresholds".into(),
                message: format!(
                    "must be strictly ordered low < medium < high, got {}/{}/{}",
                    t.low, t.medium, t.high
                ),
            });
        }
        if self.urgency_keywords.iter().any(|(_, w)| *w <= 0) {
            return Err(ConfigError::InvalidValue {
                key: "urgency_keywords".into(),
                message: "all weights must be positive".into(),
            });
        }
        if let Some(dnd) = self.dnd
            && (dnd.start_hour > 23 || dnd.end_hour > 23)
        {
            return Err(ConfigError::InvalidValue {
                key: "dnd".into(),
                message: "hours must be in 0..=23".into(),
            });
        }
        if self.max_link_density <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "max_link_density".into(),
                message: "must be positive".into(),
            });
        }
        if self.classify_workers == 0 || self.draft_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "concurrency".into(),
                message: "worker counts must be nonzero".into(),
            });
        }
        Ok(())
    }

    /// Whether a domain counts as internal.
    pub fn is_internal_domain(&self, domain: &str) -> bool {
        let domain = domain.to_lowercase();
        self.allowed_domains.iter().any(|d| d.eq_ignore_ascii_case(&domain))
            || self
                .operator_domain
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case(&domain))
    }
}

fn split_csv(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.into(),
        message: format!("expected an integer, got '{value}'"),
    })
}

/// Parse "22-7" into a DND window.
fn parse_dnd_window(raw: &str) -> Result<DndWindow, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: "TRIAGE_DND_WINDOW".into(),
        message: format!("expected 'START-END' hours, got '{raw}'"),
    };
    let (start, end) = raw.trim().split_once('-').ok_or_else(invalid)?;
    let start_hour: u32 = start.trim().parse().map_err(|_| invalid())?;
    let end_hour: u32 = end.trim().parse().map_err(|_| invalid())?;
    if start_hour > 23 || end_hour > 23 {
        return Err(invalid());
    }
    Ok(DndWindow {
        start_hour,
        end_hour,
    })
}
