//! Error types for the triage agent.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Triage error: {0}")]
    Triage(#[from] TriageError),
}

/// Configuration-related errors. Invalid config at startup is fatal —
/// the agent refuses to run.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Mailbox capability errors.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Connection to {host} failed: {reason}")]
    Connect { host: String, reason: String },

    #[error("Mailbox authentication failed: {reason}")]
    AuthFailed { reason: String },

    #[error("Listing messages failed: {reason}")]
    List { reason: String },

    #[error("Fetching message {id} failed: {reason}")]
    Fetch { id: String, reason: String },

    #[error("Failed to parse message {id}: {reason}")]
    Parse { id: String, reason: String },

    #[error("Saving draft failed: {reason}")]
    DraftSave { reason: String },

    #[error("Sending failed: {reason}")]
    SendFailed { reason: String },

    #[error("Missing permission scope: {scope}")]
    PermissionDenied { scope: String },

    #[error("Send refused: draft {draft_id} is not approved")]
    NotApproved { draft_id: String },
}

impl MailboxError {
    /// Whether a retry with backoff is worth attempting.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::List { .. } | Self::Fetch { .. }
        )
    }
}

/// LLM capability errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Provider {provider} quota exceeded")]
    QuotaExceeded { provider: String },

    #[error("Provider {provider} returned an empty response")]
    EmptyResponse { provider: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

impl LlmError {
    /// Whether a retry with backoff is worth attempting.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RequestFailed { .. } | Self::RateLimited { .. })
    }
}

/// Chat notifier / task tracker errors. Always swallowed by the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notifier is not configured")]
    Disabled,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Notifier API rejected the request: {0}")]
    Rejected(String),

    #[error("Notification timed out")]
    Timeout,
}

/// Pipeline-level errors.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("Ingestion failed: {0}")]
    Ingestion(String),

    #[error("Invalid user scope: {0}")]
    InvalidScope(String),
}

/// Result type alias for the agent.
pub type Result<T> = std::result::Result<T, Error>;
