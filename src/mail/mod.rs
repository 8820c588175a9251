//! Mailbox capability — the only interface to the user's mail.
//!
//! The pipeline reads through `list`/`fetch`, persists drafts through
//! `create_draft`, and may send only through the approval-gated `send`.
//! Sending is the single mutation of external state in the system.

pub mod imap;

pub use imap::{ImapConfig, ImapMailbox};

use async_trait::async_trait;

use crate::error::MailboxError;
use crate::model::EmailMetadata;

/// Permission scopes a mailbox adapter may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionScope {
    Read,
    Compose,
    Send,
}

/// Caller's assertion when requesting a send. Anything other than
/// `Approved` must be refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    Pending,
    Approved,
}

/// Opaque handle to a listed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub id: String,
}

#[async_trait]
pub trait Mailbox: Send + Sync {
    /// List recent messages matching the scope, newest last.
    async fn list(
        &self,
        query: Option<&str>,
        max_results: usize,
        time_range_days: u32,
    ) -> Result<Vec<MessageRef>, MailboxError>;

    /// Fetch and parse a single message.
    async fn fetch(&self, message: &MessageRef) -> Result<EmailMetadata, MailboxError>;

    /// Persist a draft; returns the mailbox-assigned draft id.
    async fn create_draft(
        &self,
        to: &[String],
        cc: &[String],
        subject: &str,
        body: &str,
    ) -> Result<String, MailboxError>;

    /// Send a previously created draft. Must fail with
    /// [`MailboxError::NotApproved`] unless the caller asserts approval.
    async fn send(&self, draft_id: &str, approval: ApprovalStatus) -> Result<(), MailboxError>;

    /// Scopes this adapter is authorized for.
    fn scopes(&self) -> Vec<PermissionScope>;

    /// Domain of the authenticated account, when known. Feeds the TEAM
    /// sender classification.
    fn operator_domain(&self) -> Option<String> {
        None
    }
}
