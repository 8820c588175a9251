//! IMAP/SMTP mailbox adapter.
//!
//! Raw IMAP over rustls for listing, fetching and draft APPEND;
//! `mail-parser` for RFC5322/MIME extraction; `lettre` SMTP for the
//! approval-gated send. All socket work is blocking and runs inside
//! `spawn_blocking`.

use std::collections::HashMap;
use std::io::{Read, Write as IoWrite};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::Mailbox as LettreMailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use mail_parser::MessageParser;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::error::MailboxError;
use crate::mail::{ApprovalStatus, Mailbox, MessageRef, PermissionScope};
use crate::model::EmailMetadata;

/// IMAP read timeout per socket operation.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

// ── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
    pub drafts_folder: String,
    pub scopes: Vec<PermissionScope>,
}

impl ImapConfig {
    /// Build config from environment variables.
    /// Returns `None` if `TRIAGE_IMAP_HOST` is not set (mailbox disabled).
    pub fn from_env() -> Option<Self> {
        let imap_host = std::env::var("TRIAGE_IMAP_HOST").ok()?;

        let imap_port: u16 = std::env::var("TRIAGE_IMAP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(993);

        let smtp_host = std::env::var("TRIAGE_SMTP_HOST")
            .unwrap_or_else(|_| imap_host.replace("imap", "smtp"));

        let smtp_port: u16 = std::env::var("TRIAGE_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("TRIAGE_MAIL_USERNAME").unwrap_or_default();
        let password =
            SecretString::from(std::env::var("TRIAGE_MAIL_PASSWORD").unwrap_or_default());
        let from_address =
            std::env::var("TRIAGE_MAIL_FROM").unwrap_or_else(|_| username.clone());
        let drafts_folder =
            std::env::var("TRIAGE_DRAFTS_FOLDER").unwrap_or_else(|_| "Drafts".to_string());

        let scopes = std::env::var("TRIAGE_MAIL_SCOPES")
            .map(|s| parse_scopes(&s))
            .unwrap_or_else(|_| {
                vec![
                    PermissionScope::Read,
                    PermissionScope::Compose,
                    PermissionScope::Send,
                ]
            });

        Some(Self {
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
            drafts_folder,
            scopes,
        })
    }
}

fn parse_scopes(raw: &str) -> Vec<PermissionScope> {
    raw.split(',')
        .filter_map(|s| match s.trim().to_lowercase().as_str() {
            "read" => Some(PermissionScope::Read),
            "compose" => Some(PermissionScope::Compose),
            "send" => Some(PermissionScope::Send),
            _ => None,
        })
        .collect()
}

// ── Adapter ─────────────────────────────────────────────────────────

/// A draft kept for the send gate after APPEND.
#[derive(Clone)]
struct StoredDraft {
    to: Vec<String>,
    cc: Vec<String>,
    subject: String,
    body: String,
}

pub struct ImapMailbox {
    config: ImapConfig,
    drafts: Arc<Mutex<HashMap<String, StoredDraft>>>,
}

impl ImapMailbox {
    pub fn new(config: ImapConfig) -> Self {
        Self {
            config,
            drafts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn require_scope(&self, scope: PermissionScope, name: &str) -> Result<(), MailboxError> {
        if self.config.scopes.contains(&scope) {
            Ok(())
        } else {
            Err(MailboxError::PermissionDenied { scope: name.into() })
        }
    }

    fn send_smtp(&self, draft: &StoredDraft) -> Result<(), MailboxError> {
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );
        let transport = SmtpTransport::relay(&self.config.smtp_host)
            .map_err(|e| MailboxError::SendFailed {
                reason: format!("SMTP relay error: {e}"),
            })?
            .port(self.config.smtp_port)
            .credentials(creds)
            .build();

        let message = build_message(&self.config.from_address, draft)?;
        transport.send(&message).map_err(|e| MailboxError::SendFailed {
            reason: format!("SMTP send failed: {e}"),
        })?;

        tracing::info!(to = ?draft.to, "Email sent");
        Ok(())
    }
}

fn build_message(from: &str, draft: &StoredDraft) -> Result<Message, MailboxError> {
    let parse_addr = |addr: &str| -> Result<LettreMailbox, MailboxError> {
        addr.parse().map_err(|e| MailboxError::SendFailed {
            reason: format!("Invalid address {addr}: {e}"),
        })
    };

    let mut builder = Message::builder()
        .from(parse_addr(from)?)
        .subject(&draft.subject);
    for to in &draft.to {
        builder = builder.to(parse_addr(to)?);
    }
    for cc in &draft.cc {
        builder = builder.cc(parse_addr(cc)?);
    }
    builder
        .body(draft.body.clone())
        .map_err(|e| MailboxError::SendFailed {
            reason: format!("Failed to build message: {e}"),
        })
}

#[async_trait]
impl Mailbox for ImapMailbox {
    async fn list(
        &self,
        query: Option<&str>,
        max_results: usize,
        time_range_days: u32,
    ) -> Result<Vec<MessageRef>, MailboxError> {
        self.require_scope(PermissionScope::Read, "read")?;

        let config = self.config.clone();
        let query = query.map(String::from);
        let since = (Utc::now() - chrono::Duration::days(time_range_days as i64))
            .format("%d-%b-%Y")
            .to_string();

        let uids = tokio::task::spawn_blocking(move || -> Result<Vec<String>, MailboxError> {
            let mut session = ImapSession::connect(&config)?;
            session.login(&config.username, config.password.expose_secret())?;
            session.select("INBOX")?;
            let uids = session.search(&since, query.as_deref())?;
            session.logout();
            Ok(uids)
        })
        .await
        .map_err(|e| MailboxError::List {
            reason: format!("IMAP task panicked: {e}"),
        })??;

        // Newest UIDs come last; keep the most recent `max_results`.
        let start = uids.len().saturating_sub(max_results);
        Ok(uids[start..]
            .iter()
            .map(|uid| MessageRef { id: uid.clone() })
            .collect())
    }

    async fn fetch(&self, message: &MessageRef) -> Result<EmailMetadata, MailboxError> {
        self.require_scope(PermissionScope::Read, "read")?;

        let config = self.config.clone();
        let uid = message.id.clone();

        let raw = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, MailboxError> {
            let mut session = ImapSession::connect(&config)?;
            session.login(&config.username, config.password.expose_secret())?;
            session.select("INBOX")?;
            let raw = session.fetch(&uid)?;
            session.logout();
            Ok(raw)
        })
        .await
        .map_err(|e| MailboxError::Fetch {
            id: message.id.clone(),
            reason: format!("IMAP task panicked: {e}"),
        })??;

        parse_email(&message.id, &raw)
    }

    async fn create_draft(
        &self,
        to: &[String],
        cc: &[String],
        subject: &str,
        body: &str,
    ) -> Result<String, MailboxError> {
        self.require_scope(PermissionScope::Compose, "compose")?;

        let draft = StoredDraft {
            to: to.to_vec(),
            cc: cc.to_vec(),
            subject: subject.to_string(),
            body: body.to_string(),
        };
        let raw = build_message(&self.config.from_address, &draft)?.formatted();

        let config = self.config.clone();
        tokio::task::spawn_blocking(move || -> Result<(), MailboxError> {
            let mut session = ImapSession::connect(&config)?;
            session.login(&config.username, config.password.expose_secret())?;
            session.append(&config.drafts_folder, &raw)?;
            session.logout();
            Ok(())
        })
        .await
        .map_err(|e| MailboxError::DraftSave {
            reason: format!("IMAP task panicked: {e}"),
        })??;

        let draft_id = format!("draft-{}", Uuid::new_v4());
        self.drafts.lock().unwrap().insert(draft_id.clone(), draft);
        tracing::debug!(draft_id = %draft_id, "Draft persisted");
        Ok(draft_id)
    }

    async fn send(&self, draft_id: &str, approval: ApprovalStatus) -> Result<(), MailboxError> {
        if approval != ApprovalStatus::Approved {
            return Err(MailboxError::NotApproved {
                draft_id: draft_id.to_string(),
            });
        }
        self.require_scope(PermissionScope::Send, "send")?;

        let draft = self
            .drafts
            .lock()
            .unwrap()
            .get(draft_id)
            .cloned()
            .ok_or_else(|| MailboxError::SendFailed {
                reason: format!("Unknown draft {draft_id}"),
            })?;

        let this = self.clone_for_blocking();
        tokio::task::spawn_blocking(move || this.send_smtp(&draft))
            .await
            .map_err(|e| MailboxError::SendFailed {
                reason: format!("SMTP task panicked: {e}"),
            })?
    }

    fn scopes(&self) -> Vec<PermissionScope> {
        self.config.scopes.clone()
    }

    fn operator_domain(&self) -> Option<String> {
        self.config
            .from_address
            .rsplit_once('@')
            .map(|(_, domain)| domain.to_lowercase())
    }
}

impl ImapMailbox {
    fn clone_for_blocking(&self) -> Self {
        Self {
            config: self.config.clone(),
            drafts: Arc::clone(&self.drafts),
        }
    }
}

// ── Message parsing ─────────────────────────────────────────────────

fn parse_email(id: &str, raw: &[u8]) -> Result<EmailMetadata, MailboxError> {
    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| MailboxError::Parse {
            id: id.to_string(),
            reason: "unparseable RFC5322 payload".into(),
        })?;

    let sender = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".into());

    let message_id = parsed
        .message_id()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("gen-{}", Uuid::new_v4()));

    let date: Option<DateTime<Utc>> = parsed
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0));

    let body = if let Some(text) = parsed.body_text(0) {
        text.to_string()
    } else if let Some(html) = parsed.body_html(0) {
        strip_html(html.as_ref())
    } else {
        String::new()
    };

    Ok(EmailMetadata {
        message_id,
        thread_id: parsed.thread_name().map(|s| s.to_string()),
        sender,
        subject: parsed.subject().unwrap_or("(no subject)").to_string(),
        body,
        recipients: collect_addresses(parsed.to()),
        cc: collect_addresses(parsed.cc()),
        date,
        has_attachments: parsed.attachment_count() > 0,
    })
}

fn collect_addresses(addresses: Option<&mail_parser::Address<'_>>) -> Vec<String> {
    addresses
        .map(|list| {
            list.iter()
                .filter_map(|a| a.address())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── IMAP session (blocking) ─────────────────────────────────────────

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Minimal tagged-command IMAP session over TLS.
struct ImapSession {
    tls: TlsStream,
    tag_counter: u32,
}

impl ImapSession {
    fn connect(config: &ImapConfig) -> Result<Self, MailboxError> {
        let connect_err = |reason: String| MailboxError::Connect {
            host: config.imap_host.clone(),
            reason,
        };

        let tcp = TcpStream::connect((&*config.imap_host, config.imap_port))
            .map_err(|e| connect_err(e.to_string()))?;
        tcp.set_read_timeout(Some(READ_TIMEOUT))
            .map_err(|e| connect_err(e.to_string()))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name: rustls::pki_types::ServerName<'_> =
            rustls::pki_types::ServerName::try_from(config.imap_host.clone())
                .map_err(|e| connect_err(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| connect_err(e.to_string()))?;
        let tls = rustls::StreamOwned::new(conn, tcp);

        let mut session = Self { tls, tag_counter: 0 };
        session.read_line().map_err(connect_err)?; // greeting
        Ok(session)
    }

    fn login(&mut self, username: &str, password: &str) -> Result<(), MailboxError> {
        let response = self
            .command(&format!("LOGIN \"{username}\" \"{password}\""))
            .map_err(|reason| MailboxError::AuthFailed { reason })?;
        if response.last().is_some_and(|l| l.contains("OK")) {
            Ok(())
        } else {
            Err(MailboxError::AuthFailed {
                reason: "IMAP login rejected".into(),
            })
        }
    }

    fn select(&mut self, folder: &str) -> Result<(), MailboxError> {
        self.command(&format!("SELECT \"{folder}\""))
            .map(|_| ())
            .map_err(|reason| MailboxError::List { reason })
    }

    /// SEARCH by date, optionally narrowed by a TEXT query.
    fn search(&mut self, since: &str, query: Option<&str>) -> Result<Vec<String>, MailboxError> {
        let command = match query {
            Some(q) => format!("SEARCH SINCE {since} TEXT \"{}\"", q.replace('"', "")),
            None => format!("SEARCH SINCE {since}"),
        };
        let response = self
            .command(&command)
            .map_err(|reason| MailboxError::List { reason })?;

        let mut uids = Vec::new();
        for line in &response {
            if line.starts_with("* SEARCH") {
                uids.extend(line.split_whitespace().skip(2).map(String::from));
            }
        }
        Ok(uids)
    }

    fn fetch(&mut self, uid: &str) -> Result<Vec<u8>, MailboxError> {
        let response = self
            .command(&format!("FETCH {uid} RFC822"))
            .map_err(|reason| MailboxError::Fetch {
                id: uid.to_string(),
                reason,
            })?;

        // Drop the untagged FETCH header and the tagged completion line.
        let raw: String = response
            .iter()
            .skip(1)
            .take(response.len().saturating_sub(2))
            .cloned()
            .collect();
        Ok(raw.into_bytes())
    }

    /// APPEND a literal to a folder (draft persistence).
    fn append(&mut self, folder: &str, raw: &[u8]) -> Result<(), MailboxError> {
        let save_err = |reason: String| MailboxError::DraftSave { reason };

        self.tag_counter += 1;
        let tag = format!("A{}", self.tag_counter);
        let header = format!("{tag} APPEND \"{folder}\" {{{}}}\r\n", raw.len());
        self.tls
            .write_all(header.as_bytes())
            .map_err(|e| save_err(e.to_string()))?;
        self.tls.flush().map_err(|e| save_err(e.to_string()))?;

        // Expect the continuation prompt before the literal.
        let cont = self.read_line().map_err(save_err)?;
        if !cont.starts_with('+') {
            return Err(save_err(format!("APPEND refused: {}", cont.trim())));
        }

        self.tls.write_all(raw).map_err(|e| save_err(e.to_string()))?;
        self.tls
            .write_all(b"\r\n")
            .map_err(|e| save_err(e.to_string()))?;
        self.tls.flush().map_err(|e| save_err(e.to_string()))?;

        loop {
            let line = self.read_line().map_err(save_err)?;
            if line.starts_with(&tag) {
                if line.contains("OK") {
                    return Ok(());
                }
                return Err(save_err(format!("APPEND failed: {}", line.trim())));
            }
        }
    }

    fn logout(&mut self) {
        let _ = self.command("LOGOUT");
    }

    /// Send a tagged command and read lines until the tagged response.
    fn command(&mut self, command: &str) -> Result<Vec<String>, String> {
        self.tag_counter += 1;
        let tag = format!("A{}", self.tag_counter);
        let full = format!("{tag} {command}\r\n");
        self.tls
            .write_all(full.as_bytes())
            .map_err(|e| e.to_string())?;
        self.tls.flush().map_err(|e| e.to_string())?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            let done = line.starts_with(&tag);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    fn read_line(&mut self) -> Result<String, String> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match self.tls.read(&mut byte) {
                Ok(0) => return Err("IMAP connection closed".into()),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(e.to_string()),
            }
        }
    }
}
