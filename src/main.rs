use std::sync::Arc;

use inbox_triage::config::TriageConfig;
use inbox_triage::llm::{FailoverClient, LlmBackend, LlmConfig, create_client};
use inbox_triage::mail::{ImapConfig, ImapMailbox};
use inbox_triage::model::UserScope;
use inbox_triage::notify::{NotionTracker, SlackNotifier};
use inbox_triage::pipeline::TriagePipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing; optional rolling file log next to stderr.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _log_guard = match std::env::var("TRIAGE_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "inbox-triage.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    };

    // Config is fatal at startup when invalid.
    let config = match TriageConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Error: invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // Mailbox is the one required capability.
    let Some(imap_config) = ImapConfig::from_env() else {
        eprintln!("Error: TRIAGE_IMAP_HOST not set");
        eprintln!("  export TRIAGE_IMAP_HOST=imap.example.com");
        eprintln!("  export TRIAGE_MAIL_USERNAME=me@example.com");
        eprintln!("  export TRIAGE_MAIL_PASSWORD=...");
        std::process::exit(1);
    };
    let mailbox = Arc::new(ImapMailbox::new(imap_config));

    let mut pipeline = TriagePipeline::new(Arc::clone(&config), mailbox);

    // LLM drafting is optional; without it every draft is a template.
    if config.features.llm_drafting
        && let Some(api_key) = config.secrets.llm_api_key.clone()
    {
        let model = std::env::var("TRIAGE_LLM_MODEL")
            .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
        let primary = create_client(&LlmConfig {
            backend: LlmBackend::Anthropic,
            api_key,
            model,
        })?;

        let secondary = match std::env::var("TRIAGE_FALLBACK_LLM_API_KEY") {
            Ok(key) => {
                let model = std::env::var("TRIAGE_FALLBACK_LLM_MODEL")
                    .unwrap_or_else(|_| "gpt-4o-mini".to_string());
                Some(create_client(&LlmConfig {
                    backend: LlmBackend::OpenAi,
                    api_key: secrecy::SecretString::from(key),
                    model,
                })?)
            }
            Err(_) => None,
        };

        pipeline = pipeline.with_llm(Arc::new(FailoverClient::new(primary, secondary)));
        eprintln!("   Drafting: LLM with template fallback");
    } else {
        eprintln!("   Drafting: template-only (no TRIAGE_LLM_API_KEY)");
    }

    if config.features.notifications {
        if let Some(token) = config.secrets.chat_token.clone() {
            let channel = std::env::var("TRIAGE_CHAT_CHANNEL")
                .unwrap_or_else(|_| "#email-triage".to_string());
            pipeline = pipeline.with_chat(Arc::new(SlackNotifier::new(token, channel)));
            eprintln!("   Chat notifications: enabled");
        }
        if let Some(token) = config.secrets.tracker_token.clone() {
            if let Ok(database_id) = std::env::var("TRIAGE_TRACKER_DATABASE_ID") {
                pipeline = pipeline.with_tracker(Arc::new(NotionTracker::new(token, database_id)));
                eprintln!("   Task tracker: enabled");
            } else {
                eprintln!("   Task tracker: TRIAGE_TRACKER_DATABASE_ID missing, disabled");
            }
        }
    }

    // Scope from args/env: `inbox-triage [user command...]`
    let args: Vec<String> = std::env::args().skip(1).collect();
    let user_command = if args.is_empty() {
        "check my inbox".to_string()
    } else {
        args.join(" ")
    };
    let scope = UserScope {
        query: std::env::var("TRIAGE_QUERY").ok(),
        max_results: std::env::var("TRIAGE_MAX_RESULTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50),
        time_range_days: std::env::var("TRIAGE_TIME_RANGE_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(7),
    };

    eprintln!("📬 Inbox Triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Command: {user_command}");
    eprintln!(
        "   Scope: {} messages over {} days\n",
        scope.max_results, scope.time_range_days
    );

    let report = pipeline.run(&user_command, scope).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
