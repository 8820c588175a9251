//! LLM integration.
//!
//! Supports:
//! - **Anthropic**: Direct API access via rig-core
//! - **OpenAI**: Direct API access via rig-core
//!
//! rig-core provides the HTTP transport; `RigClient` bridges a rig
//! agent to our [`LlmClient`] trait. Drafting never depends on this
//! module succeeding — every failure path ends in a template.

mod costs;
pub mod client;
pub mod failover;

pub use client::LlmClient;
pub use failover::FailoverClient;

pub(crate) use costs::estimate_from_chars;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::{CompletionModel, Prompt};
use secrecy::ExposeSecret;

use crate::error::LlmError;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
    OpenAi,
}

/// Configuration for creating an LLM client.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
}

/// Create an LLM client from configuration.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    match config.backend {
        LlmBackend::Anthropic => create_anthropic_client(config),
        LlmBackend::OpenAi => create_openai_client(config),
    }
}

fn create_anthropic_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    use rig::providers::anthropic;

    let client: rig::client::Client<anthropic::client::AnthropicExt> =
        anthropic::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: format!("Failed to create Anthropic client: {}", e),
            }
        })?;

    let agent = client.agent(&config.model).build();
    tracing::info!("Using Anthropic (model: {})", config.model);
    Ok(Arc::new(RigClient::new(agent, &config.model)))
}

fn create_openai_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("Failed to create OpenAI client: {}", e),
            }
        })?;

    let agent = client.agent(&config.model).build();
    tracing::info!("Using OpenAI (model: {})", config.model);
    Ok(Arc::new(RigClient::new(agent, &config.model)))
}

/// Bridges a rig agent to [`LlmClient`].
struct RigClient<M: CompletionModel> {
    agent: rig::agent::Agent<M>,
    model: String,
}

impl<M: CompletionModel> RigClient<M> {
    fn new(agent: rig::agent::Agent<M>, model: &str) -> Self {
        Self {
            agent,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl<M: CompletionModel> LlmClient for RigClient<M> {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, LlmError> {
        let response = tokio::time::timeout(timeout, self.agent.prompt(prompt))
            .await
            .map_err(|_| LlmError::Timeout {
                provider: self.model.clone(),
                timeout,
            })?
            .map_err(|e| classify_prompt_error(&self.model, &e.to_string()))?;

        if response.trim().is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: self.model.clone(),
            });
        }

        tracing::debug!(
            model = %self.model,
            cost_usd = %estimate_from_chars(&self.model, prompt.len(), response.len()),
            "LLM completion"
        );
        Ok(response)
    }
}

/// Map a provider error message onto our error kinds. Quota and rate
/// signals matter because they pick between retry and template
/// fallback.
fn classify_prompt_error(model: &str, message: &str) -> LlmError {
    let lower = message.to_lowercase();
    if lower.contains("quota") || lower.contains("billing") {
        LlmError::QuotaExceeded {
            provider: model.to_string(),
        }
    } else if lower.contains("rate limit") || lower.contains("429") {
        LlmError::RateLimited {
            provider: model.to_string(),
            retry_after: None,
        }
    } else if lower.contains("401") || lower.contains("unauthorized") {
        LlmError::AuthFailed {
            provider: model.to_string(),
        }
    } else {
        LlmError::RequestFailed {
            provider: model.to_string(),
            reason: message.to_string(),
        }
    }
}
