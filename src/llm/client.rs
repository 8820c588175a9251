//! The LLM capability surface the pipeline sees.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::LlmError;

/// A scoped text generator. The pipeline sends one short, scrubbed
/// prompt per draft and expects plain text back within the timeout.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Model identifier, for logs and cost accounting.
    fn model_name(&self) -> &str;

    /// Generate a completion for a single prompt. Implementations must
    /// return [`LlmError::EmptyResponse`] rather than an empty string.
    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, LlmError>;
}
