//! Primary → secondary LLM failover.
//!
//! Selection policy: try the primary (with backoff on transient
//! errors), then the secondary, then let the caller fall back to a
//! template. Quota exhaustion skips straight to the next option.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::LlmError;
use crate::llm::LlmClient;
use crate::retry::with_backoff;

/// Retry attempts against the primary before failing over.
const PRIMARY_ATTEMPTS: u32 = 3;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

pub struct FailoverClient {
    primary: Arc<dyn LlmClient>,
    secondary: Option<Arc<dyn LlmClient>>,
}

impl FailoverClient {
    pub fn new(primary: Arc<dyn LlmClient>, secondary: Option<Arc<dyn LlmClient>>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl LlmClient for FailoverClient {
    fn model_name(&self) -> &str {
        self.primary.model_name()
    }

    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, LlmError> {
        let primary_result = with_backoff(
            "llm.generate",
            PRIMARY_ATTEMPTS,
            RETRY_BASE_DELAY,
            LlmError::is_transient,
            || self.primary.generate(prompt, timeout),
        )
        .await;

        let primary_error = match primary_result {
            Ok(text) => return Ok(text),
            Err(e) => e,
        };

        let Some(secondary) = &self.secondary else {
            return Err(primary_error);
        };

        warn!(
            primary = self.primary.model_name(),
            secondary = secondary.model_name(),
            error = %primary_error,
            "Primary LLM failed, trying secondary"
        );
        secondary.generate(prompt, timeout).await
    }
}
