//! Generation calls with bounded retry.

use std::sync::Arc;

use tracing::{debug, warn};

use sdgscan_provider::GenerationCapability;
use sdgscan_shared::{Result, RetryConfig};

use crate::prompt::AnalysisPrompt;
use crate::response::RawModelOutput;

/// Sends prompts to a [`GenerationCapability`], retrying transient failures.
///
/// Only retryable transport errors are retried, with exponential backoff
/// (`initial_delay_ms * 2^n`, capped at `max_delay_ms`) for at most
/// `max_attempts` attempts in total.
#[derive(Clone)]
pub struct GenerationInvoker {
    capability: Arc<dyn GenerationCapability>,
    retry: RetryConfig,
}

impl GenerationInvoker {
    pub fn new(capability: Arc<dyn GenerationCapability>, retry: RetryConfig) -> Self {
        Self { capability, retry }
    }

    pub fn capability(&self) -> &dyn GenerationCapability {
        self.capability.as_ref()
    }

    /// Fail fast if the capability cannot serve any call.
    pub fn ensure_available(&self) -> Result<()> {
        self.capability.ensure_available()
    }

    /// Send one prompt and return the model's raw text.
    pub async fn invoke(&self, prompt: &AnalysisPrompt) -> Result<RawModelOutput> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.capability.generate_text(prompt.as_str()).await {
                Ok(text) => {
                    debug!(attempt, provider = self.capability.name(), "generation succeeded");
                    return Ok(RawModelOutput::new(text));
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "generation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
