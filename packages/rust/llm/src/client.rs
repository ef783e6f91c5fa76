//! The LLM client: model-key resolution, rate limiting, and transient retry.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use dialoguegen_shared::{DialogueGenError, LlmRetryConfig, Result};

use crate::backoff::Backoff;
use crate::provider::GenerationModel;
use crate::rate_limit::RateLimiter;

/// Attempt budget and backoff curve for transient faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    /// Total attempts, including the first. Clamped to at least 1.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

impl From<&LlmRetryConfig> for RetrySettings {
    fn from(config: &LlmRetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: Backoff::new(
                Duration::from_millis(config.backoff_base_ms),
                Duration::from_millis(config.backoff_cap_ms),
            ),
        }
    }
}

/// Sends prompts to the remote model under a shared call budget.
///
/// Cheap to clone; clones share the provider and the rate limiter.
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn GenerationModel>,
    limiter: Arc<RateLimiter>,
    /// Model key → provider model identifier.
    models: BTreeMap<String, String>,
    retry: RetrySettings,
}

impl LlmClient {
    pub fn new(
        provider: Arc<dyn GenerationModel>,
        limiter: Arc<RateLimiter>,
        models: BTreeMap<String, String>,
        retry: RetrySettings,
    ) -> Self {
        Self {
            provider,
            limiter,
            models,
            retry,
        }
    }

    /// Send `prompt` to the model registered under `model_key` and return its
    /// raw text.
    ///
    /// Transient faults are retried with backoff; running out of attempts
    /// yields `LlmExhausted`. Any other fault yields `LlmInvocation` at once.
    #[instrument(skip_all, fields(model_key = %model_key, prompt_len = prompt.len()))]
    pub async fn generate(&self, prompt: &str, model_key: &str) -> Result<String> {
        let model_id = self.models.get(model_key).ok_or_else(|| {
            DialogueGenError::LlmInvocation {
                model: model_key.to_string(),
                message: "unknown model key".into(),
            }
        })?;

        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            self.limiter.acquire().await;

            let started = Instant::now();
            match self.provider.generate(model_id, prompt).await {
                Ok(text) => {
                    info!(
                        attempt,
                        duration_ms = started.elapsed().as_millis() as u64,
                        response_len = text.len(),
                        "model call succeeded"
                    );
                    return Ok(text);
                }
                Err(e) if e.is_transient() => {
                    last_error = e.to_string();
                    if attempt == max_attempts {
                        break;
                    }
                    let delay = self.retry.backoff.delay(attempt - 1);
                    warn!(
                        attempt,
                        max_attempts,
                        classification = "transient",
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "model call failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        attempt,
                        classification = "non-transient",
                        error = %e,
                        "model call failed"
                    );
                    return Err(DialogueGenError::LlmInvocation {
                        model: model_id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        error!(attempts = max_attempts, error = %last_error, "model call attempts exhausted");
        Err(DialogueGenError::LlmExhausted {
            model: model_id.clone(),
            attempts: max_attempts,
            last_error,
        })
    }
}
