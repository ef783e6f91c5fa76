//! Stage-level retry policy applied by the orchestrator.
//!
//! Distinct from the LLM client's transient-fault retry: a stage retry
//! re-runs the whole stage body.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use dialoguegen_shared::{Result, StageRetryConfig};

use crate::pipeline::Stage;

/// Attempt budget with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Clamped to at least 1.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run once, never retry.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The last error is returned unchanged.
    pub async fn run<T, Op, Fut>(&self, stage: Stage, mut op: Op) -> Result<T>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts && e.is_stage_retryable() => {
                    warn!(
                        %stage,
                        attempt,
                        max_attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %e,
                        "stage attempt failed, retrying"
                    );
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl From<&StageRetryConfig> for RetryPolicy {
    fn from(config: &StageRetryConfig) -> Self {
        Self::new(config.attempts, Duration::from_secs(config.delay_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dialoguegen_shared::DialogueGenError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn retries_retryable_errors_with_fixed_delay() {
        let policy = RetryPolicy::new(2, Duration::from_secs(10));
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let value = policy
            .run(Stage::Extracting, || {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(DialogueGenError::extraction("a.pdf", "flaky"))
                    } else {
                        Ok("text")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "text");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_budget() {
        let policy = RetryPolicy::new(2, Duration::from_secs(15));
        let calls = AtomicU32::new(0);

        let err = policy
            .run(Stage::Generating, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(DialogueGenError::NoDialoguesGenerated) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DialogueGenError::NoDialoguesGenerated));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_stops_immediately() {
        let policy = RetryPolicy::new(5, Duration::from_secs(15));
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let err = policy
            .run(Stage::Generating, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(DialogueGenError::LlmInvocation {
                        model: "m".into(),
                        message: "400".into(),
                    })
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DialogueGenError::LlmInvocation { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn none_runs_once() {
        let calls = AtomicU32::new(0);
        let _ = RetryPolicy::none()
            .run(Stage::Validating, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(DialogueGenError::extraction("x", "y")) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn from_stage_config() {
        let policy = RetryPolicy::from(&StageRetryConfig {
            attempts: 2,
            delay_secs: 15,
        });
        assert_eq!(policy, RetryPolicy::new(2, Duration::from_secs(15)));
    }
}
