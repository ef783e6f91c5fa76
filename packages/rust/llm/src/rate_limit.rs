//! Sliding-window call budget shared by every caller of the model.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Allows at most `max_calls` acquisitions per rolling `period`.
///
/// Acquisition blocks until budget frees up; it never fails. Built on
/// tokio's monotonic clock, so tests can drive it with a paused runtime.
/// Share it behind an `Arc`.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    /// Start times of the calls still inside the window, oldest first.
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// `max_calls` is clamped to at least 1.
    pub fn new(max_calls: u32, period: Duration) -> Self {
        let max_calls = max_calls.max(1) as usize;
        Self {
            max_calls,
            period,
            window: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    /// Wait until a call fits in the window, then record it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut window = self.window.lock().await;
                let now = Instant::now();

                while let Some(&oldest) = window.front() {
                    if now.duration_since(oldest) >= self.period {
                        window.pop_front();
                    } else {
                        break;
                    }
                }

                if window.len() < self.max_calls {
                    window.push_back(now);
                    return;
                }

                // Full: the oldest entry is the next one to expire.
                match window.front() {
                    Some(&oldest) => self.period.saturating_sub(now.duration_since(oldest)),
                    None => Duration::ZERO,
                }
            };

            debug!(
                wait_ms = wait.as_millis() as u64,
                max_calls = self.max_calls,
                "rate limit budget exhausted, waiting"
            );
            tokio::time::sleep(wait).await;
        }
    }
}
