//! Capped exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// `delay(n) = min(base * 2^n + jitter, cap)`, jitter uniform in `[0, 1)` seconds.
///
/// `n` is the zero-based retry index: the first retry waits `base` plus jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
        }
    }
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay before retry `retry` with a fresh random jitter.
    pub fn delay(&self, retry: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.0..1.0);
        self.delay_with_jitter(retry, jitter)
    }

    /// Deterministic form of [`Backoff::delay`].
    pub fn delay_with_jitter(&self, retry: u32, jitter_secs: f64) -> Duration {
        let exp = self.base.as_secs_f64() * 2f64.powi(retry.min(30) as i32);
        let secs = (exp + jitter_secs).min(self.cap.as_secs_f64());
        Duration::from_secs_f64(secs.max(0.0))
    }
}
