//! Rate-limited, retrying access to the remote generation model.
//!
//! This crate provides:
//! - [`RateLimiter`]: process-wide sliding-window call budget
//! - [`Backoff`]: capped exponential backoff with jitter
//! - [`GenerationModel`]: the provider seam, with [`GeminiProvider`] as the default
//! - [`LlmClient`]: ties the three together and classifies provider faults

mod backoff;
mod client;
mod gemini;
mod provider;
mod rate_limit;

pub use backoff::Backoff;
pub use client::{LlmClient, RetrySettings};
pub use gemini::GeminiProvider;
pub use provider::{GenerationModel, ProviderError};
pub use rate_limit::RateLimiter;
