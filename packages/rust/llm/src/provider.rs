//! The remote generation model seam.

use async_trait::async_trait;

/// A fault reported by (or on the way to) the remote model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Service unavailable / overloaded, or the connection never completed.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Upstream quota exhausted.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// HTTP 429 without a more specific upstream status.
    #[error("too many requests: {0}")]
    TooManyRequests(String),

    /// Upstream internal server error.
    #[error("internal server error: {0}")]
    Internal(String),

    /// Any other API error (bad request, auth, unknown model).
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request could not be built or sent for a non-network reason.
    #[error("malformed request: {0}")]
    InvalidRequest(String),

    /// The call succeeded but the body was not a usable generation result.
    #[error("unusable response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether waiting and trying again can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_)
                | Self::ResourceExhausted(_)
                | Self::TooManyRequests(_)
                | Self::Internal(_)
        )
    }
}

/// Sends a prompt to one model and returns its text.
#[async_trait]
pub trait GenerationModel: Send + Sync {
    async fn generate(&self, model_id: &str, prompt: &str) -> Result<String, ProviderError>;
}
