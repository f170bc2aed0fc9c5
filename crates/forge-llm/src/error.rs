//! LLM provider errors.

use thiserror::Error;

/// Errors an [`crate::LlmProvider`] can surface to its caller.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key was configured for a provider that requires one.
    #[error("API key not configured for {provider}")]
    ApiKeyNotConfigured {
        /// The provider name.
        provider: String,
    },

    /// The HTTP request to the provider failed outright.
    #[error("API request failed: {0}")]
    ApiRequestFailed(String),

    /// The provider is rate limiting this client.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The provider's response could not be parsed into our types.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// A streamed chunk could not be decoded.
    #[error("streaming error: {0}")]
    StreamingError(String),

    /// The request would exceed the provider's context window.
    #[error("context length exceeded: {current} tokens, max is {max}")]
    ContextLengthExceeded {
        /// Tokens in the current request.
        current: usize,
        /// The provider's maximum context length.
        max: usize,
    },

    /// The provider configuration itself is invalid (bad URL, bad header
    /// characters in the API key, etc).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Transport-level failure surfaced directly from `reqwest`.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<LlmError> for forge_core::ForgeError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::ApiKeyNotConfigured { provider } => {
                Self::LlmAuth(format!("API key not configured for {provider}"))
            }
            LlmError::RateLimitExceeded { retry_after_secs } => Self::LlmRateLimit {
                retry_after_ms: retry_after_secs.saturating_mul(1000),
            },
            LlmError::ApiRequestFailed(reason) => Self::LlmUnavailable(reason),
            LlmError::Http(e) => Self::LlmUnavailable(e.to_string()),
            LlmError::InvalidResponse(reason) | LlmError::StreamingError(reason) => {
                Self::LlmStreamError(reason)
            }
            LlmError::ContextLengthExceeded { current, max } => Self::LimitExceeded {
                limit: "context_window".to_string(),
                cap: max as u64,
                reached: current as u64,
            },
            LlmError::ConfigError(reason) => Self::Internal(reason),
        }
    }
}

/// Result alias for this crate.
pub type LlmResult<T> = Result<T, LlmError>;
