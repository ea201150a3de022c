//! Error types for language-model providers.
//!
//! Each variant carries a stable code (SCREAMING_SNAKE_CASE) included in the
//! Display output and accessible via [`LlmError::code()`].

/// Stable codes shown in the `[CODE] message` display form.
pub mod error_codes {
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
    pub const AUTH_FAILED: &str = "AUTH_FAILED";
    pub const REQUEST_FAILED: &str = "REQUEST_FAILED";
    pub const STREAM_FAILED: &str = "STREAM_FAILED";
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";
    pub const PROVIDER_ERROR: &str = "PROVIDER_ERROR";
}

/// Errors produced by language-model providers.
///
/// The Display impl formats as `[CODE] message`.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Invalid or missing configuration.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    ConfigError(String),

    /// Authentication failed (invalid/missing API key).
    #[error("[{}] {}", error_codes::AUTH_FAILED, .0)]
    AuthError(String),

    /// Request to the provider failed.
    #[error("[{}] {}", error_codes::REQUEST_FAILED, .0)]
    RequestError(String),

    /// Streaming response encountered an error.
    #[error("[{}] {}", error_codes::STREAM_FAILED, .0)]
    StreamError(String),

    /// Request or operation timed out.
    #[error("[{}] {}", error_codes::TIMEOUT_ERROR, .0)]
    TimeoutError(String),

    /// Provider-specific error not covered by other variants.
    #[error("[{}] {}", error_codes::PROVIDER_ERROR, .0)]
    ProviderError(String),
}

impl LlmError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => error_codes::CONFIG_INVALID,
            Self::AuthError(_) => error_codes::AUTH_FAILED,
            Self::RequestError(_) => error_codes::REQUEST_FAILED,
            Self::StreamError(_) => error_codes::STREAM_FAILED,
            Self::TimeoutError(_) => error_codes::TIMEOUT_ERROR,
            Self::ProviderError(_) => error_codes::PROVIDER_ERROR,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::ConfigError(m)
            | Self::AuthError(m)
            | Self::RequestError(m)
            | Self::StreamError(m)
            | Self::TimeoutError(m)
            | Self::ProviderError(m) => m,
        }
    }

    /// Whether this is a transient failure worth retrying elsewhere.
    ///
    /// Network errors, rate limits, server errors and stream interruptions
    /// are retryable. Configuration and authentication failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConfigError(_) | Self::AuthError(_) => false,
            Self::RequestError(_)
            | Self::StreamError(_)
            | Self::TimeoutError(_)
            | Self::ProviderError(_) => true,
        }
    }
}
