//! Error types for the seeker pipeline.

use crate::llm::LlmError;
use seeker_search::SearchError;

/// Top-level error type for setup and fatal run failures.
///
/// Degraded failures (one source, one page, one index) never become a
/// `PipelineError`; they are recorded as strings on the run state.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Language model failure with no fallback path.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Search or crawl setup failure.
    #[error("search error: {0}")]
    Search(#[from] SearchError),

    /// Rejected inbound query.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP server error.
    #[error("server error: {0}")]
    Server(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PipelineError>;
