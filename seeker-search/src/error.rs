//! Error types for the seeker-search crate.
//!
//! All errors carry stable, human-readable messages. No API keys or query
//! text appear in error messages.

/// Errors that can occur while searching sources or crawling pages.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// An operation exceeded its time budget.
    #[error("timed out: {0}")]
    Timeout(String),

    /// An HTTP request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A response body could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The backing service or index is not configured or disabled.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The headless browser could not be launched or driven.
    #[error("browser error: {0}")]
    Browser(String),
}

impl SearchError {
    /// Whether this error means "not configured" rather than "failed".
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Convenience type alias for seeker-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
