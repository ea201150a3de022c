//! Inbound query contract.

use serde::{Deserialize, Serialize};

use super::classifier::Complexity;
use crate::error::PipelineError;
use crate::llm::Message;

/// Longest accepted query text, in characters.
pub const MAX_MESSAGE_CHARS: usize = 10_000;

/// Most explicit URLs accepted on one query.
pub const MAX_EXPLICIT_URLS: usize = 10;

/// One user query as received from the API layer.
///
/// Immutable once a run starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// The natural-language question.
    pub message: String,
    /// Caller-confirmed complexity tier. Overrides routing only.
    #[serde(default)]
    pub mode: Option<Complexity>,
    /// Pages to read instead of searching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit_urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub chat_history: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

impl Query {
    /// Create a query with only the message text set.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Set the confirmed mode.
    pub fn with_mode(mut self, mode: Complexity) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Set explicit URLs to read.
    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.explicit_urls = Some(urls);
        self
    }

    /// Set the user identifier used for personalised retrieval.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Explicit URLs, empty when none were given.
    pub fn urls(&self) -> &[String] {
        self.explicit_urls.as_deref().unwrap_or_default()
    }

    /// Whether the answer depends on more than the query text and mode.
    pub fn is_cacheable(&self) -> bool {
        self.urls().is_empty() && self.chat_history.is_empty()
    }

    /// Check the message length and URL list.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidQuery`] describing the first problem.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let chars = self.message.trim().chars().count();
        if chars == 0 {
            return Err(PipelineError::InvalidQuery("message must not be empty".into()));
        }
        if self.message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(PipelineError::InvalidQuery(format!(
                "message exceeds {MAX_MESSAGE_CHARS} characters"
            )));
        }
        if let Some(urls) = &self.explicit_urls {
            if urls.is_empty() || urls.len() > MAX_EXPLICIT_URLS {
                return Err(PipelineError::InvalidQuery(format!(
                    "explicit_urls must hold 1 to {MAX_EXPLICIT_URLS} URLs"
                )));
            }
            if let Some(bad) = urls.iter().find(|u| !seeker_search::url_util::is_http_url(u)) {
                return Err(PipelineError::InvalidQuery(format!(
                    "not an http(s) URL: {bad}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn deserializes_inbound_contract() {
        let query: Query = serde_json::from_str(
            r#"{
                "message": "what is rust",
                "mode": "research",
                "user_id": "u1",
                "chat_history": [{"role": "user", "content": "hi"}]
            }"#,
        )
        .unwrap();
        assert_eq!(query.mode, Some(Complexity::Research));
        assert_eq!(query.chat_history.len(), 1);
        assert!(query.urls().is_empty());
        assert!(!query.is_cacheable());
    }

    #[test]
    fn rejects_empty_and_oversized_messages() {
        assert!(Query::new("   ").validate().is_err());
        assert!(Query::new("x".repeat(MAX_MESSAGE_CHARS + 1)).validate().is_err());
        assert!(Query::new("x".repeat(MAX_MESSAGE_CHARS)).validate().is_ok());
    }

    #[test]
    fn validates_explicit_urls() {
        let ok = Query::new("summarise").with_urls(vec!["https://example.com/a".into()]);
        assert!(ok.validate().is_ok());
        assert!(!ok.is_cacheable());

        let empty = Query::new("summarise").with_urls(Vec::new());
        assert!(empty.validate().is_err());

        let too_many = Query::new("summarise")
            .with_urls((0..11).map(|i| format!("https://example.com/{i}")).collect());
        assert!(too_many.validate().is_err());

        let ftp = Query::new("summarise").with_urls(vec!["ftp://example.com".into()]);
        let err = ftp.validate().unwrap_err();
        assert!(err.to_string().contains("ftp://example.com"));
    }
}
