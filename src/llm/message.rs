//! Message and request types sent to language-model providers.
//!
//! # Examples
//!
//! ```
//! use seeker::llm::message::{Message, Role};
//!
//! let msg = Message::user("What is Rust?");
//! assert_eq!(msg.role, Role::User);
//! ```

use serde::{Deserialize, Serialize};

/// The role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant (model) output.
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message.
    pub role: Role,
    /// Plain text content.
    pub content: String,
}

impl Message {
    /// Create a text message with the given role.
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }
}

/// Per-request generation options.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    /// Maximum tokens to generate. `None` means use provider default.
    pub max_tokens: Option<usize>,
    /// Sampling temperature (0.0 = deterministic).
    pub temperature: Option<f64>,
    /// Whether to stream the response.
    pub stream: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            max_tokens: Some(2000),
            temperature: Some(0.7),
            stream: true,
        }
    }
}

impl RequestOptions {
    /// Create request options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn options_builder() {
        let opts = RequestOptions::new().with_max_tokens(100).with_temperature(0.0);
        assert_eq!(opts.max_tokens, Some(100));
        assert_eq!(opts.temperature, Some(0.0));
        assert!(opts.stream);
    }
}
