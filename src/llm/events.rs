//! Normalized streaming event model for language-model providers.
//!
//! A typical stream flows:
//! ```text
//! StreamStart → TextDelta* → StreamEnd
//! ```
//! A `StreamError` may appear at any point and ends the useful output.

/// A normalized streaming event from any provider.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmEvent {
    /// Stream has started. First event in every stream.
    StreamStart {
        /// Provider request identifier.
        request_id: String,
        /// The model serving the request.
        model: String,
    },

    /// A chunk of generated text.
    TextDelta {
        /// The text fragment.
        text: String,
    },

    /// Generation finished.
    StreamEnd {
        /// Why generation stopped.
        finish_reason: FinishReason,
    },

    /// The provider reported an error mid-stream.
    StreamError {
        /// Human-readable error description.
        error: String,
    },
}

/// Why a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural stop (end of response).
    Stop,
    /// Hit the max token limit.
    Length,
    /// Content was filtered by safety systems.
    ContentFilter,
    /// Provider-specific or unknown reason.
    Other,
}

impl FinishReason {
    /// Map an OpenAI-style `finish_reason` string.
    pub fn from_openai(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "content_filter" => Self::ContentFilter,
            _ => Self::Other,
        }
    }

    /// Map an Anthropic `stop_reason` string.
    pub fn from_anthropic(reason: &str) -> Self {
        match reason {
            "end_turn" | "stop_sequence" => Self::Stop,
            "max_tokens" => Self::Length,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stop => write!(f, "stop"),
            Self::Length => write!(f, "length"),
            Self::ContentFilter => write!(f, "content_filter"),
            Self::Other => write!(f, "other"),
        }
    }
}
