//! Events streamed to the caller of a run.

use serde::{Deserialize, Serialize};

use super::citation::Citation;
use super::classifier::{Classification, Complexity};
use super::phase::PipelinePhase;
use super::sources::SourceKind;

/// One streamed event. Serialised with a `type` tag.
///
/// A stream ends with exactly one [`StreamEvent::Done`] or
/// [`StreamEvent::Error`], and nothing follows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// A new phase has started.
    Status { phase: PipelinePhase },
    Citation { citation: Citation },
    /// A fragment of generated text.
    Content { text: String },
    /// Detected classification and the tier used for routing.
    Mode {
        complexity: Complexity,
        intent: String,
        domains: Vec<String>,
        sources: Vec<SourceKind>,
        routed_as: Complexity,
    },
    Done,
    Error { message: String },
}

impl StreamEvent {
    pub fn status(phase: PipelinePhase) -> Self {
        Self::Status { phase }
    }

    pub fn mode(classification: &Classification, routed_as: Complexity) -> Self {
        Self::Mode {
            complexity: classification.complexity,
            intent: classification.intent.clone(),
            domains: classification.domains.clone(),
            sources: classification.sources.clone(),
            routed_as,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// JSON form sent on the wire.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"event serialization failed: {e}"}}"#)
        })
    }
}
