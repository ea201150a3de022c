//! Pipeline phases and their forward-only ordering.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Observable stage of a run, in strict forward order.
///
/// `Searching` and `Reading` are alternatives on the usual path, but a
/// run that crawls its search hits passes through both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelinePhase {
    Analyzing,
    Searching,
    Reading,
    Retrieving,
    Synthesizing,
    Generating,
    Done,
    Error,
}

impl PipelinePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analyzing => "analyzing",
            Self::Searching => "searching",
            Self::Reading => "reading",
            Self::Retrieving => "retrieving",
            Self::Synthesizing => "synthesizing",
            Self::Generating => "generating",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    /// Whether the phase ends a run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Whether a run in `self` may move to `next`.
    ///
    /// Moves go strictly forward. `Error` is reachable from any live phase.
    pub fn can_advance_to(self, next: PipelinePhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Self::Error || next > self
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
