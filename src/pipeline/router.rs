//! Search strategy selection.

use serde::Serialize;

use super::classifier::Complexity;

/// Which search path a run takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// One bounded web search.
    SimpleSearch,
    /// Concurrent search across every required source kind.
    ResearchSearch,
}

/// Pick the search path for a routing mode.
///
/// `research` and `deep` fan out; anything else, including no mode, takes
/// the simple path.
pub fn route(mode: Option<Complexity>) -> SearchStrategy {
    match mode {
        Some(Complexity::Research | Complexity::Deep) => SearchStrategy::ResearchSearch,
        Some(Complexity::Simple) | None => SearchStrategy::SimpleSearch,
    }
}
