//! Run-scoped accumulator threaded through the stages.

use super::citation::Citation;
use super::classifier::Classification;
use super::phase::PipelinePhase;
use super::query::Query;
use super::retriever::RetrievedContext;
use super::sources::SourceResult;

/// Mutable state of one run. Owned by that run only.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub query: Query,
    pub classification: Option<Classification>,
    pub web_results: Vec<SourceResult>,
    pub academic_results: Vec<SourceResult>,
    pub video_results: Vec<SourceResult>,
    pub context: Vec<RetrievedContext>,
    pub citations: Vec<Citation>,
    /// Non-fatal failures, in the order they happened.
    pub errors: Vec<String>,
    /// Generated answer text so far.
    pub response: String,
    phase: PipelinePhase,
}

impl PipelineState {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            classification: None,
            web_results: Vec::new(),
            academic_results: Vec::new(),
            video_results: Vec::new(),
            context: Vec::new(),
            citations: Vec::new(),
            errors: Vec::new(),
            response: String::new(),
            phase: PipelinePhase::Analyzing,
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    /// Move to `next` if that is a forward move. Returns whether it moved.
    pub fn advance(&mut self, next: PipelinePhase) -> bool {
        if !self.phase.can_advance_to(next) {
            tracing::debug!(from = %self.phase, to = %next, "phase change refused");
            return false;
        }
        self.phase = next;
        true
    }

    /// Record a degraded failure.
    pub fn record_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        tracing::warn!(error = %error, "degraded");
        self.errors.push(error);
    }

    /// All evidence in citation order: web, academic, video.
    pub fn evidence(&self) -> impl Iterator<Item = &SourceResult> {
        self.web_results
            .iter()
            .chain(&self.academic_results)
            .chain(&self.video_results)
    }
}
