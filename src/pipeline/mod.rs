//! Query orchestration pipeline.
//!
//! Stages, in run order:
//!
//! 1. [`classifier`] labels the query (model call with heuristic fallback)
//! 2. [`router`] picks the simple or research search path
//! 3. [`fanout`] runs the source searches under per-branch timeouts, or
//!    [`reader`] crawls explicit URLs
//! 4. [`retriever`] adds best-effort context from external indexes
//! 5. [`citation`] numbers the usable evidence
//! 6. [`synthesizer`] builds the grounding prompt for generation
//!
//! [`orchestrator::Pipeline`] drives a run and streams [`events::StreamEvent`]s.
//! [`cache::ResponseCache`] short-circuits repeated queries.

pub mod cache;
pub mod citation;
pub mod classifier;
pub mod events;
pub mod fanout;
pub mod orchestrator;
pub mod phase;
pub mod query;
pub mod reader;
pub mod retriever;
pub mod router;
pub mod sources;
pub mod state;
pub mod synthesizer;

pub use cache::{CachedResponse, ResponseCache};
pub use citation::Citation;
pub use classifier::{Classification, Classifier, Complexity};
pub use events::StreamEvent;
pub use orchestrator::{Answer, EventStream, Pipeline};
pub use phase::PipelinePhase;
pub use query::Query;
pub use reader::PageReader;
pub use retriever::{HttpVectorIndex, RetrievedContext, Retriever, VectorIndex};
pub use router::SearchStrategy;
pub use sources::{Searchers, SourceKind, SourceResult, SourceSearcher};
pub use state::PipelineState;
