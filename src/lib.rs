//! Seeker: cited answers from heterogeneous evidence.
//!
//! A query is classified, routed to a simple or research search path,
//! answered from web, academic and video sources (or from pages the caller
//! names), and the answer is generated with citations and streamed back as
//! a sequence of events.
//!
//! # Architecture
//!
//! - **Pipeline** ([`pipeline`]): classifier, router, source fan-out, page
//!   reading, context retrieval, citation builder, synthesizer and the run
//!   orchestrator, plus the response cache
//! - **LLM** ([`llm`]): streaming OpenAI-compatible and Anthropic adapters
//!   behind one trait, with an optional fallback endpoint
//! - **Evidence** (`seeker-search` crate): search engines and the
//!   static/rendered page crawler
//! - **Surface** ([`server`], [`registry`]): HTTP/SSE API and the named tools

pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod registry;
pub mod server;

pub use config::SeekerConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, Query, StreamEvent};
pub use registry::ToolRegistry;
pub use server::{AppState, SeekerServer};
