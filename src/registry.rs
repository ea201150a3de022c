//! Static tool registry.
//!
//! Each pipeline component that is useful on its own is exposed as a named
//! tool with JSON arguments and a JSON result. The set is fixed at compile
//! time; [`ToolRegistry::builtin`] builds it once at startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use seeker_search::{CrawlEngine, Crawler};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::pipeline::cache::mode_key;
use crate::pipeline::{Complexity, Pipeline, SourceKind};

/// Errors returned by tool execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("tool failed: {0}")]
    Execution(String),
}

/// Availability of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Active,
    /// Listed but not executable, e.g. a cache tool while caching is off.
    Disabled,
}

/// Manifest entry for one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolMetadata {
    pub name: &'static str,
    pub category: &'static str,
    pub description: &'static str,
    pub status: ToolStatus,
    /// JSON schema of the arguments.
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    QueryAnalyzer,
    WebSearch,
    WebCrawl,
    ArxivSearch,
    YoutubeSearch,
    RagRetrieval,
    ResponseCache,
}

/// Components a tool call may use.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub pipeline: Arc<Pipeline>,
    pub crawler: Arc<Crawler>,
}

#[derive(Deserialize)]
struct QueryArgs {
    query: String,
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

#[derive(Deserialize)]
struct CrawlArgs {
    urls: Vec<String>,
    #[serde(default)]
    engine: CrawlEngine,
}

#[derive(Deserialize)]
struct RetrievalArgs {
    query: String,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum CacheArgs {
    Stats,
    Clear,
    Get {
        query: String,
        #[serde(default)]
        mode: Option<Complexity>,
    },
}

fn parse<T: DeserializeOwned>(args: serde_json::Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

fn non_empty(query: &str) -> Result<&str, ToolError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ToolError::InvalidArguments("query must not be empty".into()));
    }
    Ok(trimmed)
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Execution(e.to_string()))
}

fn query_schema(extra: serde_json::Value) -> serde_json::Value {
    let mut properties = serde_json::json!({
        "query": { "type": "string", "description": "Search query" }
    });
    if let (Some(props), Some(extra)) = (properties.as_object_mut(), extra.as_object()) {
        props.extend(extra.clone());
    }
    serde_json::json!({ "type": "object", "properties": properties, "required": ["query"] })
}

/// Named tools backed by pipeline components.
#[derive(Debug)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, (ToolMetadata, Builtin)>,
}

impl ToolRegistry {
    /// The fixed tool set. Cache tooling is disabled when `cache_enabled` is false.
    pub fn builtin(cache_enabled: bool) -> Self {
        let max_results = serde_json::json!({
            "max_results": { "type": "integer", "description": "Maximum results" }
        });
        let entries = [
            (
                Builtin::QueryAnalyzer,
                "query_analyzer",
                "analysis",
                "Classify a query's complexity, intent, domains and required sources.",
                query_schema(serde_json::json!({})),
            ),
            (
                Builtin::WebSearch,
                "web_search",
                "search",
                "Search the web. Returns titles, URLs and snippets.",
                query_schema(max_results.clone()),
            ),
            (
                Builtin::WebCrawl,
                "web_crawl",
                "search",
                "Fetch pages and extract readable text, choosing static or rendered crawling per URL.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "urls": { "type": "array", "items": { "type": "string" }, "minItems": 1, "maxItems": 10 },
                        "engine": { "type": "string", "enum": ["auto", "static", "rendered"] }
                    },
                    "required": ["urls"]
                }),
            ),
            (
                Builtin::ArxivSearch,
                "arxiv_search",
                "academic",
                "Search arXiv papers. Returns titles, authors, abstracts and PDF links.",
                query_schema(max_results.clone()),
            ),
            (
                Builtin::YoutubeSearch,
                "youtube_search",
                "media",
                "Search YouTube videos and attach transcripts where available.",
                query_schema(max_results),
            ),
            (
                Builtin::RagRetrieval,
                "rag_retrieval",
                "knowledge",
                "Look up related context in the academic and conversation indexes.",
                query_schema(serde_json::json!({
                    "user_id": { "type": "string", "description": "Include this user's conversation index" }
                })),
            ),
            (
                Builtin::ResponseCache,
                "response_cache",
                "knowledge",
                "Inspect or clear the answer cache.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "action": { "type": "string", "enum": ["stats", "clear", "get"] },
                        "query": { "type": "string" },
                        "mode": { "type": "string", "enum": ["simple", "research", "deep"] }
                    },
                    "required": ["action"]
                }),
            ),
        ];

        let tools = entries
            .into_iter()
            .map(|(builtin, name, category, description, parameters)| {
                let status = if builtin == Builtin::ResponseCache && !cache_enabled {
                    ToolStatus::Disabled
                } else {
                    ToolStatus::Active
                };
                let meta = ToolMetadata {
                    name,
                    category,
                    description,
                    status,
                    parameters,
                };
                (name, (meta, builtin))
            })
            .collect();
        Self { tools }
    }

    /// Manifest of every tool, sorted by name.
    pub fn list(&self) -> Vec<&ToolMetadata> {
        self.tools.values().map(|(meta, _)| meta).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolMetadata> {
        self.tools.get(name).map(|(meta, _)| meta)
    }

    /// Distinct categories, sorted.
    pub fn categories(&self) -> Vec<&'static str> {
        let mut categories: Vec<&'static str> = self.tools.values().map(|(m, _)| m.category).collect();
        categories.sort_unstable();
        categories.dedup();
        categories
    }

    /// Run a tool with JSON arguments.
    ///
    /// # Errors
    ///
    /// [`ToolError::NotFound`] for an unknown or disabled tool,
    /// [`ToolError::InvalidArguments`] for malformed arguments and
    /// [`ToolError::Execution`] when the component fails.
    pub async fn execute(
        &self,
        name: &str,
        args: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, ToolError> {
        let (meta, builtin) = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_owned()))?;
        if meta.status != ToolStatus::Active {
            return Err(ToolError::NotFound(format!("{name} (disabled)")));
        }
        tracing::debug!(tool = name, "executing tool");

        match builtin {
            Builtin::QueryAnalyzer => {
                let args: QueryArgs = parse(args)?;
                let classification = ctx.pipeline.classifier().classify(non_empty(&args.query)?).await;
                to_json(&classification)
            }
            Builtin::WebSearch | Builtin::ArxivSearch | Builtin::YoutubeSearch => {
                let args: SearchArgs = parse(args)?;
                let query = non_empty(&args.query)?;
                let kind = match builtin {
                    Builtin::ArxivSearch => SourceKind::Arxiv,
                    Builtin::YoutubeSearch => SourceKind::Youtube,
                    _ => SourceKind::Web,
                };
                let results = ctx
                    .pipeline
                    .searchers()
                    .get(kind)
                    .search(query, args.max_results.unwrap_or(5))
                    .await
                    .map_err(|e| ToolError::Execution(format!("{kind} search failed: {e}")))?;
                to_json(&results)
            }
            Builtin::WebCrawl => {
                let args: CrawlArgs = parse(args)?;
                if args.urls.is_empty() || args.urls.len() > 10 {
                    return Err(ToolError::InvalidArguments("urls must hold 1 to 10 URLs".into()));
                }
                to_json(&ctx.crawler.crawl(&args.urls, args.engine).await)
            }
            Builtin::RagRetrieval => {
                let args: RetrievalArgs = parse(args)?;
                let context = ctx
                    .pipeline
                    .retriever()
                    .retrieve(non_empty(&args.query)?, args.user_id.as_deref())
                    .await;
                to_json(&context)
            }
            Builtin::ResponseCache => {
                let cache = ctx
                    .pipeline
                    .cache()
                    .ok_or_else(|| ToolError::Execution("response cache is disabled".into()))?;
                match parse::<CacheArgs>(args)? {
                    CacheArgs::Stats => Ok(serde_json::json!({
                        "entries": cache.len(),
                        "max_entries": cache.max_entries(),
                    })),
                    CacheArgs::Clear => {
                        cache.clear();
                        Ok(serde_json::json!({ "cleared": true }))
                    }
                    CacheArgs::Get { query, mode } => {
                        let hit = cache.get(&query, mode_key(mode));
                        Ok(serde_json::json!({
                            "hit": hit.is_some(),
                            "response": hit.as_ref().map(|h| h.response.clone()),
                            "citations": hit.map(|h| h.citations).unwrap_or_default(),
                        }))
                    }
                }
            }
        }
    }
}
