//! HTTP surface for the seeker pipeline.
//!
//! ## Endpoints
//!
//! - `GET /health`
//! - `POST /v1/query`: run a query, answer streamed as SSE, one JSON event per `data:` line
//! - `POST /v1/crawl`: crawl 1 to 10 URLs
//! - `POST /v1/search-and-crawl`: web search, then crawl the hits
//! - `GET /v1/tools`, `POST /v1/tools/{name}`: the tool registry
//! - `GET /v1/cache`, `POST /v1/cache/clear`: response cache

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use futures_util::StreamExt;
use futures_util::stream::Stream;
use seeker_search::{CrawlEngine, Crawler, SearchConfig};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{SeekerConfig, ServerConfig};
use crate::error::{PipelineError, Result};
use crate::pipeline::query::MAX_EXPLICIT_URLS;
use crate::pipeline::{Pipeline, Query};
use crate::registry::{ToolContext, ToolError, ToolRegistry};

// ---------------------------------------------------------------------------
// Request and response types
// ---------------------------------------------------------------------------

/// Body of `POST /v1/crawl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub urls: Vec<String>,
    #[serde(default)]
    pub engine: CrawlEngine,
}

/// Body of `POST /v1/search-and-crawl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchAndCrawlRequest {
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub engine: CrawlEngine,
}

fn default_max_results() -> usize {
    5
}

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    /// `invalid_request_error`, `not_found_error` or `upstream_error`.
    #[serde(rename = "type")]
    pub error_type: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error_type: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: ErrorBody {
                message: message.into(),
                error_type: error_type.to_owned(),
            },
        }),
    )
}

fn bad_request(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "invalid_request_error", message)
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    crawler: Arc<Crawler>,
    registry: Arc<ToolRegistry>,
    search: Arc<SearchConfig>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, crawler: Arc<Crawler>, search: SearchConfig) -> Self {
        let registry = ToolRegistry::builtin(pipeline.cache().is_some());
        Self {
            pipeline,
            crawler,
            registry: Arc::new(registry),
            search: Arc::new(search),
        }
    }

    /// Build the crawler and pipeline from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the crawler or a provider cannot be built.
    pub fn from_config(config: &SeekerConfig) -> Result<Self> {
        let crawler = Arc::new(Crawler::new(config.crawl.clone())?);
        let pipeline = Pipeline::from_config(config, crawler.clone())?;
        Ok(Self::new(Arc::new(pipeline), crawler, config.search.clone()))
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    fn tool_context(&self) -> ToolContext {
        ToolContext {
            pipeline: Arc::clone(&self.pipeline),
            crawler: Arc::clone(&self.crawler),
        }
    }
}

/// The route table.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/v1/query", post(handle_query))
        .route("/v1/crawl", post(handle_crawl))
        .route("/v1/search-and-crawl", post(handle_search_and_crawl))
        .route("/v1/tools", get(handle_list_tools))
        .route("/v1/tools/{name}", post(handle_execute_tool))
        .route("/v1/cache", get(handle_cache_stats))
        .route("/v1/cache/clear", post(handle_cache_clear))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// SeekerServer
// ---------------------------------------------------------------------------

/// Running HTTP server. Dropping it stops the listener.
pub struct SeekerServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl SeekerServer {
    /// Bind to `{config.host}:{config.port}` (port `0` auto-assigns) and
    /// serve in a background task.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot bind.
    pub async fn start(state: AppState, config: &ServerConfig) -> Result<Self> {
        let bind_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| PipelineError::Server(format!("bind {bind_addr} failed: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| PipelineError::Server(format!("failed to get local addr: {e}")))?;

        info!("seeker listening on http://{addr}");

        let app = router(state);
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait until the server task exits.
    pub async fn wait(&mut self) {
        if let Err(e) = (&mut self.handle).await
            && !e.is_cancelled()
        {
            tracing::error!("server task failed: {e}");
        }
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for SeekerServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /v1/query`: validate, then stream the run as SSE.
///
/// A client disconnect drops the event stream, which cancels the run.
async fn handle_query(
    State(state): State<AppState>,
    Json(query): Json<Query>,
) -> std::result::Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>, ApiError>
{
    query.validate().map_err(|e| bad_request(e.to_string()))?;

    let (mut events, cancel) = state.pipeline.stream(query);
    let stream = async_stream::stream! {
        let _guard = cancel.drop_guard();
        while let Some(event) = events.next().await {
            let terminal = event.is_terminal();
            yield Ok::<_, Infallible>(Event::default().data(event.to_json()));
            if terminal {
                break;
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn validate_urls(urls: &[String]) -> std::result::Result<(), ApiError> {
    if urls.is_empty() || urls.len() > MAX_EXPLICIT_URLS {
        return Err(bad_request(format!(
            "urls must hold 1 to {MAX_EXPLICIT_URLS} URLs"
        )));
    }
    if let Some(bad) = urls.iter().find(|u| !seeker_search::url_util::is_http_url(u)) {
        return Err(bad_request(format!("not an http(s) URL: {bad}")));
    }
    Ok(())
}

async fn handle_crawl(
    State(state): State<AppState>,
    Json(request): Json<CrawlRequest>,
) -> std::result::Result<Response, ApiError> {
    validate_urls(&request.urls)?;
    let result = state.crawler.crawl(&request.urls, request.engine).await;
    Ok(Json(result).into_response())
}

async fn handle_search_and_crawl(
    State(state): State<AppState>,
    Json(request): Json<SearchAndCrawlRequest>,
) -> std::result::Result<Response, ApiError> {
    if request.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    if !(1..=10).contains(&request.max_results) {
        return Err(bad_request("max_results must be between 1 and 10"));
    }
    let result = seeker_search::search_and_crawl(
        &state.crawler,
        &request.query,
        request.max_results,
        request.engine,
        &state.search,
    )
    .await
    .map_err(|e| api_error(StatusCode::BAD_GATEWAY, "upstream_error", format!("search failed: {e}")))?;
    Ok(Json(result).into_response())
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "tools": state.registry.list(),
        "categories": state.registry.categories(),
    }))
}

async fn handle_execute_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(args): Json<serde_json::Value>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    state
        .registry
        .execute(&name, args, &state.tool_context())
        .await
        .map(|result| Json(serde_json::json!({ "tool": name, "result": result })))
        .map_err(|e| match e {
            ToolError::NotFound(_) => api_error(StatusCode::NOT_FOUND, "not_found_error", e.to_string()),
            ToolError::InvalidArguments(_) => bad_request(e.to_string()),
            ToolError::Execution(_) => api_error(StatusCode::BAD_GATEWAY, "upstream_error", e.to_string()),
        })
}

async fn handle_cache_stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(match state.pipeline.cache() {
        Some(cache) => serde_json::json!({
            "enabled": true,
            "entries": cache.len(),
            "max_entries": cache.max_entries(),
        }),
        None => serde_json::json!({ "enabled": false, "entries": 0 }),
    })
}

async fn handle_cache_clear(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cleared = state.pipeline.cache().map(|cache| {
        let n = cache.len();
        cache.clear();
        n
    });
    Json(serde_json::json!({ "cleared": cleared.unwrap_or(0) }))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::llm::{LlmError, LlmEvent, LlmEventStream, Message, ProviderAdapter, RequestOptions};
    use crate::pipeline::{ResponseCache, Searchers};
    use async_trait::async_trait;
    use seeker_search::CrawlConfig;
    use seeker_search::crawl::render::DisabledRenderer;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixed;

    #[async_trait]
    impl ProviderAdapter for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn send(
            &self,
            _messages: &[Message],
            _options: &RequestOptions,
        ) -> std::result::Result<LlmEventStream, LlmError> {
            Ok(Box::pin(futures_util::stream::iter(vec![
                LlmEvent::TextDelta {
                    text: "Read it ".into(),
                },
                LlmEvent::TextDelta {
                    text: "【example.com】.".into(),
                },
            ])))
        }
    }

    async fn start() -> SeekerServer {
        let crawler = Arc::new(
            Crawler::with_renderer(CrawlConfig::default(), Arc::new(DisabledRenderer)).unwrap(),
        );
        let search = SearchConfig {
            arxiv_enabled: false,
            ..Default::default()
        };
        let pipeline = Pipeline::new(Arc::new(Fixed), Searchers::from_config(&search), crawler.clone())
            .with_cache(Arc::new(ResponseCache::new(10, Duration::from_secs(60))));
        let state = AppState::new(Arc::new(pipeline), crawler, search);
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
        };
        SeekerServer::start(state, &config).await.unwrap()
    }

    fn url(server: &SeekerServer, route: &str) -> String {
        format!("http://{}{route}", server.addr())
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let server = start().await;
        let body: serde_json::Value = reqwest::get(url(&server, "/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn query_streams_sse_events_for_explicit_urls() {
        let pages = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/post.html"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "<html><head><title>Post</title></head><body><main>Readable post body text.</main></body></html>",
                "text/html",
            ))
            .mount(&pages)
            .await;

        let server = start().await;
        let body = serde_json::json!({
            "message": "summarise this post",
            "explicit_urls": [format!("{}/post.html", pages.uri())],
        });
        let response = reqwest::Client::new()
            .post(url(&server, "/v1/query"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let text = response.text().await.unwrap();

        let events: Vec<serde_json::Value> = text
            .lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect();
        assert_eq!(events[0]["type"], "status");
        assert_eq!(events[0]["phase"], "analyzing");
        assert!(events.iter().any(|e| e["type"] == "citation" && e["citation"]["title"] == "Post"));
        assert!(events.iter().any(|e| e["type"] == "content"));
        assert_eq!(events.last().unwrap()["type"], "done");
    }

    #[tokio::test]
    async fn invalid_query_is_rejected_before_streaming() {
        let server = start().await;
        let response = reqwest::Client::new()
            .post(url(&server, "/v1/query"))
            .json(&serde_json::json!({ "message": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: ErrorResponse = response.json().await.unwrap();
        assert_eq!(body.error.error_type, "invalid_request_error");
    }

    #[tokio::test]
    async fn crawl_validates_url_count() {
        let server = start().await;
        let urls: Vec<String> = (0..11).map(|i| format!("https://example.com/{i}")).collect();
        let response = reqwest::Client::new()
            .post(url(&server, "/v1/crawl"))
            .json(&serde_json::json!({ "urls": urls }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        let response = reqwest::Client::new()
            .post(url(&server, "/v1/crawl"))
            .json(&serde_json::json!({ "urls": ["ftp://example.com/file"] }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn search_and_crawl_validates_max_results() {
        let server = start().await;
        let response = reqwest::Client::new()
            .post(url(&server, "/v1/search-and-crawl"))
            .json(&serde_json::json!({ "query": "rust", "max_results": 11 }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn tools_are_listed_and_unknown_tool_is_404() {
        let server = start().await;
        let body: serde_json::Value = reqwest::get(url(&server, "/v1/tools"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["tools"].as_array().unwrap().len(), 7);

        let response = reqwest::Client::new()
            .post(url(&server, "/v1/tools/calculator"))
            .json(&serde_json::json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);

        let body: serde_json::Value = reqwest::Client::new()
            .post(url(&server, "/v1/tools/query_analyzer"))
            .json(&serde_json::json!({ "query": "what is rust" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["result"]["intent"], "definition");
    }

    #[tokio::test]
    async fn cache_endpoints() {
        let server = start().await;
        let stats: serde_json::Value = reqwest::get(url(&server, "/v1/cache"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats["enabled"], true);
        assert_eq!(stats["entries"], 0);

        let cleared: serde_json::Value = reqwest::Client::new()
            .post(url(&server, "/v1/cache/clear"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(cleared["cleared"], 0);
    }
}
