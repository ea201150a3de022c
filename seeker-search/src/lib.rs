//! # seeker-search
//!
//! Evidence gathering for the seeker research pipeline: source searchers
//! and a dual-engine page crawler.
//!
//! ## Design
//!
//! - Web search scrapes DuckDuckGo HTML results, no API key required
//! - Academic search reads the arXiv Atom API
//! - Video search uses the YouTube Data API when a key is configured and
//!   falls back to a site-scoped web search, attaching transcripts
//! - The crawler fetches pages statically or through a shared headless
//!   browser, choosing per URL in `auto` mode
//! - Web results are cached in memory with a configurable TTL
//!
//! ## Security
//!
//! - No network listeners. This is a library, not a server
//! - Search queries are logged only at trace level
//! - A failure on one page or source never aborts a batch

pub mod cache;
pub mod config;
pub mod crawl;
pub mod engines;
pub mod error;
pub mod http;
pub mod types;
pub mod url_util;

pub use config::{CrawlConfig, Endpoints, SearchConfig};
pub use crawl::context::{build_page_context, citations_from_pages, PageCitation};
pub use crawl::render::Renderer;
pub use crawl::Crawler;
pub use engines::youtube::fetch_transcript;
pub use error::{Result, SearchError};
pub use types::{CrawlEngine, CrawlResult, CrawledPage, Paper, Video, WebResult};

use engines::{ArxivEngine, DuckDuckGoEngine, YouTubeEngine};

/// Search the web for up to `k` results, capped at `web_max_results`.
///
/// Results are served from the in-memory cache when the same query and
/// limit were searched within `cache_ttl_seconds`.
///
/// # Errors
///
/// Returns [`SearchError::Config`] for an invalid config, otherwise the
/// engine's HTTP, timeout or parse error.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> seeker_search::Result<()> {
/// let config = seeker_search::SearchConfig::default();
/// let results = seeker_search::search_web("rust async runtimes", 5, &config).await?;
/// for result in &results {
///     println!("{}: {}", result.title, result.url);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn search_web(query: &str, k: usize, config: &SearchConfig) -> Result<Vec<WebResult>> {
    config.validate()?;
    let limit = k.min(config.web_max_results);
    let key = cache::CacheKey::new(query, limit);

    if let Some(hit) = cache::get(&key, config.cache_ttl_seconds).await {
        tracing::debug!(count = hit.len(), "web search cache hit");
        return Ok(hit);
    }

    let results = DuckDuckGoEngine.search(query, limit, config).await?;
    cache::insert(key, results.clone(), config.cache_ttl_seconds).await;
    Ok(results)
}

/// Search arXiv for up to `k` papers, capped at `academic_max_results`.
///
/// # Errors
///
/// [`SearchError::Unavailable`] when academic search is disabled, otherwise
/// the engine's HTTP, timeout or parse error.
pub async fn search_academic(query: &str, k: usize, config: &SearchConfig) -> Result<Vec<Paper>> {
    config.validate()?;
    ArxivEngine
        .search(query, k.min(config.academic_max_results), config)
        .await
}

/// Search for up to `k` videos, capped at `video_max_results`.
///
/// # Errors
///
/// Returns an error only when every video search path fails.
pub async fn search_video(query: &str, k: usize, config: &SearchConfig) -> Result<Vec<Video>> {
    config.validate()?;
    YouTubeEngine
        .search(query, k.min(config.video_max_results), config)
        .await
}

/// Result of a web search followed by a crawl of its hits.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchAndCrawl {
    pub query: String,
    /// Search hits, in the order they were crawled.
    pub results: Vec<WebResult>,
    pub crawl: CrawlResult,
}

/// Search the web, then crawl every hit with `engine`.
///
/// # Errors
///
/// Fails only when the search itself fails. Individual page failures are
/// reported on the pages.
pub async fn search_and_crawl(
    crawler: &Crawler,
    query: &str,
    max_results: usize,
    engine: CrawlEngine,
    config: &SearchConfig,
) -> Result<SearchAndCrawl> {
    let results = search_web(query, max_results, config).await?;
    let urls: Vec<String> = results.iter().map(|r| r.url.clone()).collect();
    let crawl = crawler.crawl(&urls, engine).await;
    Ok(SearchAndCrawl {
        query: query.to_owned(),
        results,
        crawl,
    })
}
