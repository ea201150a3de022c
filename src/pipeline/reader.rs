//! Reading phase: crawl pages and turn usable ones into evidence.

use std::collections::BTreeMap;

use async_trait::async_trait;
use seeker_search::crawl::extract::truncate_chars;
use seeker_search::{CrawlEngine, CrawlResult, CrawledPage, Crawler};

use super::sources::{SourceKind, SourceResult};

/// Fetches full page content for a batch of URLs.
#[async_trait]
pub trait PageReader: Send + Sync {
    /// One page per URL, in request order. Never fails as a whole.
    async fn read(&self, urls: &[String]) -> CrawlResult;
}

#[async_trait]
impl PageReader for Crawler {
    async fn read(&self, urls: &[String]) -> CrawlResult {
        self.crawl(urls, CrawlEngine::Auto).await
    }
}

/// Snippet length kept for crawled pages without a meta description.
const PAGE_SNIPPET_CHARS: usize = 200;

/// Evidence record for a crawled page, or `None` when the crawl failed.
pub fn page_to_source(page: &CrawledPage, max_chars: usize) -> Option<SourceResult> {
    if !page.is_success() {
        return None;
    }
    let snippet = page
        .meta_description
        .clone()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| truncate_chars(&page.content, PAGE_SNIPPET_CHARS));

    let mut metadata = BTreeMap::new();
    metadata.insert("engine".to_owned(), serde_json::Value::from(page.engine.name()));
    metadata.insert("elapsed_ms".to_owned(), serde_json::Value::from(page.elapsed_ms));

    Some(SourceResult {
        title: page.title.clone().unwrap_or_default(),
        url: page.url.clone(),
        snippet,
        content: truncate_chars(&page.content, max_chars),
        kind: SourceKind::Web,
        authors: Vec::new(),
        published: String::new(),
        metadata,
    })
}

/// Error string recorded for a failed page.
pub fn page_error(page: &CrawledPage) -> String {
    let reason = page.error.as_deref().unwrap_or("no extractable content");
    format!("crawl failed for {}: {reason}", page.url)
}
