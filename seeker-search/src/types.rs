//! Core types for source search results and crawled pages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SearchError;

/// A single general web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    /// The title of the result page.
    pub title: String,
    /// The URL of the result page.
    pub url: String,
    /// A text snippet summarising the page.
    pub snippet: String,
}

/// An academic paper from the arXiv index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Paper title with whitespace collapsed.
    pub title: String,
    /// Author names in listed order.
    pub authors: Vec<String>,
    /// Abstract text.
    pub summary: String,
    /// PDF link, or the abstract page when no PDF link is listed.
    pub url: String,
    /// arXiv identifier including version, e.g. `1706.03762v7`.
    pub arxiv_id: String,
    /// Publication timestamp as given by the feed (RFC 3339).
    pub published: Option<String>,
    /// Subject categories, e.g. `cs.CL`.
    pub categories: Vec<String>,
}

/// A video found on YouTube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    /// The 11-character video id.
    pub video_id: String,
    /// Video title.
    pub title: String,
    /// Canonical watch URL.
    pub url: String,
    /// Channel name, empty when unknown.
    pub channel: String,
    /// Description or search snippet.
    pub description: String,
    /// Publication timestamp when known.
    pub published: Option<String>,
    /// Transcript text, `None` when it could not be fetched.
    pub transcript: Option<String>,
}

/// Which fetch strategy the crawler uses for a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlEngine {
    /// Decide per URL.
    #[default]
    Auto,
    /// Plain HTTP fetch and HTML parsing.
    Static,
    /// Headless browser with script execution.
    Rendered,
}

impl CrawlEngine {
    /// Returns the lowercase wire name of this engine.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Static => "static",
            Self::Rendered => "rendered",
        }
    }
}

impl fmt::Display for CrawlEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CrawlEngine {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "static" => Ok(Self::Static),
            "rendered" => Ok(Self::Rendered),
            other => Err(SearchError::Config(format!("unknown crawl engine: {other}"))),
        }
    }
}

/// The outcome of crawling one URL.
///
/// A page with an error or with empty content is a failed crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawledPage {
    /// The URL that was requested.
    pub url: String,
    /// Scheme and host of the URL, e.g. `https://example.com`.
    pub root_url: String,
    /// Page title when one was found.
    pub title: Option<String>,
    /// Extracted readable text.
    pub content: String,
    /// Meta or Open Graph description.
    pub meta_description: Option<String>,
    /// Wall-clock fetch and extraction time.
    pub elapsed_ms: u64,
    /// Engine actually used. Never [`CrawlEngine::Auto`].
    pub engine: CrawlEngine,
    /// Why the crawl failed, when it did.
    pub error: Option<String>,
}

impl CrawledPage {
    /// Build a failed page record for `url`.
    pub fn failed(url: &str, engine: CrawlEngine, error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            url: url.to_owned(),
            root_url: crate::url_util::root_url(url),
            title: None,
            content: String::new(),
            meta_description: None,
            elapsed_ms,
            engine,
            error: Some(error.into()),
        }
    }

    /// Whether the page carries usable content and no error.
    pub fn is_success(&self) -> bool {
        self.error.as_deref().is_none_or(str::is_empty) && !self.content.trim().is_empty()
    }
}

/// The outcome of crawling a batch of URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlResult {
    /// One page per requested URL, in request order.
    pub pages: Vec<CrawledPage>,
    /// Number of URLs requested.
    pub total_pages: usize,
    /// Pages with content and no error.
    pub successful_pages: usize,
    /// `total_pages - successful_pages`.
    pub failed_pages: usize,
    /// Wall-clock time of the whole batch.
    pub total_crawl_time_ms: u64,
}

impl CrawlResult {
    /// Summarise a finished batch.
    pub fn from_pages(pages: Vec<CrawledPage>, total_crawl_time_ms: u64) -> Self {
        let total_pages = pages.len();
        let successful_pages = pages.iter().filter(|p| p.is_success()).count();
        Self {
            pages,
            total_pages,
            successful_pages,
            failed_pages: total_pages - successful_pages,
            total_crawl_time_ms,
        }
    }
}
