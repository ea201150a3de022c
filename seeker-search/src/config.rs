//! Search and crawl configuration with sensible defaults.
//!
//! [`SearchConfig`] controls the source searchers (web, arXiv, YouTube) and
//! [`CrawlConfig`] controls the dual-engine page crawler. Both deserialize
//! from TOML sections with every field optional.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Base URLs of the external services. Overridable so tests can point
/// them at a local mock server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// DuckDuckGo HTML-only search endpoint.
    pub duckduckgo: String,
    /// arXiv Atom query API.
    pub arxiv: String,
    /// YouTube Data API v3 root.
    pub youtube_api: String,
    /// YouTube site root, used for watch pages and caption tracks.
    pub youtube_site: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            duckduckgo: "https://html.duckduckgo.com/html/".into(),
            arxiv: "https://export.arxiv.org/api/query".into(),
            youtube_api: "https://www.googleapis.com/youtube/v3".into(),
            youtube_site: "https://www.youtube.com".into(),
        }
    }
}

/// Configuration for the source searchers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum web results per search.
    pub web_max_results: usize,
    /// Maximum arXiv papers per search.
    pub academic_max_results: usize,
    /// Maximum videos per search.
    pub video_max_results: usize,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Whether to request safe search filtering.
    pub safe_search: bool,
    /// How long to cache web results in seconds. 0 disables caching.
    pub cache_ttl_seconds: u64,
    /// Custom User-Agent. `None` rotates through a built-in list.
    pub user_agent: Option<String>,
    /// When false, academic search reports itself unavailable.
    pub arxiv_enabled: bool,
    /// Environment variable holding the YouTube Data API key.
    pub youtube_api_key_env: String,
    /// Explicit YouTube API key. Never written to disk.
    #[serde(skip)]
    pub youtube_api_key: Option<String>,
    /// Maximum transcript characters kept per video.
    pub transcript_max_chars: usize,
    /// External service base URLs.
    pub endpoints: Endpoints,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            web_max_results: 10,
            academic_max_results: 5,
            video_max_results: 3,
            timeout_seconds: 8,
            safe_search: true,
            cache_ttl_seconds: 600,
            user_agent: None,
            arxiv_enabled: true,
            youtube_api_key_env: "YOUTUBE_API_KEY".into(),
            youtube_api_key: None,
            transcript_max_chars: 5000,
            endpoints: Endpoints::default(),
        }
    }
}

impl SearchConfig {
    /// Resolve the YouTube API key: the explicit field first, then the
    /// configured environment variable. Empty values count as absent.
    pub fn youtube_api_key(&self) -> Option<String> {
        self.youtube_api_key
            .clone()
            .or_else(|| std::env::var(&self.youtube_api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
    }

    /// Validates this configuration, returning an error if any field is invalid.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.web_max_results == 0 {
            return Err(SearchError::Config(
                "web_max_results must be greater than 0".into(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.academic_max_results == 0 || self.video_max_results == 0 {
            return Err(SearchError::Config(
                "academic_max_results and video_max_results must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the page crawler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Timeout for a static fetch in seconds. Rendered fetches get
    /// `render_extra_seconds` on top.
    pub timeout_seconds: u64,
    /// Extra seconds allowed for a rendered fetch.
    pub render_extra_seconds: u64,
    /// Timeout for the engine-detection probe in milliseconds.
    pub probe_timeout_ms: u64,
    /// How much of the probe body is inspected for framework markers.
    pub probe_max_bytes: usize,
    /// Visible body text shorter than this marks a page as script-rendered.
    pub min_body_text_chars: usize,
    /// Maximum characters of extracted text kept per page.
    pub max_content_length: usize,
    /// Maximum characters per page when building model context.
    pub content_per_source: usize,
    /// How long a rendered page may wait for network idle, in milliseconds.
    pub network_idle_timeout_ms: u64,
    /// Run the browser without a window.
    pub headless: bool,
    /// Explicit browser binary. `None` searches well-known locations.
    pub chrome_executable: Option<PathBuf>,
    /// Maximum pages rendered at the same time.
    pub max_concurrent_pages: usize,
    /// Custom User-Agent for crawling.
    pub user_agent: Option<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            render_extra_seconds: 15,
            probe_timeout_ms: 5000,
            probe_max_bytes: 15_000,
            min_body_text_chars: 100,
            max_content_length: 50_000,
            content_per_source: 8000,
            network_idle_timeout_ms: 10_000,
            headless: true,
            chrome_executable: None,
            max_concurrent_pages: 4,
            user_agent: None,
        }
    }
}

impl CrawlConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "crawl timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.max_content_length == 0 {
            return Err(SearchError::Config(
                "max_content_length must be greater than 0".into(),
            ));
        }
        if self.max_concurrent_pages == 0 {
            return Err(SearchError::Config(
                "max_concurrent_pages must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
