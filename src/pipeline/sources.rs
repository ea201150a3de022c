//! Source searchers and the unified evidence record.
//!
//! Each [`SourceSearcher`] wraps one `seeker_search` entry point and maps
//! its native records into [`SourceResult`]s. The fan-out only talks to the
//! trait, so tests can substitute scripted searchers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use seeker_search::crawl::extract::truncate_chars;
use seeker_search::{Paper, SearchConfig, SearchError, Video, WebResult};
use serde::{Deserialize, Serialize};

/// Kind of evidence provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Web,
    /// Academic papers.
    Arxiv,
    /// Videos with transcripts.
    Youtube,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [Self::Web, Self::Arxiv, Self::Youtube];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Arxiv => "arxiv",
            Self::Youtube => "youtube",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Self::Web),
            "arxiv" => Ok(Self::Arxiv),
            "youtube" => Ok(Self::Youtube),
            other => Err(format!("unknown source kind: {other}")),
        }
    }
}

/// Snippet length kept for academic results.
const PAPER_SNIPPET_CHARS: usize = 500;
/// Snippet length kept for video results.
const VIDEO_SNIPPET_CHARS: usize = 300;
/// Transcript (or description) length kept as video content.
const VIDEO_CONTENT_CHARS: usize = 2000;

/// One evidence item from any source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Full text handed to the synthesizer. May equal the snippet.
    pub content: String,
    #[serde(rename = "source_type")]
    pub kind: SourceKind,
    #[serde(default)]
    pub authors: Vec<String>,
    /// Publication date, empty when unknown.
    #[serde(default)]
    pub published: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl SourceResult {
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

impl From<WebResult> for SourceResult {
    fn from(r: WebResult) -> Self {
        Self {
            content: r.snippet.clone(),
            title: r.title,
            url: r.url,
            snippet: r.snippet,
            kind: SourceKind::Web,
            authors: Vec::new(),
            published: String::new(),
            metadata: BTreeMap::new(),
        }
    }
}

impl From<Paper> for SourceResult {
    fn from(p: Paper) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("arxiv_id".to_owned(), serde_json::Value::from(p.arxiv_id));
        metadata.insert("categories".to_owned(), serde_json::Value::from(p.categories));
        Self {
            title: p.title,
            url: p.url,
            snippet: truncate_chars(&p.summary, PAPER_SNIPPET_CHARS),
            content: p.summary,
            kind: SourceKind::Arxiv,
            authors: p.authors,
            published: p.published.unwrap_or_default(),
            metadata,
        }
    }
}

impl From<Video> for SourceResult {
    fn from(v: Video) -> Self {
        let body = v
            .transcript
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&v.description);
        let content = truncate_chars(body, VIDEO_CONTENT_CHARS);

        let mut metadata = BTreeMap::new();
        metadata.insert("video_id".to_owned(), serde_json::Value::from(v.video_id));
        metadata.insert("channel".to_owned(), serde_json::Value::from(v.channel.clone()));
        Self {
            title: v.title,
            url: v.url,
            snippet: truncate_chars(&v.description, VIDEO_SNIPPET_CHARS),
            content,
            kind: SourceKind::Youtube,
            authors: vec![v.channel],
            published: v.published.unwrap_or_default(),
            metadata,
        }
    }
}

/// A searchable evidence provider.
#[async_trait]
pub trait SourceSearcher: Send + Sync {
    /// Kind tag stamped on every result.
    fn kind(&self) -> SourceKind;

    /// Search for up to `k` results.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SourceResult>, SearchError>;
}

/// DuckDuckGo web search.
#[derive(Debug, Clone)]
pub struct WebSearcher {
    config: SearchConfig,
}

impl WebSearcher {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SourceSearcher for WebSearcher {
    fn kind(&self) -> SourceKind {
        SourceKind::Web
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<SourceResult>, SearchError> {
        let results = seeker_search::search_web(query, k, &self.config).await?;
        Ok(results.into_iter().map(SourceResult::from).collect())
    }
}

/// arXiv paper search. A disabled index yields no results rather than an error.
#[derive(Debug, Clone)]
pub struct ArxivSearcher {
    config: SearchConfig,
}

impl ArxivSearcher {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SourceSearcher for ArxivSearcher {
    fn kind(&self) -> SourceKind {
        SourceKind::Arxiv
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<SourceResult>, SearchError> {
        match seeker_search::search_academic(query, k, &self.config).await {
            Ok(papers) => Ok(papers.into_iter().map(SourceResult::from).collect()),
            Err(e) if e.is_unavailable() => {
                tracing::debug!(error = %e, "academic index unavailable, skipping");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

/// YouTube video search with transcripts.
#[derive(Debug, Clone)]
pub struct YoutubeSearcher {
    config: SearchConfig,
}

impl YoutubeSearcher {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SourceSearcher for YoutubeSearcher {
    fn kind(&self) -> SourceKind {
        SourceKind::Youtube
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<SourceResult>, SearchError> {
        let videos = seeker_search::search_video(query, k, &self.config).await?;
        Ok(videos.into_iter().map(SourceResult::from).collect())
    }
}

/// One searcher per source kind.
#[derive(Clone)]
pub struct Searchers {
    pub web: Arc<dyn SourceSearcher>,
    pub academic: Arc<dyn SourceSearcher>,
    pub video: Arc<dyn SourceSearcher>,
}

impl Searchers {
    /// The `seeker_search` backed searchers.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            web: Arc::new(WebSearcher::new(config.clone())),
            academic: Arc::new(ArxivSearcher::new(config.clone())),
            video: Arc::new(YoutubeSearcher::new(config.clone())),
        }
    }

    pub fn get(&self, kind: SourceKind) -> &Arc<dyn SourceSearcher> {
        match kind {
            SourceKind::Web => &self.web,
            SourceKind::Arxiv => &self.academic,
            SourceKind::Youtube => &self.video,
        }
    }
}

impl fmt::Debug for Searchers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Searchers").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn web_content_is_snippet() {
        let r = SourceResult::from(WebResult {
            title: "Rust".into(),
            url: "https://rust-lang.org".into(),
            snippet: "A language".into(),
        });
        assert_eq!(r.content, "A language");
        assert_eq!(r.kind, SourceKind::Web);
        assert!(r.authors.is_empty());
    }

    #[test]
    fn paper_snippet_is_truncated_and_metadata_kept() {
        let r = SourceResult::from(Paper {
            title: "Attention".into(),
            authors: vec!["Vaswani".into()],
            summary: "s".repeat(800),
            url: "https://arxiv.org/pdf/1706.03762".into(),
            arxiv_id: "1706.03762".into(),
            published: Some("2017-06-12".into()),
            categories: vec!["cs.CL".into()],
        });
        assert_eq!(r.snippet.chars().count(), 500);
        assert_eq!(r.content.chars().count(), 800);
        assert_eq!(r.metadata["arxiv_id"], "1706.03762");
        assert_eq!(r.metadata["categories"][0], "cs.CL");
        assert_eq!(r.published, "2017-06-12");
    }

    #[test]
    fn video_prefers_transcript_and_caps_content() {
        let video = Video {
            video_id: "abc".into(),
            title: "Intro".into(),
            url: "https://www.youtube.com/watch?v=abc".into(),
            channel: "Chan".into(),
            description: "d".repeat(400),
            published: None,
            transcript: Some("t".repeat(3000)),
        };
        let r = SourceResult::from(video.clone());
        assert_eq!(r.content, "t".repeat(2000));
        assert_eq!(r.snippet.chars().count(), 300);
        assert_eq!(r.authors, vec!["Chan".to_owned()]);
        assert_eq!(r.metadata["video_id"], "abc");

        let without = SourceResult::from(Video {
            transcript: None,
            ..video
        });
        assert_eq!(without.content, "d".repeat(400));
    }

    #[test]
    fn serializes_kind_as_source_type() {
        let r = SourceResult::from(WebResult {
            title: "t".into(),
            url: "https://a.com".into(),
            snippet: "s".into(),
        });
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["source_type"], "web");
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("ArXiv".parse::<SourceKind>().unwrap(), SourceKind::Arxiv);
        assert!("podcast".parse::<SourceKind>().is_err());
    }

    #[tokio::test]
    async fn disabled_arxiv_is_empty_not_error() {
        let searcher = ArxivSearcher::new(SearchConfig {
            arxiv_enabled: false,
            ..Default::default()
        });
        assert!(searcher.search("transformers", 5).await.unwrap().is_empty());
    }
}
