//! arXiv academic search over the public Atom query API.
//!
//! Queries `export.arxiv.org/api/query` and parses the Atom feed with
//! `quick-xml`. No API key is required.

use std::time::Duration;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::http;
use crate::types::Paper;

/// arXiv Atom API client.
pub struct ArxivEngine;

impl ArxivEngine {
    /// Search arXiv for up to `limit` papers, most relevant first.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Unavailable`] when academic search is disabled,
    /// [`SearchError::Http`] or [`SearchError::Timeout`] when the index cannot
    /// be reached, and [`SearchError::Parse`] for a malformed feed.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        config: &SearchConfig,
    ) -> Result<Vec<Paper>, SearchError> {
        if !config.arxiv_enabled {
            return Err(SearchError::Unavailable("arXiv search is disabled".into()));
        }

        tracing::trace!(query, limit, "arXiv search");

        let client = http::build_client(
            Duration::from_secs(config.timeout_seconds),
            config.user_agent.as_deref(),
        )?;

        let search_query = format!("all:{}", query.trim());
        let max_results = limit.to_string();
        let response = client
            .get(&config.endpoints.arxiv)
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
                ("sortBy", "relevance"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .map_err(|e| http::map_reqwest_error("arXiv request failed", e))?
            .error_for_status()
            .map_err(|e| SearchError::Http(format!("arXiv HTTP error: {e}")))?;

        let body = response
            .text()
            .await
            .map_err(|e| http::map_reqwest_error("arXiv response read failed", e))?;

        let mut papers = parse_atom_feed(&body)?;
        papers.truncate(limit);
        tracing::debug!(count = papers.len(), "arXiv papers parsed");
        Ok(papers)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    AuthorName,
}

#[derive(Debug, Default)]
struct EntryBuilder {
    id: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
    pdf_url: Option<String>,
    abs_url: Option<String>,
    categories: Vec<String>,
}

impl EntryBuilder {
    fn apply_link_or_category(&mut self, e: &BytesStart<'_>) {
        match e.local_name().as_ref() {
            b"link" => {
                let href = attr(e, b"href");
                let title = attr(e, b"title");
                let rel = attr(e, b"rel");
                if title.as_deref() == Some("pdf") {
                    self.pdf_url = href;
                } else if rel.as_deref() == Some("alternate") {
                    self.abs_url = href;
                }
            }
            b"category" => {
                if let Some(term) = attr(e, b"term") {
                    if !self.categories.contains(&term) {
                        self.categories.push(term);
                    }
                }
            }
            _ => {}
        }
    }

    fn build(self) -> Option<Paper> {
        let title = collapse_whitespace(&self.title);
        if title.is_empty() {
            return None;
        }
        let abs_url = self.abs_url.unwrap_or_else(|| self.id.trim().to_owned());
        let url = self.pdf_url.unwrap_or_else(|| abs_url.clone());
        let arxiv_id = self
            .id
            .trim()
            .rsplit("/abs/")
            .next()
            .unwrap_or_default()
            .to_owned();
        let published = self.published.trim();
        Some(Paper {
            title,
            authors: self.authors,
            summary: collapse_whitespace(&self.summary),
            url,
            arxiv_id,
            published: (!published.is_empty()).then(|| published.to_owned()),
            categories: self.categories,
        })
    }
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an arXiv Atom feed into papers, in feed order.
///
/// # Errors
///
/// Returns [`SearchError::Parse`] if the XML is malformed.
pub fn parse_atom_feed(xml: &str) -> Result<Vec<Paper>, SearchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut papers = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut field: Option<Field> = None;
    let mut in_author = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"entry" => entry = Some(EntryBuilder::default()),
                b"author" if entry.is_some() => in_author = true,
                b"name" if in_author => field = Some(Field::AuthorName),
                b"id" if entry.is_some() => field = Some(Field::Id),
                b"title" if entry.is_some() => field = Some(Field::Title),
                b"summary" if entry.is_some() => field = Some(Field::Summary),
                b"published" if entry.is_some() => field = Some(Field::Published),
                _ => {
                    if let Some(builder) = entry.as_mut() {
                        builder.apply_link_or_category(&e);
                    }
                }
            },
            Ok(Event::Empty(e)) => {
                if let Some(builder) = entry.as_mut() {
                    builder.apply_link_or_category(&e);
                }
            }
            Ok(Event::Text(te)) => {
                if let (Some(builder), Some(current)) = (entry.as_mut(), field) {
                    let text = te
                        .unescape()
                        .map_err(|e| SearchError::Parse(format!("arXiv feed text: {e}")))?;
                    match current {
                        Field::Id => builder.id.push_str(&text),
                        Field::Title => builder.title.push_str(&text),
                        Field::Summary => builder.summary.push_str(&text),
                        Field::Published => builder.published.push_str(&text),
                        Field::AuthorName => builder.authors.push(text.trim().to_owned()),
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"entry" => {
                    if let Some(paper) = entry.take().and_then(EntryBuilder::build) {
                        papers.push(paper);
                    }
                    field = None;
                    in_author = false;
                }
                b"author" => in_author = false,
                _ => field = None,
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(SearchError::Parse(format!(
                    "arXiv feed error at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
        buf.clear();
    }

    Ok(papers)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query: search_query=all:transformer</title>
  <id>http://arxiv.org/api/abc</id>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <summary>  The dominant sequence transduction models are based on complex
      recurrent or convolutional neural networks &amp; attention.</summary>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name></author>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/1706.03762v7" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/1409.0473v7</id>
    <published>2014-09-01T16:33:02Z</published>
    <title>Neural Machine Translation by Jointly Learning to Align and Translate</title>
    <summary>Neural machine translation is a recently proposed approach.</summary>
    <author><name>Dzmitry Bahdanau</name></author>
    <link href="http://arxiv.org/abs/1409.0473v7" rel="alternate" type="text/html"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

    #[test]
    fn parses_entries_in_order() {
        let papers = parse_atom_feed(FEED).unwrap();
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].title, "Attention Is All You Need");
        assert_eq!(papers[1].arxiv_id, "1409.0473v7");
    }

    #[test]
    fn maps_authors_links_and_categories() {
        let paper = &parse_atom_feed(FEED).unwrap()[0];
        assert_eq!(paper.authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(paper.url, "http://arxiv.org/pdf/1706.03762v7");
        assert_eq!(paper.arxiv_id, "1706.03762v7");
        assert_eq!(paper.published.as_deref(), Some("2017-06-12T17:57:34Z"));
        assert_eq!(paper.categories, vec!["cs.CL", "cs.LG"]);
        assert!(paper.summary.contains("convolutional neural networks & attention"));
        assert!(!paper.summary.contains('\n'));
    }

    #[test]
    fn missing_pdf_link_falls_back_to_abstract_page() {
        let paper = &parse_atom_feed(FEED).unwrap()[1];
        assert_eq!(paper.url, "http://arxiv.org/abs/1409.0473v7");
    }

    #[test]
    fn empty_feed_yields_no_papers() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>none</title></feed>"#;
        assert!(parse_atom_feed(xml).unwrap().is_empty());
    }

    #[tokio::test]
    async fn disabled_search_is_unavailable() {
        let config = SearchConfig {
            arxiv_enabled: false,
            ..Default::default()
        };
        let err = ArxivEngine.search("x", 5, &config).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn search_against_mock_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("search_query", "all:transformer"))
            .and(query_param("max_results", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;

        let mut config = SearchConfig::default();
        config.endpoints.arxiv = format!("{}/api/query", server.uri());

        let papers = ArxivEngine.search("transformer", 1, &config).await.unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "Attention Is All You Need");
    }

    #[tokio::test]
    async fn unreachable_index_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut config = SearchConfig::default();
        config.endpoints.arxiv = format!("{}/api/query", server.uri());

        let err = ArxivEngine.search("transformer", 5, &config).await.unwrap_err();
        assert!(matches!(err, SearchError::Http(_)));
    }
}
