//! DuckDuckGo web search: scraper-friendly and needs no API key.
//!
//! Uses the HTML-only endpoint, which requires no JavaScript and is
//! tolerant of automated requests. Also serves the site-scoped fallback
//! for video search.

use std::time::Duration;

use scraper::{Html, Selector};
use url::Url;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::http;
use crate::types::WebResult;

/// DuckDuckGo HTML search engine scraper.
pub struct DuckDuckGoEngine;

impl DuckDuckGoEngine {
    /// Extract the actual URL from DuckDuckGo's redirect wrapper.
    ///
    /// DDG wraps URLs like `//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com&rut=...`.
    fn extract_url(href: &str) -> Option<String> {
        let full_href = if href.starts_with("//") {
            format!("https:{href}")
        } else {
            href.to_string()
        };

        let parsed = Url::parse(&full_href).ok()?;

        if parsed.host_str() == Some("duckduckgo.com") && parsed.path().starts_with("/l/") {
            parsed
                .query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, value)| value.into_owned())
        } else {
            Some(full_href)
        }
    }

    /// Run one search and return up to `limit` parsed results.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] or [`SearchError::Timeout`] when the
    /// request fails, [`SearchError::Parse`] when the page cannot be parsed.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        config: &SearchConfig,
    ) -> Result<Vec<WebResult>, SearchError> {
        tracing::trace!(query, "DuckDuckGo search");

        let client = http::build_client(
            Duration::from_secs(config.timeout_seconds),
            config.user_agent.as_deref(),
        )?;

        let mut params = vec![("q", query)];
        if config.safe_search {
            params.push(("kp", "1"));
        }

        let response = client
            .post(&config.endpoints.duckduckgo)
            .form(&params)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| http::map_reqwest_error("DuckDuckGo request failed", e))?
            .error_for_status()
            .map_err(|e| SearchError::Http(format!("DuckDuckGo HTTP error: {e}")))?;

        let html = response
            .text()
            .await
            .map_err(|e| http::map_reqwest_error("DuckDuckGo response read failed", e))?;

        tracing::trace!(bytes = html.len(), "DuckDuckGo response received");

        parse_duckduckgo_html(&html, limit)
    }
}

/// Parse a DuckDuckGo HTML response into web results.
pub(crate) fn parse_duckduckgo_html(
    html: &str,
    max_results: usize,
) -> Result<Vec<WebResult>, SearchError> {
    let document = Html::parse_document(html);

    let result_sel = Selector::parse(
        ".result.results_links.results_links_deep:not(.result--ad), .web-result:not(.result--ad)",
    )
    .map_err(|e| SearchError::Parse(format!("invalid result selector: {e:?}")))?;
    let title_sel = Selector::parse(".result__a")
        .map_err(|e| SearchError::Parse(format!("invalid title selector: {e:?}")))?;
    let snippet_sel = Selector::parse(".result__snippet")
        .map_err(|e| SearchError::Parse(format!("invalid snippet selector: {e:?}")))?;

    let mut results = Vec::new();

    for element in document.select(&result_sel) {
        let Some(title_el) = element.select(&title_sel).next() else {
            continue;
        };

        let title = title_el.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            continue;
        }

        let Some(url) = title_el
            .value()
            .attr("href")
            .and_then(DuckDuckGoEngine::extract_url)
        else {
            continue;
        };

        let snippet = element
            .select(&snippet_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        results.push(WebResult {
            title,
            url,
            snippet,
        });

        if results.len() >= max_results {
            break;
        }
    }

    tracing::debug!(count = results.len(), "DuckDuckGo results parsed");
    Ok(results)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) const MOCK_DDG_HTML: &str = r#"<!DOCTYPE html>
<html>
<body>
<div class="result results_links results_links_deep web-result">
    <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=abc123">
        Rust Programming Language
    </a>
    <div class="result__snippet">
        A language empowering everyone to build reliable and efficient software.
    </div>
</div>
<div class="result results_links results_links_deep web-result result--ad">
    <a class="result__a" href="https://ads.example.com/">Sponsored</a>
    <div class="result__snippet">Buy now</div>
</div>
<div class="result results_links results_links_deep web-result">
    <a class="result__a" href="https://doc.rust-lang.org/book/">
        The Rust Programming Language Book
    </a>
    <div class="result__snippet">
        An introductory book about Rust.
    </div>
</div>
<div class="result results_links results_links_deep web-result">
    <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fen.wikipedia.org%2Fwiki%2FRust_(programming_language)&amp;rut=def456">
        Rust (programming language) - Wikipedia
    </a>
    <div class="result__snippet">
        Rust is a multi-paradigm, general-purpose programming language.
    </div>
</div>
</body>
</html>"#;

    #[test]
    fn extract_url_from_ddg_redirect() {
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fpage&rut=abc";
        assert_eq!(
            DuckDuckGoEngine::extract_url(href),
            Some("https://example.com/page".to_string())
        );
    }

    #[test]
    fn extract_url_direct_link() {
        assert_eq!(
            DuckDuckGoEngine::extract_url("https://example.com/direct"),
            Some("https://example.com/direct".to_string())
        );
    }

    #[test]
    fn extract_url_invalid() {
        assert!(DuckDuckGoEngine::extract_url("not-a-url").is_none());
    }

    #[test]
    fn parse_mock_html_skips_ads() {
        let results = parse_duckduckgo_html(MOCK_DDG_HTML, 10).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].title, "Rust Programming Language");
        assert_eq!(results[0].url, "https://www.rust-lang.org/");
        assert!(results[0].snippet.contains("reliable and efficient"));
        assert_eq!(results[1].url, "https://doc.rust-lang.org/book/");
        assert!(results.iter().all(|r| !r.url.contains("ads.example.com")));
    }

    #[test]
    fn parse_respects_max_results() {
        assert_eq!(parse_duckduckgo_html(MOCK_DDG_HTML, 2).unwrap().len(), 2);
    }

    #[test]
    fn parse_empty_html_returns_empty() {
        assert!(parse_duckduckgo_html("<html><body></body></html>", 10)
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn search_against_mock_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/html/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MOCK_DDG_HTML))
            .mount(&server)
            .await;

        let mut config = SearchConfig::default();
        config.endpoints.duckduckgo = format!("{}/html/", server.uri());

        let results = DuckDuckGoEngine.search("rust", 5, &config).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn search_maps_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut config = SearchConfig::default();
        config.endpoints.duckduckgo = format!("{}/html/", server.uri());

        let err = DuckDuckGoEngine.search("rust", 5, &config).await.unwrap_err();
        assert!(matches!(err, SearchError::Http(_)));
    }

    #[tokio::test]
    #[ignore] // Live test: run with `cargo test -- --ignored`
    async fn live_duckduckgo_search() {
        let results = DuckDuckGoEngine
            .search("rust programming", 5, &SearchConfig::default())
            .await
            .expect("live search should work");
        assert!(!results.is_empty());
    }
}
