//! Per-URL engine selection for `auto` crawls.
//!
//! Order of checks: known script-rendered domains, then static file
//! extensions, then a short probing GET. Any probe failure selects the
//! static engine.

use std::time::Duration;

use scraper::Html;

use crate::config::CrawlConfig;
use crate::crawl::extract::strip_tags;
use crate::types::CrawlEngine;
use crate::url_util;

/// Hosts whose content only exists after client-side rendering.
pub const JS_HEAVY_DOMAINS: &[&str] = &[
    "twitter.com",
    "x.com",
    "instagram.com",
    "facebook.com",
    "linkedin.com",
    "reddit.com",
    "medium.com",
    "substack.com",
    "notion.so",
    "figma.com",
    "miro.com",
    "airtable.com",
    "youtube.com",
    "tiktok.com",
    "pinterest.com",
    "discord.com",
    "slack.com",
    "trello.com",
    "canva.com",
];

/// Path extensions that never need a browser.
pub const STATIC_EXTENSIONS: &[&str] = &[".html", ".htm", ".txt", ".md", ".xml", ".json", ".pdf"];

/// Lowercase markers of single-page-application frameworks.
const SPA_MARKERS: &[&str] = &[
    "react",
    "__react",
    "angular",
    "ng-app",
    "ng-controller",
    "vue",
    "v-app",
    "v-cloak",
    "__next_data__",
    "__nuxt__",
    "window.__initial_state__",
    "data-reactroot",
    "data-reactid",
    "_app",
    "hydrate",
];

/// Whether the URL's host is, or is a subdomain of, a known rendered domain.
pub fn is_js_heavy_domain(url: &str) -> bool {
    let Some(host) = url_util::bare_host(url) else {
        return false;
    };
    JS_HEAVY_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
}

/// Whether the URL path ends in a known static extension.
pub fn has_static_extension(url: &str) -> bool {
    let Ok(parsed) = url::Url::parse(url.trim()) else {
        return false;
    };
    let path = parsed.path().to_ascii_lowercase();
    STATIC_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Engine decided from the URL alone, without any network access.
pub fn engine_from_url(url: &str) -> Option<CrawlEngine> {
    if is_js_heavy_domain(url) {
        Some(CrawlEngine::Rendered)
    } else if has_static_extension(url) {
        Some(CrawlEngine::Static)
    } else {
        None
    }
}

/// Decide the engine from a probe response.
///
/// Non-HTML responses are static. HTML with framework markers, or whose
/// visible body text is shorter than `min_body_text_chars`, is rendered.
/// A probe that never reaches `</body>` is static.
pub fn classify_probe(content_type: Option<&str>, head: &str, config: &CrawlConfig) -> CrawlEngine {
    let is_html = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
        .unwrap_or(false);
    if !is_html {
        return CrawlEngine::Static;
    }

    let lower = head.to_lowercase();
    if SPA_MARKERS.iter().any(|m| lower.contains(m)) {
        return CrawlEngine::Rendered;
    }

    match visible_body_chars(head) {
        Some(chars) if chars < config.min_body_text_chars => CrawlEngine::Rendered,
        _ => CrawlEngine::Static,
    }
}

/// Characters of trimmed visible text inside `<body>...</body>`, or `None`
/// when the markup has no complete body element.
fn visible_body_chars(html: &str) -> Option<usize> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<body")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</body>")?;

    let cleaned = strip_tags(&html[start..end], &["script", "style"]);
    let fragment = Html::parse_fragment(&cleaned);
    let text: String = fragment.root_element().text().collect();
    Some(text.trim().chars().count())
}

/// Pick an engine for one URL, probing the network when the URL alone
/// does not decide it.
pub async fn detect_engine(client: &reqwest::Client, url: &str, config: &CrawlConfig) -> CrawlEngine {
    if let Some(engine) = engine_from_url(url) {
        tracing::debug!(url, %engine, "engine chosen from URL");
        return engine;
    }

    match probe(client, url, config).await {
        Ok(engine) => {
            tracing::debug!(url, %engine, "engine chosen from probe");
            engine
        }
        Err(err) => {
            tracing::debug!(url, error = %err, "probe failed, defaulting to static");
            CrawlEngine::Static
        }
    }
}

async fn probe(client: &reqwest::Client, url: &str, config: &CrawlConfig) -> Result<CrawlEngine, reqwest::Error> {
    let mut response = client
        .get(url)
        .timeout(Duration::from_millis(config.probe_timeout_ms))
        .send()
        .await?
        .error_for_status()?;

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let mut head: Vec<u8> = Vec::with_capacity(config.probe_max_bytes.min(64 * 1024));
    while head.len() < config.probe_max_bytes {
        match response.chunk().await? {
            Some(chunk) => head.extend_from_slice(&chunk),
            None => break,
        }
    }
    head.truncate(config.probe_max_bytes);

    let head = String::from_utf8_lossy(&head);
    Ok(classify_probe(content_type.as_deref(), &head, config))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn long_article() -> String {
        format!(
            "<html><head><title>t</title></head><body><p>{}</p></body></html>",
            "plain server rendered prose ".repeat(20)
        )
    }

    #[test]
    fn social_domains_are_rendered() {
        assert!(is_js_heavy_domain("https://twitter.com/rustlang/status/1"));
        assert!(is_js_heavy_domain("https://www.reddit.com/r/rust"));
        assert!(is_js_heavy_domain("https://old.reddit.com/r/rust"));
        assert!(!is_js_heavy_domain("https://dropbox.com/x"));
        assert!(!is_js_heavy_domain("https://example.com"));
    }

    #[test]
    fn static_extensions_detected() {
        assert!(has_static_extension("https://example.com/paper.PDF"));
        assert!(has_static_extension("https://example.com/readme.md?raw=1"));
        assert!(!has_static_extension("https://example.com/app"));
    }

    #[test]
    fn domain_match_beats_extension() {
        assert_eq!(
            engine_from_url("https://x.com/file.html"),
            Some(CrawlEngine::Rendered)
        );
        assert_eq!(
            engine_from_url("https://example.com/file.html"),
            Some(CrawlEngine::Static)
        );
        assert_eq!(engine_from_url("https://example.com/"), None);
    }

    #[test]
    fn non_html_probe_is_static() {
        let config = CrawlConfig::default();
        assert_eq!(
            classify_probe(Some("application/json"), "{}", &config),
            CrawlEngine::Static
        );
        assert_eq!(classify_probe(None, "", &config), CrawlEngine::Static);
    }

    #[test]
    fn framework_marker_is_rendered() {
        let config = CrawlConfig::default();
        let html = format!(
            "<html><body><div id=\"root\" data-reactroot>{}</div></body></html>",
            "x".repeat(500)
        );
        assert_eq!(
            classify_probe(Some("text/html; charset=utf-8"), &html, &config),
            CrawlEngine::Rendered
        );
    }

    #[test]
    fn thin_body_is_rendered() {
        let config = CrawlConfig::default();
        let html = "<html><body><div id=\"app\"></div><script>boot()</script></body></html>";
        assert_eq!(classify_probe(Some("text/html"), html, &config), CrawlEngine::Rendered);
    }

    #[test]
    fn substantial_body_is_static() {
        let config = CrawlConfig::default();
        assert_eq!(
            classify_probe(Some("text/html"), &long_article(), &config),
            CrawlEngine::Static
        );
    }

    #[test]
    fn visible_text_counts_inner_spaces() {
        let html = format!("<html><body><p>{}</p></body></html>", "a ".repeat(60));
        assert_eq!(visible_body_chars(&html), Some(119));
        assert_eq!(
            classify_probe(Some("text/html"), &html, &CrawlConfig::default()),
            CrawlEngine::Static
        );
    }

    #[test]
    fn truncated_probe_without_body_end_is_static() {
        let html = "<html><head><title>big</title></head><body><div id=\"app\">";
        assert_eq!(visible_body_chars(html), None);
        assert_eq!(classify_probe(Some("text/html"), html, &CrawlConfig::default()), CrawlEngine::Static);
        assert_eq!(
            classify_probe(Some("text/html"), "<html><head></head></html>", &CrawlConfig::default()),
            CrawlEngine::Static
        );
    }

    #[tokio::test]
    async fn rendered_domain_skips_probe() {
        let client = reqwest::Client::new();
        let engine = detect_engine(&client, "https://twitter.com/a/status/1", &CrawlConfig::default()).await;
        assert_eq!(engine, CrawlEngine::Rendered);
    }

    #[tokio::test]
    async fn probe_failure_defaults_to_static() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let client = reqwest::Client::new();
        let engine = detect_engine(&client, &format!("{}/page", server.uri()), &CrawlConfig::default()).await;
        assert_eq!(engine, CrawlEngine::Static);
    }

    #[tokio::test]
    async fn probe_detects_spa_shell() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    "<html><body><div id=\"shell\"></div></body></html>",
                    "text/html",
                ),
            )
            .mount(&server)
            .await;
        let client = reqwest::Client::new();
        let engine = detect_engine(&client, &format!("{}/app", server.uri()), &CrawlConfig::default()).await;
        assert_eq!(engine, CrawlEngine::Rendered);
    }
}
