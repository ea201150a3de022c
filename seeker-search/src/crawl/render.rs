//! Rendered extraction through a shared headless Chromium instance.
//!
//! One browser process is launched lazily and reused across crawls. Every
//! URL gets its own page, bounded by a semaphore, and pages are closed when
//! extraction finishes or the crawl task is dropped.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::CrawlConfig;
use crate::crawl::extract::{collapse_blank_lines, truncate_chars, Extracted};
use crate::error::SearchError;

/// Client-side extraction mirroring the static rules: same container
/// priority, same stripped elements plus navigation landmarks.
pub const EXTRACT_JS: &str = r#"(() => {
  const pick = (sel) => document.querySelector(sel);
  const meta = pick('meta[name="description"]') || pick('meta[property="og:description"]');
  const container = pick('main') || pick('article') || pick('[role="main"]') || document.body;
  const result = {
    title: document.title || '',
    description: meta ? (meta.getAttribute('content') || '') : '',
    content: ''
  };
  if (!container) return result;
  const clone = container.cloneNode(true);
  clone.querySelectorAll('script, style, nav, footer, header, aside, noscript, iframe, form, svg, [role="navigation"], [role="banner"], [role="contentinfo"]')
    .forEach((el) => el.remove());
  result.content = clone.innerText || clone.textContent || '';
  return result;
})()"#;

/// Raw values returned by [`EXTRACT_JS`].
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct RenderedDom {
    /// `document.title`.
    #[serde(default)]
    pub title: String,
    /// Meta or Open Graph description.
    #[serde(default)]
    pub description: String,
    /// Container text after stripping.
    #[serde(default)]
    pub content: String,
}

impl RenderedDom {
    /// Normalise into the same shape static extraction produces.
    pub fn into_extracted(self, max_chars: usize) -> Extracted {
        let non_empty = |s: String| {
            let t = s.trim().to_owned();
            (!t.is_empty()).then_some(t)
        };
        Extracted {
            title: non_empty(self.title),
            description: non_empty(self.description),
            content: truncate_chars(&collapse_blank_lines(&self.content), max_chars),
        }
    }
}

/// Combine a navigation outcome with the extraction that followed it.
///
/// A page that failed or timed out while loading still yields whatever
/// text it had; the navigation error surfaces only when nothing was
/// extracted.
pub fn finish_render(
    navigation: Option<String>,
    extraction: Result<Extracted, SearchError>,
) -> Result<Extracted, SearchError> {
    match (navigation, extraction) {
        (None, extraction) => extraction,
        (Some(_), Ok(extracted)) if !extracted.content.trim().is_empty() => Ok(extracted),
        (Some(err), _) => Err(SearchError::Browser(format!("navigation failed: {err}"))),
    }
}

/// A script-executing page loader.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Load `url`, let scripts run, and extract readable text.
    async fn render(&self, url: &str, config: &CrawlConfig) -> Result<Extracted, SearchError>;

    /// Release the browser, if one is running.
    async fn shutdown(&self) {}
}

/// Renderer used when the `rendered` feature is compiled out.
#[derive(Debug, Default)]
pub struct DisabledRenderer;

#[async_trait]
impl Renderer for DisabledRenderer {
    async fn render(&self, _url: &str, _config: &CrawlConfig) -> Result<Extracted, SearchError> {
        Err(SearchError::Unavailable(
            "rendered crawling is not compiled into this build".into(),
        ))
    }
}

/// The renderer this build provides.
pub fn default_renderer(config: &CrawlConfig) -> Arc<dyn Renderer> {
    #[cfg(feature = "rendered")]
    {
        Arc::new(chrome::ChromeRenderer::new(config))
    }
    #[cfg(not(feature = "rendered"))]
    {
        let _ = config;
        Arc::new(DisabledRenderer)
    }
}

/// Locate a Chromium-family binary: `CHROME_BIN`, then well-known paths.
pub fn find_chrome_binary() -> Option<std::path::PathBuf> {
    if let Ok(explicit) = std::env::var("CHROME_BIN") {
        let path = std::path::PathBuf::from(explicit);
        if path.exists() {
            return Some(path);
        }
    }
    const CANDIDATES: &[&str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];
    CANDIDATES
        .iter()
        .map(std::path::PathBuf::from)
        .find(|p| p.exists())
}

#[cfg(feature = "rendered")]
pub mod chrome {
    //! Chromium-backed [`Renderer`].

    use std::time::Duration;

    use async_trait::async_trait;
    use chromiumoxide::{Browser, BrowserConfig, Page};
    use futures::StreamExt;
    use tokio::sync::{Mutex, Semaphore};
    use tokio::task::JoinHandle;

    use super::{finish_render, find_chrome_binary, RenderedDom, Renderer, EXTRACT_JS};
    use crate::config::CrawlConfig;
    use crate::crawl::extract::Extracted;
    use crate::error::SearchError;

    /// Consecutive handler errors tolerated before the browser is treated as dead.
    const HANDLER_ERROR_TOLERANCE: usize = 8;

    struct Running {
        browser: Browser,
        handler: JoinHandle<()>,
    }

    impl Drop for Running {
        fn drop(&mut self) {
            self.handler.abort();
        }
    }

    /// Shared headless browser with a bounded number of open pages.
    pub struct ChromeRenderer {
        running: Mutex<Option<Running>>,
        permits: Semaphore,
    }

    impl ChromeRenderer {
        /// Create a renderer. The browser starts on first use.
        pub fn new(config: &CrawlConfig) -> Self {
            Self {
                running: Mutex::new(None),
                permits: Semaphore::new(config.max_concurrent_pages.max(1)),
            }
        }

        async fn launch(config: &CrawlConfig) -> Result<Running, SearchError> {
            let mut builder = BrowserConfig::builder();
            if let Some(bin) = config.chrome_executable.clone().or_else(find_chrome_binary) {
                if !bin.exists() {
                    return Err(SearchError::Unavailable(format!(
                        "browser executable not found: {}",
                        bin.display()
                    )));
                }
                builder = builder.chrome_executable(bin);
            }
            if !config.headless {
                builder = builder.with_head();
            }
            let mut args = vec!["--disable-gpu".to_string(), "--disable-dev-shm-usage".to_string()];
            if std::env::var("CI").is_ok() || std::env::var("NO_SANDBOX").is_ok() {
                args.push("--no-sandbox".to_string());
            }
            if let Some(ua) = &config.user_agent {
                args.push(format!("--user-agent={ua}"));
            }
            let browser_config = builder
                .args(args)
                .build()
                .map_err(|e| SearchError::Unavailable(format!("no usable browser: {e}")))?;

            let (browser, mut handler) = Browser::launch(browser_config)
                .await
                .map_err(|e| SearchError::Unavailable(format!("browser launch failed: {e}")))?;

            let handler = tokio::spawn(async move {
                let mut consecutive_errors = 0usize;
                while let Some(event) = handler.next().await {
                    match event {
                        Ok(()) => consecutive_errors = 0,
                        Err(err) => {
                            consecutive_errors += 1;
                            tracing::debug!(error = %err, consecutive_errors, "browser event error");
                            if consecutive_errors >= HANDLER_ERROR_TOLERANCE {
                                break;
                            }
                        }
                    }
                }
                tracing::debug!("browser event loop exited");
            });

            tracing::info!("headless browser launched");
            Ok(Running { browser, handler })
        }

        async fn open_page(&self, config: &CrawlConfig) -> Result<Page, SearchError> {
            let mut running = self.running.lock().await;
            let alive = running
                .as_ref()
                .is_some_and(|r| !r.handler.is_finished());
            if !alive {
                running.take();
                *running = Some(Self::launch(config).await?);
            }
            let Some(current) = running.as_ref() else {
                return Err(SearchError::Browser("browser not running".into()));
            };
            current
                .browser
                .new_page("about:blank")
                .await
                .map_err(|e| SearchError::Browser(format!("failed to open page: {e}")))
        }
    }

    /// Closes its page when dropped, including on cancellation.
    struct PageGuard(Option<Page>);

    impl PageGuard {
        fn page(&self) -> Result<&Page, SearchError> {
            self.0
                .as_ref()
                .ok_or_else(|| SearchError::Browser("page already closed".into()))
        }
    }

    impl Drop for PageGuard {
        fn drop(&mut self) {
            if let Some(page) = self.0.take() {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move {
                        let _ = page.close().await;
                    });
                }
            }
        }
    }

    /// Poll until the document is complete, then give late requests a
    /// short quiet period. Gives up silently at `budget`.
    async fn wait_for_idle(page: &Page, budget: Duration) {
        let settle = async {
            loop {
                let state = page
                    .evaluate("document.readyState")
                    .await
                    .ok()
                    .and_then(|v| v.into_value::<String>().ok());
                if state.as_deref() == Some("complete") {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    return;
                }
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        };
        if tokio::time::timeout(budget, settle).await.is_err() {
            tracing::debug!("network idle wait timed out, extracting what is loaded");
        }
    }

    #[async_trait]
    impl Renderer for ChromeRenderer {
        async fn render(&self, url: &str, config: &CrawlConfig) -> Result<Extracted, SearchError> {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| SearchError::Browser("renderer shut down".into()))?;

            let guard = PageGuard(Some(self.open_page(config).await?));
            let page = guard.page()?;

            let navigation = page.goto(url).await.err().map(|e| e.to_string());
            if let Some(err) = &navigation {
                tracing::warn!(url, error = %err, "navigation incomplete, extracting what loaded");
            }
            wait_for_idle(page, Duration::from_millis(config.network_idle_timeout_ms)).await;

            let extraction = match page.evaluate(EXTRACT_JS).await {
                Ok(value) => value
                    .into_value::<RenderedDom>()
                    .map(|dom| dom.into_extracted(config.max_content_length))
                    .map_err(|e| SearchError::Parse(format!("extraction result: {e}"))),
                Err(e) => Err(SearchError::Browser(format!("extraction script failed: {e}"))),
            };

            finish_render(navigation, extraction)
        }

        async fn shutdown(&self) {
            if let Some(mut running) = self.running.lock().await.take() {
                if let Err(err) = running.browser.close().await {
                    tracing::debug!(error = %err, "browser close failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn rendered_dom_normalised_like_static_text() {
        let dom = RenderedDom {
            title: "  Feed ".into(),
            description: String::new(),
            content: "first post\n\n\n\n  second   post \n".into(),
        };
        let extracted = dom.into_extracted(1000);
        assert_eq!(extracted.title.as_deref(), Some("Feed"));
        assert!(extracted.description.is_none());
        assert_eq!(extracted.content, "first post\n\nsecond post");
    }

    #[test]
    fn rendered_dom_truncated() {
        let dom = RenderedDom {
            content: "abcdef".into(),
            ..Default::default()
        };
        assert_eq!(dom.into_extracted(3).content, "abc");
    }

    #[test]
    fn extraction_script_strips_landmarks() {
        assert!(EXTRACT_JS.contains("[role=\"navigation\"]"));
        assert!(EXTRACT_JS.contains("[role=\"contentinfo\"]"));
        assert!(EXTRACT_JS.contains("pick('main') || pick('article')"));
    }

    #[test]
    fn timed_out_navigation_keeps_partial_text() {
        let partial = Extracted {
            title: Some("Feed".into()),
            description: None,
            content: "first post".into(),
        };
        let kept = finish_render(Some("request timed out".into()), Ok(partial)).unwrap();
        assert_eq!(kept.content, "first post");
    }

    #[test]
    fn failed_navigation_without_text_is_an_error() {
        let empty = finish_render(Some("net::ERR_NAME_NOT_RESOLVED".into()), Ok(Extracted::default()));
        let err = empty.unwrap_err().to_string();
        assert!(err.contains("navigation failed"));
        assert!(err.contains("ERR_NAME_NOT_RESOLVED"));

        let broken = finish_render(
            Some("request timed out".into()),
            Err(SearchError::Browser("extraction script failed: closed".into())),
        );
        assert!(broken.unwrap_err().to_string().contains("navigation failed: request timed out"));
    }

    #[test]
    fn clean_navigation_passes_extraction_through() {
        let err = finish_render(None, Err(SearchError::Parse("bad".into()))).unwrap_err();
        assert!(matches!(err, SearchError::Parse(_)));
    }

    #[cfg(feature = "rendered")]
    #[tokio::test]
    async fn missing_browser_executable_is_unavailable() {
        let config = CrawlConfig {
            chrome_executable: Some("/nonexistent/chrome".into()),
            ..Default::default()
        };
        let renderer = chrome::ChromeRenderer::new(&config);
        let err = renderer.render("https://example.com", &config).await.unwrap_err();
        assert!(err.is_unavailable(), "{err}");
    }

    #[tokio::test]
    async fn disabled_renderer_reports_unavailable() {
        let err = DisabledRenderer
            .render("https://x.com", &CrawlConfig::default())
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
    }
}
