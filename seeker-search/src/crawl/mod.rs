//! Dual-engine page crawler.
//!
//! Produces one [`CrawledPage`] per requested URL. In `auto` mode each URL
//! is assigned an engine first (see [`detect`]), then the static and
//! rendered groups are crawled concurrently. A failure on one URL becomes
//! an `error` on that page and never aborts the batch.

pub mod context;
pub mod detect;
pub mod extract;
pub mod render;

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;

use crate::config::CrawlConfig;
use crate::error::SearchError;
use crate::http;
use crate::types::{CrawlEngine, CrawlResult, CrawledPage};
use crate::url_util;

use self::extract::Extracted;
use self::render::Renderer;

/// Crawls URLs with a static HTTP client and a shared renderer.
pub struct Crawler {
    config: CrawlConfig,
    client: reqwest::Client,
    renderer: Arc<dyn Renderer>,
}

impl std::fmt::Debug for Crawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crawler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Crawler {
    /// Create a crawler with the renderer this build provides.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for an invalid config and
    /// [`SearchError::Http`] if the HTTP client cannot be built.
    pub fn new(config: CrawlConfig) -> Result<Self, SearchError> {
        let renderer = render::default_renderer(&config);
        Self::with_renderer(config, renderer)
    }

    /// Create a crawler with an explicit renderer.
    ///
    /// # Errors
    ///
    /// Same as [`Crawler::new`].
    pub fn with_renderer(
        config: CrawlConfig,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        let client = http::build_client(
            Duration::from_secs(config.timeout_seconds),
            config.user_agent.as_deref(),
        )?;
        Ok(Self {
            config,
            client,
            renderer,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawl a batch of URLs, preserving request order in the result.
    pub async fn crawl(&self, urls: &[String], engine: CrawlEngine) -> CrawlResult {
        let started = Instant::now();

        let engines: Vec<CrawlEngine> = match engine {
            CrawlEngine::Auto => {
                join_all(
                    urls.iter()
                        .map(|u| detect::detect_engine(&self.client, u, &self.config)),
                )
                .await
            }
            fixed => vec![fixed; urls.len()],
        };

        let (static_urls, rendered_urls): (Vec<_>, Vec<_>) = urls
            .iter()
            .zip(engines)
            .enumerate()
            .partition(|(_, (_, engine))| *engine == CrawlEngine::Static);

        tracing::debug!(
            total = urls.len(),
            static_count = static_urls.len(),
            rendered_count = rendered_urls.len(),
            "crawl batch partitioned"
        );

        let static_batch = join_all(
            static_urls
                .into_iter()
                .map(|(i, (url, _))| async move { (i, self.crawl_static(url).await) }),
        );
        let rendered_batch = join_all(
            rendered_urls
                .into_iter()
                .map(|(i, (url, _))| async move { (i, self.crawl_rendered(url).await) }),
        );
        let (static_pages, rendered_pages) = tokio::join!(static_batch, rendered_batch);

        let mut indexed: Vec<(usize, CrawledPage)> =
            static_pages.into_iter().chain(rendered_pages).collect();
        indexed.sort_by_key(|(i, _)| *i);
        let pages: Vec<CrawledPage> = indexed.into_iter().map(|(_, p)| p).collect();

        let result = CrawlResult::from_pages(pages, elapsed_ms(started));
        tracing::info!(
            total = result.total_pages,
            successful = result.successful_pages,
            elapsed_ms = result.total_crawl_time_ms,
            "crawl batch finished"
        );
        result
    }

    /// Crawl a single URL with an explicit or detected engine.
    pub async fn crawl_one(&self, url: &str, engine: CrawlEngine) -> CrawledPage {
        let engine = match engine {
            CrawlEngine::Auto => detect::detect_engine(&self.client, url, &self.config).await,
            fixed => fixed,
        };
        match engine {
            CrawlEngine::Rendered => self.crawl_rendered(url).await,
            _ => self.crawl_static(url).await,
        }
    }

    /// Release the browser, if one was started.
    pub async fn shutdown(&self) {
        self.renderer.shutdown().await;
    }

    async fn crawl_static(&self, url: &str) -> CrawledPage {
        let started = Instant::now();
        let budget = Duration::from_secs(self.config.timeout_seconds);
        let outcome = match tokio::time::timeout(budget, self.fetch_static(url)).await {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout(format!(
                "static crawl exceeded {}s",
                self.config.timeout_seconds
            ))),
        };
        finish_page(url, CrawlEngine::Static, outcome, elapsed_ms(started))
    }

    async fn fetch_static(&self, url: &str) -> Result<Extracted, SearchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| http::map_reqwest_error("fetch failed", e))?
            .error_for_status()
            .map_err(|e| SearchError::Http(format!("fetch failed: {e}")))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if content_type.contains("application/pdf") || content_type.starts_with("image/") {
            return Err(SearchError::Parse(format!(
                "unsupported content type: {content_type}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| http::map_reqwest_error("body read failed", e))?;

        let max = self.config.max_content_length;
        let looks_html = content_type.contains("html")
            || (content_type.is_empty() && body.trim_start().starts_with('<'));
        Ok(if looks_html {
            extract::extract_html(&body, max)
        } else {
            extract::extract_plain_text(&body, max)
        })
    }

    async fn crawl_rendered(&self, url: &str) -> CrawledPage {
        let started = Instant::now();
        let secs = self.config.timeout_seconds + self.config.render_extra_seconds;
        let outcome = match tokio::time::timeout(
            Duration::from_secs(secs),
            self.renderer.render(url, &self.config),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout(format!("rendered crawl exceeded {secs}s"))),
        };

        match outcome {
            Err(err) if err.is_unavailable() => {
                tracing::warn!(url, error = %err, "renderer unavailable, using static fetch");
                self.crawl_static(url).await
            }
            outcome => finish_page(url, CrawlEngine::Rendered, outcome, elapsed_ms(started)),
        }
    }
}

fn finish_page(
    url: &str,
    engine: CrawlEngine,
    outcome: Result<Extracted, SearchError>,
    elapsed_ms: u64,
) -> CrawledPage {
    match outcome {
        Ok(extracted) => {
            let error = extracted
                .content
                .trim()
                .is_empty()
                .then(|| "no extractable content".to_string());
            CrawledPage {
                url: url.to_owned(),
                root_url: url_util::root_url(url),
                title: extracted.title,
                content: extracted.content,
                meta_description: extracted.description,
                elapsed_ms,
                engine,
                error,
            }
        }
        Err(err) => {
            tracing::warn!(url, %engine, error = %err, "page crawl failed");
            CrawledPage::failed(url, engine, err.to_string(), elapsed_ms)
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
