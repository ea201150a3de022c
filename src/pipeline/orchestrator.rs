//! The run coordinator.
//!
//! A run executes on its own task and reports through a bounded channel:
//!
//! ```text
//! analyzing -> searching | reading -> retrieving -> generating -> done
//!                                                        \-> error (from anywhere)
//! ```
//!
//! Cancelling the returned token, or dropping the event stream, stops the
//! run and every branch it is awaiting. A cancelled run sends nothing more.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::cache::{CachedResponse, ResponseCache, mode_key};
use super::citation::{Citation, build_citations, number_sources};
use super::classifier::Classifier;
use super::events::StreamEvent;
use super::fanout::{self, FanoutOutcome};
use super::phase::PipelinePhase;
use super::query::Query;
use super::reader::{PageReader, page_error, page_to_source};
use super::retriever::Retriever;
use super::router::{SearchStrategy, route};
use super::sources::Searchers;
use super::state::PipelineState;
use super::synthesizer::{build_messages, build_system_prompt};
use crate::config::{FanoutConfig, SeekerConfig};
use crate::error::PipelineError;
use crate::llm::{self, LlmEvent, ProviderAdapter, RequestOptions};

/// Buffered events per run before the producer waits on the consumer.
const EVENT_BUFFER: usize = 64;

/// Stream of events for one run. Ends as soon as the run is cancelled.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Why a run stopped early.
enum Halt {
    /// Unrecoverable failure, reported as the terminal error event.
    Fatal(String),
    /// The consumer went away.
    Disconnected,
}

impl From<PipelineError> for Halt {
    fn from(e: PipelineError) -> Self {
        Self::Fatal(e.to_string())
    }
}

struct Sink {
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

impl Sink {
    async fn send(&self, event: StreamEvent) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            return Err(Halt::Disconnected);
        }
        self.tx.send(event).await.map_err(|_| Halt::Disconnected)
    }

    /// Advance the run and announce the new phase.
    async fn enter(&self, state: &mut PipelineState, phase: PipelinePhase) -> Result<(), Halt> {
        if state.advance(phase) {
            tracing::debug!(phase = %phase, "phase");
            self.send(StreamEvent::status(phase)).await?;
        }
        Ok(())
    }
}

/// Collected result of a run that finished with `done`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// The query orchestration pipeline. Shared across runs behind an `Arc`.
pub struct Pipeline {
    classifier: Classifier,
    searchers: Searchers,
    reader: Arc<dyn PageReader>,
    retriever: Retriever,
    provider: Arc<dyn ProviderAdapter>,
    cache: Option<Arc<ResponseCache>>,
    fanout: FanoutConfig,
    options: RequestOptions,
    page_content_chars: usize,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("classifier", &self.classifier)
            .field("provider", &self.provider.name())
            .field("retriever", &self.retriever)
            .field("cache", &self.cache.as_ref().map(|c| c.len()))
            .field("fanout", &self.fanout)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Pipeline with heuristic classification, no retrieval indexes and no cache.
    pub fn new(
        provider: Arc<dyn ProviderAdapter>,
        searchers: Searchers,
        reader: Arc<dyn PageReader>,
    ) -> Self {
        Self {
            classifier: Classifier::heuristic(),
            searchers,
            reader,
            retriever: Retriever::new(3, Duration::from_secs(5)),
            provider,
            cache: None,
            fanout: FanoutConfig::default(),
            options: RequestOptions::new(),
            page_content_chars: 8000,
        }
    }

    /// Wire every component from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Llm`] when a provider cannot be built.
    pub fn from_config(
        config: &SeekerConfig,
        reader: Arc<dyn PageReader>,
    ) -> Result<Self, PipelineError> {
        let provider = llm::build_provider(&config.llm)?;

        let classifier = if config.classifier.enabled {
            let mut endpoint = config.llm.primary();
            if let Some(model) = &config.classifier.model {
                endpoint.model.clone_from(model);
            }
            Classifier::new(
                llm::build_adapter(&endpoint)?,
                Duration::from_millis(config.classifier.timeout_ms),
            )
        } else {
            Classifier::heuristic()
        };

        let cache = config.cache.enabled.then(|| {
            Arc::new(ResponseCache::new(
                config.cache.max_entries,
                Duration::from_secs(config.cache.ttl_secs),
            ))
        });

        Ok(Self {
            classifier,
            searchers: Searchers::from_config(&config.search),
            reader,
            retriever: Retriever::from_config(&config.retrieval),
            provider,
            cache,
            fanout: config.fanout.clone(),
            options: RequestOptions::new()
                .with_temperature(config.llm.temperature)
                .with_max_tokens(config.llm.max_tokens),
            page_content_chars: config.crawl.content_per_source,
        })
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = retriever;
        self
    }

    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_fanout(mut self, fanout: FanoutConfig) -> Self {
        self.fanout = fanout;
        self
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn searchers(&self) -> &Searchers {
        &self.searchers
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    /// Start a run. Events arrive on the returned stream.
    pub fn stream(self: &Arc<Self>, query: Query) -> (EventStream, CancellationToken) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let run_id = Uuid::new_v4();

        let pipeline = Arc::clone(self);
        let token = cancel.clone();
        let span = tracing::info_span!("pipeline_run", run_id = %run_id);
        tokio::spawn(
            async move {
                let sink = Sink {
                    tx,
                    cancel: token.clone(),
                };
                let closed = sink.tx.clone();
                tokio::select! {
                    biased;

                    () = token.cancelled() => {
                        tracing::info!("run cancelled");
                    }
                    () = closed.closed() => {
                        tracing::info!("consumer dropped, run abandoned");
                    }
                    outcome = pipeline.execute(query, &sink) => match outcome {
                        Ok(()) => {}
                        Err(Halt::Fatal(message)) => {
                            tracing::error!(error = %message, "run failed");
                            let _ = sink.send(StreamEvent::error(message)).await;
                        }
                        Err(Halt::Disconnected) => {
                            tracing::info!("consumer dropped, run abandoned");
                        }
                    }
                }
            }
            .instrument(span),
        );

        let events = ReceiverStream::new(rx).take_until(cancel.clone().cancelled_owned());
        (Box::pin(events), cancel)
    }

    /// Run to completion and collect the answer.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Server`] carrying the terminal error message,
    /// or when the run ended without a terminal event.
    pub async fn answer(self: &Arc<Self>, query: Query) -> Result<Answer, PipelineError> {
        let (mut events, _cancel) = self.stream(query);
        let mut answer = Answer::default();
        while let Some(event) = events.next().await {
            match event {
                StreamEvent::Citation { citation } => answer.citations.push(citation),
                StreamEvent::Content { text } => answer.text.push_str(&text),
                StreamEvent::Done => return Ok(answer),
                StreamEvent::Error { message } => return Err(PipelineError::Server(message)),
                StreamEvent::Status { .. } | StreamEvent::Mode { .. } => {}
            }
        }
        Err(PipelineError::Server("run ended without a result".into()))
    }

    async fn execute(&self, query: Query, sink: &Sink) -> Result<(), Halt> {
        query.validate()?;
        tracing::debug!(query = %query.message, "run started");

        let mut state = PipelineState::new(query);
        sink.send(StreamEvent::status(PipelinePhase::Analyzing)).await?;

        let mode = mode_key(state.query.mode);
        let cache = self.cache.as_ref().filter(|_| state.query.is_cacheable());
        if let Some(hit) = cache.and_then(|c| c.get(&state.query.message, mode)) {
            for citation in hit.citations {
                sink.send(StreamEvent::Citation { citation }).await?;
            }
            sink.send(StreamEvent::Content { text: hit.response }).await?;
            state.advance(PipelinePhase::Done);
            return sink.send(StreamEvent::Done).await;
        }

        let classification = self.classifier.classify(&state.query.message).await;
        let routed = classification.effective_mode(state.query.mode);
        tracing::info!(
            complexity = %classification.complexity,
            routed = %routed,
            intent = %classification.intent,
            "classified"
        );
        sink.send(StreamEvent::mode(&classification, routed)).await?;
        state.classification = Some(classification);

        if state.query.urls().is_empty() {
            self.search(&mut state, sink, route(Some(routed))).await?;
        } else {
            sink.enter(&mut state, PipelinePhase::Reading).await?;
            let urls = state.query.urls().to_vec();
            self.read_pages(&mut state, &urls).await;
        }

        let citations = build_citations(state.evidence());
        for citation in &citations {
            sink.send(StreamEvent::Citation {
                citation: citation.clone(),
            })
            .await?;
        }
        state.citations = citations;

        sink.enter(&mut state, PipelinePhase::Retrieving).await?;
        state.context = self
            .retriever
            .retrieve(&state.query.message, state.query.user_id.as_deref())
            .await;

        sink.enter(&mut state, PipelinePhase::Generating).await?;
        self.generate(&mut state, sink).await?;

        if let Some(cache) = cache {
            cache.put(
                &state.query.message,
                mode,
                CachedResponse {
                    response: state.response.clone(),
                    citations: state.citations.clone(),
                },
            );
        }

        tracing::info!(
            citations = state.citations.len(),
            context = state.context.len(),
            degraded = state.errors.len(),
            chars = state.response.len(),
            "run finished"
        );
        state.advance(PipelinePhase::Done);
        sink.send(StreamEvent::Done).await
    }

    async fn search(
        &self,
        state: &mut PipelineState,
        sink: &Sink,
        strategy: SearchStrategy,
    ) -> Result<(), Halt> {
        sink.enter(state, PipelinePhase::Searching).await?;
        let outcome = match strategy {
            SearchStrategy::SimpleSearch => {
                fanout::simple_search(&self.searchers, &state.query.message, &self.fanout).await
            }
            SearchStrategy::ResearchSearch => {
                let kinds = state
                    .classification
                    .as_ref()
                    .map(|c| c.sources.clone())
                    .unwrap_or_default();
                fanout::research_search(&self.searchers, &state.query.message, &kinds, &self.fanout)
                    .await
            }
        };
        let FanoutOutcome {
            web,
            academic,
            video,
            errors,
        } = outcome;
        state.web_results = web;
        state.academic_results = academic;
        state.video_results = video;
        for error in errors {
            state.record_error(error);
        }

        let top = self.fanout.crawl_top_results.min(state.web_results.len());
        if top > 0 {
            sink.enter(state, PipelinePhase::Reading).await?;
            self.enrich_top_results(state, top).await;
        }
        Ok(())
    }

    /// Read explicit URLs; usable pages become web evidence.
    async fn read_pages(&self, state: &mut PipelineState, urls: &[String]) {
        let crawl = self.reader.read(urls).await;
        tracing::info!(
            total = crawl.total_pages,
            successful = crawl.successful_pages,
            elapsed_ms = crawl.total_crawl_time_ms,
            "pages read"
        );
        for page in &crawl.pages {
            match page_to_source(page, self.page_content_chars) {
                Some(source) => state.web_results.push(source),
                None => state.record_error(page_error(page)),
            }
        }
    }

    /// Replace the snippets of the first `top` web hits with page content.
    async fn enrich_top_results(&self, state: &mut PipelineState, top: usize) {
        let urls: Vec<String> = state.web_results[..top].iter().map(|r| r.url.clone()).collect();
        let crawl = self.reader.read(&urls).await;
        for (result, page) in state.web_results.iter_mut().zip(&crawl.pages) {
            if let Some(page_source) = page_to_source(page, self.page_content_chars) {
                result.content = page_source.content;
                result.metadata.extend(page_source.metadata);
            }
        }
        for page in crawl.pages.iter().filter(|p| !p.is_success()) {
            state.record_error(page_error(page));
        }
    }

    async fn generate(&self, state: &mut PipelineState, sink: &Sink) -> Result<(), Halt> {
        let system_prompt = {
            let cited = number_sources(state.evidence());
            build_system_prompt(
                &cited,
                &state.context,
                state.query.custom_instructions.as_deref(),
                self.page_content_chars,
            )
        };
        let messages = build_messages(system_prompt, &state.query.chat_history, &state.query.message);

        let mut stream = self
            .provider
            .send(&messages, &self.options)
            .await
            .map_err(|e| Halt::Fatal(format!("generation failed: {e}")))?;

        while let Some(event) = stream.next().await {
            match event {
                LlmEvent::TextDelta { text } => {
                    state.response.push_str(&text);
                    sink.send(StreamEvent::Content { text }).await?;
                }
                LlmEvent::StreamError { error } => {
                    return Err(Halt::Fatal(format!("generation failed: {error}")));
                }
                LlmEvent::StreamStart { model, .. } => {
                    tracing::debug!(model = %model, provider = self.provider.name(), "generation started");
                }
                LlmEvent::StreamEnd { finish_reason } => {
                    tracing::debug!(finish_reason = %finish_reason, "generation finished");
                }
            }
        }

        if state.response.trim().is_empty() {
            return Err(Halt::Fatal("generation failed: model returned no content".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::llm::{LlmError, LlmEventStream, Message};
    use crate::pipeline::sources::{SourceKind, SourceResult, SourceSearcher};
    use async_trait::async_trait;
    use seeker_search::{CrawlEngine, CrawlResult, CrawledPage, SearchError};
    use std::collections::BTreeMap;

    struct OneHit;

    #[async_trait]
    impl SourceSearcher for OneHit {
        fn kind(&self) -> SourceKind {
            SourceKind::Web
        }

        async fn search(&self, _query: &str, _k: usize) -> Result<Vec<SourceResult>, SearchError> {
            Ok(vec![SourceResult {
                title: "Hit".into(),
                url: "https://hit.example/a".into(),
                snippet: "short snippet".into(),
                content: "short snippet".into(),
                kind: SourceKind::Web,
                authors: Vec::new(),
                published: String::new(),
                metadata: BTreeMap::new(),
            }])
        }
    }

    struct Pages;

    #[async_trait]
    impl PageReader for Pages {
        async fn read(&self, urls: &[String]) -> CrawlResult {
            let pages = urls
                .iter()
                .map(|url| {
                    if url.contains("broken") {
                        CrawledPage::failed(url, CrawlEngine::Static, "HTTP 404", 3)
                    } else {
                        CrawledPage {
                            url: url.clone(),
                            root_url: "https://hit.example".into(),
                            title: Some("Full page".into()),
                            content: "the whole article".into(),
                            meta_description: None,
                            elapsed_ms: 5,
                            engine: CrawlEngine::Static,
                            error: None,
                        }
                    }
                })
                .collect();
            CrawlResult::from_pages(pages, 5)
        }
    }

    struct Echo;

    #[async_trait]
    impl ProviderAdapter for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn send(
            &self,
            messages: &[Message],
            _options: &RequestOptions,
        ) -> Result<LlmEventStream, LlmError> {
            let system = messages[0].content.clone();
            Ok(Box::pin(futures_util::stream::iter(vec![LlmEvent::TextDelta {
                text: system,
            }])))
        }
    }

    /// Emits every token without yielding in between.
    struct Burst;

    #[async_trait]
    impl ProviderAdapter for Burst {
        fn name(&self) -> &str {
            "burst"
        }

        async fn send(
            &self,
            _messages: &[Message],
            _options: &RequestOptions,
        ) -> Result<LlmEventStream, LlmError> {
            let tokens = (0..500).map(|i| LlmEvent::TextDelta {
                text: format!("t{i} "),
            });
            Ok(Box::pin(futures_util::stream::iter(tokens)))
        }
    }

    fn pipeline() -> Arc<Pipeline> {
        let searchers = Searchers {
            web: Arc::new(OneHit),
            academic: Arc::new(OneHit),
            video: Arc::new(OneHit),
        };
        Arc::new(Pipeline::new(Arc::new(Echo), searchers, Arc::new(Pages)))
    }

    #[tokio::test]
    async fn explicit_urls_are_read_not_searched() {
        let query = Query::new("summarise these").with_urls(vec![
            "https://hit.example/post".into(),
            "https://hit.example/broken".into(),
        ]);
        let (events, _cancel) = pipeline().stream(query);
        let events: Vec<StreamEvent> = events.collect().await;

        assert!(events.contains(&StreamEvent::status(PipelinePhase::Reading)));
        assert!(!events.contains(&StreamEvent::status(PipelinePhase::Searching)));
        let citations: Vec<&Citation> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Citation { citation } => Some(citation),
                _ => None,
            })
            .collect();
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].title, "Full page");
        assert_eq!(events.last(), Some(&StreamEvent::Done));
    }

    #[tokio::test]
    async fn crawl_top_results_enriches_content() {
        let p = Pipeline::new(
            Arc::new(Echo),
            Searchers {
                web: Arc::new(OneHit),
                academic: Arc::new(OneHit),
                video: Arc::new(OneHit),
            },
            Arc::new(Pages),
        )
        .with_fanout(FanoutConfig {
            crawl_top_results: 3,
            ..Default::default()
        });
        let answer = Arc::new(p).answer(Query::new("what is a hit")).await.unwrap();
        assert!(answer.text.contains("- Content: the whole article"));
        assert_eq!(answer.citations[0].snippet, "short snippet");
    }

    #[tokio::test]
    async fn cancel_mid_generation_delivers_nothing_more() {
        let p = Arc::new(Pipeline::new(
            Arc::new(Burst),
            Searchers {
                web: Arc::new(OneHit),
                academic: Arc::new(OneHit),
                video: Arc::new(OneHit),
            },
            Arc::new(Pages),
        ));
        let (mut events, cancel) = p.stream(Query::new("what is a hit"));

        while let Some(event) = events.next().await {
            if matches!(event, StreamEvent::Content { .. }) {
                break;
            }
        }
        cancel.cancel();

        let after: Vec<StreamEvent> = events.collect().await;
        assert!(after.is_empty(), "events after cancel: {}", after.len());
    }

    #[tokio::test]
    async fn cancelled_sink_halts_execution() {
        let p = Arc::new(Pipeline::new(
            Arc::new(Burst),
            Searchers {
                web: Arc::new(OneHit),
                academic: Arc::new(OneHit),
                video: Arc::new(OneHit),
            },
            Arc::new(Pages),
        ));
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let sink = Sink {
            tx,
            cancel: cancel.clone(),
        };
        cancel.cancel();

        let outcome = p.execute(Query::new("what is a hit"), &sink).await;
        assert!(matches!(outcome, Err(Halt::Disconnected)));
        drop(sink);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn invalid_query_yields_single_error() {
        let (events, _cancel) = pipeline().stream(Query::new(""));
        let events: Vec<StreamEvent> = events.collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::Error { message } if message.contains("empty")));
    }
}
