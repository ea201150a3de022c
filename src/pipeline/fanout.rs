//! Source search fan-out.
//!
//! The simple path runs one bounded web search. The research path runs
//! every required source kind concurrently, each under its own timeout,
//! and waits for all of them to settle. A failed or slow kind leaves its
//! list empty and adds one error string; the other kinds are unaffected.

use std::time::{Duration, Instant};

use futures_util::future::join_all;

use super::sources::{Searchers, SourceKind, SourceResult};
use crate::config::FanoutConfig;

/// Results requested per kind on the research path.
fn research_limit(kind: SourceKind) -> usize {
    match kind {
        SourceKind::Web => 10,
        SourceKind::Arxiv => 5,
        SourceKind::Youtube => 3,
    }
}

/// Settled results of a fan-out.
#[derive(Debug, Clone, Default)]
pub struct FanoutOutcome {
    pub web: Vec<SourceResult>,
    pub academic: Vec<SourceResult>,
    pub video: Vec<SourceResult>,
    pub errors: Vec<String>,
}

impl FanoutOutcome {
    fn slot(&mut self, kind: SourceKind) -> &mut Vec<SourceResult> {
        match kind {
            SourceKind::Web => &mut self.web,
            SourceKind::Arxiv => &mut self.academic,
            SourceKind::Youtube => &mut self.video,
        }
    }

    pub fn total(&self) -> usize {
        self.web.len() + self.academic.len() + self.video.len()
    }
}

/// One web search bounded by `simple_timeout_secs`.
pub async fn simple_search(searchers: &Searchers, query: &str, config: &FanoutConfig) -> FanoutOutcome {
    let mut outcome = FanoutOutcome::default();
    let timeout = Duration::from_secs(config.simple_timeout_secs);
    let started = Instant::now();

    match tokio::time::timeout(timeout, searchers.web.search(query, config.simple_max_results)).await {
        Ok(Ok(results)) => {
            tracing::info!(
                count = results.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "simple search finished"
            );
            outcome.web = results;
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "simple search failed");
            outcome.errors.push(format!("Web search failed: {e}"));
        }
        Err(_) => {
            tracing::warn!(timeout_secs = config.simple_timeout_secs, "simple search timed out");
            outcome.errors.push("Web search timed out".to_owned());
        }
    }
    outcome
}

/// Search every kind in `kinds` concurrently.
///
/// Each kind gets `research_timeout_secs * research_source_fraction`.
pub async fn research_search(
    searchers: &Searchers,
    query: &str,
    kinds: &[SourceKind],
    config: &FanoutConfig,
) -> FanoutOutcome {
    let per_source = config.research_source_timeout();
    let started = Instant::now();

    let selected = SourceKind::ALL.into_iter().filter(|k| kinds.contains(k));
    let settled = join_all(selected.map(|kind| async move {
        let search = searchers.get(kind).search(query, research_limit(kind));
        (kind, tokio::time::timeout(per_source, search).await)
    }))
    .await;

    let mut outcome = FanoutOutcome::default();
    for (kind, result) in settled {
        match result {
            Ok(Ok(results)) => {
                tracing::debug!(source = %kind, count = results.len(), "source search finished");
                *outcome.slot(kind) = results;
            }
            Ok(Err(e)) => {
                tracing::warn!(source = %kind, error = %e, "source search failed");
                outcome.errors.push(format!("{kind} search failed: {e}"));
            }
            Err(_) => {
                tracing::warn!(source = %kind, "source search timed out");
                outcome.errors.push(format!(
                    "{kind} search timed out after {}s",
                    per_source.as_secs_f64()
                ));
            }
        }
    }

    tracing::info!(
        web = outcome.web.len(),
        academic = outcome.academic.len(),
        video = outcome.video.len(),
        errors = outcome.errors.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "research search settled"
    );
    outcome
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::pipeline::sources::SourceSearcher;
    use async_trait::async_trait;
    use seeker_search::SearchError;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Results(usize),
        Fail,
        Hang,
    }

    struct Fake {
        kind: SourceKind,
        behaviour: Behaviour,
        last_k: AtomicUsize,
    }

    impl Fake {
        fn new(kind: SourceKind, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                kind,
                behaviour,
                last_k: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SourceSearcher for Fake {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        async fn search(&self, _query: &str, k: usize) -> Result<Vec<SourceResult>, SearchError> {
            self.last_k.store(k, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Results(n) => Ok((0..n)
                    .map(|i| SourceResult {
                        title: format!("{} {i}", self.kind),
                        url: format!("https://{}.example/{i}", self.kind),
                        snippet: "snippet".into(),
                        content: "content".into(),
                        kind: self.kind,
                        authors: Vec::new(),
                        published: String::new(),
                        metadata: BTreeMap::new(),
                    })
                    .collect()),
                Behaviour::Fail => Err(SearchError::Http("503 Service Unavailable".into())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    fn searchers(web: Arc<Fake>, academic: Arc<Fake>, video: Arc<Fake>) -> Searchers {
        Searchers {
            web,
            academic,
            video,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn academic_failure_leaves_other_kinds() {
        let s = searchers(
            Fake::new(SourceKind::Web, Behaviour::Results(4)),
            Fake::new(SourceKind::Arxiv, Behaviour::Fail),
            Fake::new(SourceKind::Youtube, Behaviour::Results(2)),
        );
        let outcome = research_search(&s, "q", &SourceKind::ALL, &FanoutConfig::default()).await;
        assert_eq!(outcome.web.len(), 4);
        assert!(outcome.academic.is_empty());
        assert_eq!(outcome.video.len(), 2);
        assert_eq!(
            outcome.errors,
            vec!["arxiv search failed: HTTP error: 503 Service Unavailable".to_owned()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_kind_times_out_alone() {
        let s = searchers(
            Fake::new(SourceKind::Web, Behaviour::Results(1)),
            Fake::new(SourceKind::Arxiv, Behaviour::Results(1)),
            Fake::new(SourceKind::Youtube, Behaviour::Hang),
        );
        let outcome = research_search(&s, "q", &SourceKind::ALL, &FanoutConfig::default()).await;
        assert_eq!(outcome.total(), 2);
        assert_eq!(outcome.errors, vec!["youtube search timed out after 9s".to_owned()]);
    }

    #[tokio::test]
    async fn only_required_kinds_are_searched() {
        let video = Fake::new(SourceKind::Youtube, Behaviour::Results(1));
        let web = Fake::new(SourceKind::Web, Behaviour::Results(1));
        let s = searchers(
            web.clone(),
            Fake::new(SourceKind::Arxiv, Behaviour::Results(1)),
            video.clone(),
        );
        let outcome =
            research_search(&s, "q", &[SourceKind::Web, SourceKind::Arxiv], &FanoutConfig::default()).await;
        assert_eq!(outcome.video.len(), 0);
        assert_eq!(video.last_k.load(Ordering::SeqCst), 0);
        assert_eq!(web.last_k.load(Ordering::SeqCst), 10);
        assert_eq!(outcome.academic.len(), 1);
    }

    #[tokio::test]
    async fn simple_path_uses_web_only() {
        let web = Fake::new(SourceKind::Web, Behaviour::Results(5));
        let s = searchers(
            web.clone(),
            Fake::new(SourceKind::Arxiv, Behaviour::Fail),
            Fake::new(SourceKind::Youtube, Behaviour::Fail),
        );
        let outcome = simple_search(&s, "q", &FanoutConfig::default()).await;
        assert_eq!(outcome.web.len(), 5);
        assert!(outcome.errors.is_empty());
        assert_eq!(web.last_k.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn simple_timeout_is_recorded() {
        let s = searchers(
            Fake::new(SourceKind::Web, Behaviour::Hang),
            Fake::new(SourceKind::Arxiv, Behaviour::Fail),
            Fake::new(SourceKind::Youtube, Behaviour::Fail),
        );
        let outcome = simple_search(&s, "q", &FanoutConfig::default()).await;
        assert!(outcome.web.is_empty());
        assert_eq!(outcome.errors, vec!["Web search timed out".to_owned()]);
    }
}
