//! Query classification.
//!
//! A short model call labels the query with a complexity tier, an intent,
//! domain tags and the source kinds worth searching. Any timeout, failure
//! or unparseable reply falls back to [`heuristic_classify`], which is pure
//! and never fails.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::sources::SourceKind;
use crate::llm::{Message, ProviderAdapter, RequestOptions};

/// Complexity tier of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// One fast web search.
    #[default]
    Simple,
    /// Parallel multi-source search.
    Research,
    /// Research with a larger evidence budget.
    Deep,
}

impl Complexity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Research => "research",
            Self::Deep => "deep",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "research" => Ok(Self::Research),
            "deep" => Ok(Self::Deep),
            other => Err(format!("unknown complexity: {other}")),
        }
    }
}

/// Output of the classifier. Produced once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub complexity: Complexity,
    /// Free-form intent tag such as `comparison` or `tutorial`.
    pub intent: String,
    pub domains: Vec<String>,
    /// Source kinds to search on the research path. Never empty.
    pub sources: Vec<SourceKind>,
}

impl Classification {
    /// Tier used for routing: the confirmed mode when given, else the detected one.
    pub fn effective_mode(&self, confirmed: Option<Complexity>) -> Complexity {
        confirmed.unwrap_or(self.complexity)
    }

    pub fn requires(&self, kind: SourceKind) -> bool {
        self.sources.contains(&kind)
    }
}

const CLASSIFIER_PROMPT: &str = r#"You classify queries for a research assistant. Reply with one JSON object and nothing else.

Complexity:
- "simple": a direct fact, definition or quick lookup
- "research": a comparison or multi-faceted topic that needs several sources
- "deep": comprehensive analysis or multi-step reasoning

Sources:
- "web": general web search, almost always needed
- "arxiv": academic papers, for scientific or technical questions
- "youtube": videos, for tutorials and walkthroughs

Intent is one of: factual, definition, comparison, tutorial, analysis, opinion, current_events.

Format:
{"complexity": "simple|research|deep", "intent": "<intent>", "domains": ["general", "cs", "medical", "physics", "math", "business"], "sources": ["web", "arxiv", "youtube"]}

User query: "#;

const RESEARCH_MARKERS: &[&str] = &[
    "compare",
    "versus",
    "vs",
    "difference between",
    "pros and cons",
    "analyze",
    "explain in detail",
];

const DEEP_MARKERS: &[&str] = &[
    "comprehensive",
    "in-depth",
    "literature review",
    "state of the art",
    "survey",
];

const ACADEMIC_MARKERS: &[&str] = &[
    "paper",
    "research",
    "study",
    "algorithm",
    "neural",
    "machine learning",
    "deep learning",
    "transformer",
    "arxiv",
    "model",
    "architecture",
    "training",
];

const VIDEO_MARKERS: &[&str] = &["tutorial", "how to", "guide", "demo", "walkthrough", "explain"];

const DOMAIN_MARKERS: &[(&str, &[&str])] = &[
    (
        "cs",
        &["code", "programming", "python", "javascript", "api", "software", "algorithm"],
    ),
    (
        "medical",
        &["health", "medical", "disease", "treatment", "clinical", "patient"],
    ),
    ("physics", &["physics", "quantum", "relativity", "particle"]),
];

/// Queries longer than this many words are at least `research`.
const RESEARCH_WORD_THRESHOLD: usize = 20;

/// Whether `text` (already lowercased) mentions `marker`.
///
/// Markers of three characters or fewer must appear as a whole word so
/// that `vs` does not match inside `canvas` or `api` inside `rapid`.
fn mentions(text: &str, marker: &str) -> bool {
    if marker.len() > 3 {
        return text.contains(marker);
    }
    text.split(|c: char| !c.is_alphanumeric())
        .any(|word| word == marker)
}

fn mentions_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| mentions(text, m))
}

/// Classify with keyword and length rules.
///
/// Deterministic: the same text always yields the same classification.
pub fn heuristic_classify(text: &str) -> Classification {
    let q = text.to_lowercase();
    let q = q.trim();

    let mut complexity = Complexity::Simple;
    if q.split_whitespace().count() > RESEARCH_WORD_THRESHOLD || mentions_any(q, RESEARCH_MARKERS) {
        complexity = Complexity::Research;
    }
    if mentions_any(q, DEEP_MARKERS) {
        complexity = Complexity::Deep;
    }

    let intent = if ["what is", "what are", "define"].iter().any(|p| q.starts_with(p)) {
        "definition"
    } else if mentions_any(q, &["compare", "vs", "versus", "difference"]) {
        "comparison"
    } else if ["how to", "how do", "tutorial", "guide"].iter().any(|p| q.starts_with(p)) {
        "tutorial"
    } else if mentions_any(q, &["analyze", "analysis", "evaluate", "assess"]) {
        "analysis"
    } else {
        "factual"
    };

    let mut sources = vec![SourceKind::Web];
    if mentions_any(q, ACADEMIC_MARKERS) {
        sources.push(SourceKind::Arxiv);
    }
    if mentions_any(q, VIDEO_MARKERS) {
        sources.push(SourceKind::Youtube);
    }

    let domain = DOMAIN_MARKERS
        .iter()
        .find(|(_, markers)| mentions_any(q, markers))
        .map_or("general", |(domain, _)| *domain);

    Classification {
        complexity,
        intent: intent.to_owned(),
        domains: vec![domain.to_owned()],
        sources,
    }
}

#[derive(Deserialize)]
struct RawClassification {
    complexity: Option<String>,
    intent: Option<String>,
    domains: Option<Vec<String>>,
    sources: Option<Vec<String>>,
}

/// Strip a Markdown code fence (optionally tagged `json`) around a reply.
fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    if !text.starts_with("```") {
        return text;
    }
    let inner = text.split("```").nth(1).unwrap_or_default();
    inner.strip_prefix("json").unwrap_or(inner).trim()
}

/// Parse a model classification reply.
///
/// Missing fields take the heuristic defaults (`simple`, `factual`,
/// `general`, `web`). Unknown source kinds are dropped.
///
/// # Errors
///
/// Returns a description when the reply is not a JSON object or names an
/// unknown complexity tier.
pub fn parse_llm_classification(raw: &str) -> Result<Classification, String> {
    let parsed: RawClassification =
        serde_json::from_str(strip_code_fence(raw)).map_err(|e| format!("invalid JSON: {e}"))?;

    let complexity = match parsed.complexity {
        Some(c) => c.parse()?,
        None => Complexity::Simple,
    };
    let mut sources: Vec<SourceKind> = Vec::new();
    for kind in parsed
        .sources
        .unwrap_or_default()
        .iter()
        .filter_map(|s| s.parse::<SourceKind>().ok())
    {
        if !sources.contains(&kind) {
            sources.push(kind);
        }
    }
    if sources.is_empty() {
        sources.push(SourceKind::Web);
    }
    let domains = parsed
        .domains
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| vec!["general".to_owned()]);

    Ok(Classification {
        complexity,
        intent: parsed.intent.unwrap_or_else(|| "factual".to_owned()),
        domains,
        sources,
    })
}

/// Model-backed classifier with a heuristic fallback.
#[derive(Clone)]
pub struct Classifier {
    provider: Option<Arc<dyn ProviderAdapter>>,
    timeout: Duration,
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_owned()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Classifier {
    /// Classifier that asks `provider` first, waiting at most `timeout`.
    pub fn new(provider: Arc<dyn ProviderAdapter>, timeout: Duration) -> Self {
        Self {
            provider: Some(provider),
            timeout,
        }
    }

    /// Classifier that only uses the keyword rules.
    pub fn heuristic() -> Self {
        Self {
            provider: None,
            timeout: Duration::ZERO,
        }
    }

    /// Classify `text`. Never fails and never waits past the timeout.
    pub async fn classify(&self, text: &str) -> Classification {
        let Some(provider) = &self.provider else {
            return heuristic_classify(text);
        };

        let messages = [Message::user(format!("{CLASSIFIER_PROMPT}{text}"))];
        let options = RequestOptions::new().with_temperature(0.0).with_max_tokens(200);

        match tokio::time::timeout(self.timeout, provider.complete(&messages, &options)).await {
            Ok(Ok(reply)) => match parse_llm_classification(&reply) {
                Ok(classification) => {
                    tracing::debug!(
                        complexity = %classification.complexity,
                        intent = %classification.intent,
                        "model classification"
                    );
                    classification
                }
                Err(e) => {
                    tracing::warn!(error = %e, "unparseable classification, using heuristics");
                    heuristic_classify(text)
                }
            },
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "classification call failed, using heuristics");
                heuristic_classify(text)
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "classification timed out, using heuristics"
                );
                heuristic_classify(text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::llm::{LlmError, LlmEvent, LlmEventStream};
    use async_trait::async_trait;

    #[test]
    fn comparison_query_is_research_with_arxiv() {
        let c = heuristic_classify("compare transformer vs LSTM architectures");
        assert_eq!(c.complexity, Complexity::Research);
        assert_eq!(c.intent, "comparison");
        assert!(c.requires(SourceKind::Arxiv));
        assert!(c.requires(SourceKind::Web));
    }

    #[test]
    fn definition_is_simple() {
        let c = heuristic_classify("What is a monad?");
        assert_eq!(c.complexity, Complexity::Simple);
        assert_eq!(c.intent, "definition");
        assert_eq!(c.sources, vec![SourceKind::Web]);
        assert_eq!(c.domains, vec!["general".to_owned()]);
    }

    #[test]
    fn deep_markers_win_over_research() {
        let c = heuristic_classify("comprehensive survey comparing vector databases");
        assert_eq!(c.complexity, Complexity::Deep);
    }

    #[test]
    fn long_queries_are_research() {
        let text = "word ".repeat(21);
        assert_eq!(heuristic_classify(&text).complexity, Complexity::Research);
        let text = "word ".repeat(20);
        assert_eq!(heuristic_classify(&text).complexity, Complexity::Simple);
    }

    #[test]
    fn tutorial_asks_for_video() {
        let c = heuristic_classify("how to write a python decorator");
        assert_eq!(c.intent, "tutorial");
        assert!(c.requires(SourceKind::Youtube));
        assert_eq!(c.domains, vec!["cs".to_owned()]);
    }

    #[test]
    fn short_markers_match_whole_words_only() {
        let c = heuristic_classify("canvas rapid prototyping");
        assert_eq!(c.complexity, Complexity::Simple);
        assert_eq!(c.domains, vec!["general".to_owned()]);
    }

    #[test]
    fn domain_priority_and_analysis_intent() {
        let c = heuristic_classify("evaluate clinical outcomes of quantum sensors");
        assert_eq!(c.intent, "analysis");
        assert_eq!(c.domains, vec!["medical".to_owned()]);
    }

    #[test]
    fn heuristic_is_deterministic() {
        let q = "pros and cons of async rust";
        assert_eq!(heuristic_classify(q), heuristic_classify(q));
    }

    #[test]
    fn parses_fenced_reply() {
        let reply = "```json\n{\"complexity\":\"deep\",\"intent\":\"analysis\",\"domains\":[\"cs\"],\"sources\":[\"web\",\"arxiv\",\"podcasts\"]}\n```";
        let c = parse_llm_classification(reply).unwrap();
        assert_eq!(c.complexity, Complexity::Deep);
        assert_eq!(c.sources, vec![SourceKind::Web, SourceKind::Arxiv]);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let c = parse_llm_classification("{}").unwrap();
        assert_eq!(c.complexity, Complexity::Simple);
        assert_eq!(c.intent, "factual");
        assert_eq!(c.domains, vec!["general".to_owned()]);
        assert_eq!(c.sources, vec![SourceKind::Web]);
    }

    #[test]
    fn rejects_prose_and_unknown_tiers() {
        assert!(parse_llm_classification("I think this is simple").is_err());
        assert!(parse_llm_classification(r#"{"complexity":"huge"}"#).is_err());
    }

    #[test]
    fn effective_mode_prefers_confirmed() {
        let c = heuristic_classify("what is rust");
        assert_eq!(c.effective_mode(None), Complexity::Simple);
        assert_eq!(c.effective_mode(Some(Complexity::Deep)), Complexity::Deep);
    }

    struct Scripted(Result<&'static str, fn() -> LlmError>, Duration);

    #[async_trait]
    impl ProviderAdapter for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(
            &self,
            _messages: &[Message],
            _options: &RequestOptions,
        ) -> Result<LlmEventStream, LlmError> {
            tokio::time::sleep(self.1).await;
            match &self.0 {
                Ok(text) => Ok(Box::pin(futures_util::stream::iter(vec![
                    LlmEvent::TextDelta {
                        text: (*text).to_owned(),
                    },
                ]))),
                Err(make) => Err(make()),
            }
        }
    }

    #[tokio::test]
    async fn uses_model_reply() {
        let classifier = Classifier::new(
            Arc::new(Scripted(
                Ok(r#"{"complexity":"research","intent":"opinion","domains":["business"],"sources":["web","youtube"]}"#),
                Duration::ZERO,
            )),
            Duration::from_secs(1),
        );
        let c = classifier.classify("is remote work good").await;
        assert_eq!(c.complexity, Complexity::Research);
        assert_eq!(c.intent, "opinion");
        assert!(c.requires(SourceKind::Youtube));
    }

    #[tokio::test]
    async fn falls_back_on_failure() {
        let classifier = Classifier::new(
            Arc::new(Scripted(Err(|| LlmError::RequestError("down".into())), Duration::ZERO)),
            Duration::from_secs(1),
        );
        let c = classifier.classify("compare tokio vs async-std").await;
        assert_eq!(c, heuristic_classify("compare tokio vs async-std"));
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_on_timeout() {
        let classifier = Classifier::new(
            Arc::new(Scripted(Ok(r#"{"complexity":"deep"}"#), Duration::from_secs(30))),
            Duration::from_secs(5),
        );
        let c = classifier.classify("what is rust").await;
        assert_eq!(c.complexity, Complexity::Simple);
    }
}
