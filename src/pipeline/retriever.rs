//! Best-effort context retrieval from external vector indexes.
//!
//! Two stores are consulted: an academic corpus for every query and a
//! per-user conversation index when a user id is known. An index that is
//! not configured, unreachable or slow contributes nothing. Retrieval never
//! fails a run.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use seeker_search::SearchError;
use serde::{Deserialize, Serialize};

use crate::config::RetrievalConfig;

/// One ranked document returned by an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub score: f64,
}

/// Semantic search over an external index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Up to `k` documents ranked by similarity to `query`.
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&serde_json::Value>,
    ) -> Result<Vec<IndexDocument>, SearchError>;
}

/// Index reached over HTTP.
///
/// Posts `{"query", "k", "filter"}` and accepts either a bare array of
/// documents or an object with a `results` array.
#[derive(Debug, Clone)]
pub struct HttpVectorIndex {
    url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IndexReply {
    Bare(Vec<IndexDocument>),
    Wrapped { results: Vec<IndexDocument> },
}

impl HttpVectorIndex {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&serde_json::Value>,
    ) -> Result<Vec<IndexDocument>, SearchError> {
        let body = serde_json::json!({ "query": query, "k": k, "filter": filter });
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::Http(format!("index request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Http(format!("index returned HTTP {status}")));
        }

        let reply: IndexReply = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("index reply: {e}")))?;
        let mut docs = match reply {
            IndexReply::Bare(docs) | IndexReply::Wrapped { results: docs } => docs,
        };
        docs.truncate(k);
        Ok(docs)
    }
}

/// Which store a context item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextStore {
    AcademicRag,
    ConversationRag,
}

impl ContextStore {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AcademicRag => "academic_rag",
            Self::ConversationRag => "conversation_rag",
        }
    }
}

/// A retrieved document tagged with its store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub content: String,
    pub source: ContextStore,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Queries the configured indexes under independent timeouts.
#[derive(Clone)]
pub struct Retriever {
    academic: Option<Arc<dyn VectorIndex>>,
    conversation: Option<Arc<dyn VectorIndex>>,
    top_k: usize,
    timeout: Duration,
}

impl fmt::Debug for Retriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retriever")
            .field("academic", &self.academic.is_some())
            .field("conversation", &self.conversation.is_some())
            .field("top_k", &self.top_k)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Retriever {
    pub fn new(top_k: usize, timeout: Duration) -> Self {
        Self {
            academic: None,
            conversation: None,
            top_k,
            timeout,
        }
    }

    /// Retriever over the HTTP indexes named in `config`.
    pub fn from_config(config: &RetrievalConfig) -> Self {
        let mut retriever = Self::new(config.top_k, Duration::from_millis(config.timeout_ms));
        if let Some(url) = &config.academic_index_url {
            retriever.academic = Some(Arc::new(HttpVectorIndex::new(url)));
        }
        if let Some(url) = &config.conversation_index_url {
            retriever.conversation = Some(Arc::new(HttpVectorIndex::new(url)));
        }
        retriever
    }

    pub fn with_academic(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.academic = Some(index);
        self
    }

    pub fn with_conversation(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.conversation = Some(index);
        self
    }

    /// Academic context, then the user's conversation context.
    pub async fn retrieve(&self, query: &str, user_id: Option<&str>) -> Vec<RetrievedContext> {
        let filter = user_id.map(|id| serde_json::json!({ "user_id": id }));
        let academic = self.lookup(ContextStore::AcademicRag, self.academic.as_ref(), query, None);
        let conversation = async {
            match filter.as_ref() {
                Some(filter) => {
                    self.lookup(
                        ContextStore::ConversationRag,
                        self.conversation.as_ref(),
                        query,
                        Some(filter),
                    )
                    .await
                }
                None => Vec::new(),
            }
        };
        let (mut context, conversation) = tokio::join!(academic, conversation);
        context.extend(conversation);
        context
    }

    async fn lookup(
        &self,
        store: ContextStore,
        index: Option<&Arc<dyn VectorIndex>>,
        query: &str,
        filter: Option<&serde_json::Value>,
    ) -> Vec<RetrievedContext> {
        let Some(index) = index else {
            tracing::debug!(store = store.as_str(), "index not configured");
            return Vec::new();
        };

        match tokio::time::timeout(self.timeout, index.search(query, self.top_k, filter)).await {
            Ok(Ok(docs)) => {
                tracing::info!(store = store.as_str(), count = docs.len(), "context retrieved");
                docs.into_iter()
                    .map(|doc| RetrievedContext {
                        content: doc.content,
                        source: store,
                        metadata: doc.metadata,
                    })
                    .collect()
            }
            Ok(Err(e)) => {
                tracing::warn!(store = store.as_str(), error = %e, "context retrieval failed");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    store = store.as_str(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "context retrieval timed out"
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn academic_only_without_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/academic"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"content": "attention is all you need", "metadata": {"id": 1}, "score": 0.9}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/conversations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let retriever = Retriever::from_config(&RetrievalConfig {
            academic_index_url: Some(format!("{}/academic", server.uri())),
            conversation_index_url: Some(format!("{}/conversations", server.uri())),
            ..Default::default()
        });
        let context = retriever.retrieve("attention", None).await;
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].source, ContextStore::AcademicRag);
    }

    #[tokio::test]
    async fn conversation_filtered_by_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations"))
            .and(body_partial_json(serde_json::json!({"filter": {"user_id": "u7"}, "k": 3})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"content": "we discussed tokio last week"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let retriever = Retriever::from_config(&RetrievalConfig {
            conversation_index_url: Some(format!("{}/conversations", server.uri())),
            ..Default::default()
        });
        let context = retriever.retrieve("tokio", Some("u7")).await;
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].source, ContextStore::ConversationRag);
        assert_eq!(context[0].source.as_str(), "conversation_rag");
    }

    #[tokio::test]
    async fn failures_and_timeouts_are_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/academic"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/conversations"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([]))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let retriever = Retriever::new(3, Duration::from_millis(200))
            .with_academic(Arc::new(HttpVectorIndex::new(format!("{}/academic", server.uri()))))
            .with_conversation(Arc::new(HttpVectorIndex::new(format!(
                "{}/conversations",
                server.uri()
            ))));
        assert!(retriever.retrieve("q", Some("u1")).await.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_is_empty() {
        let retriever = Retriever::from_config(&RetrievalConfig::default());
        assert!(retriever.retrieve("q", Some("u1")).await.is_empty());
    }
}
