//! Fallback provider adapter.
//!
//! Wraps a primary provider with a secondary one. When the primary returns
//! a retryable error before streaming starts, the request is retried
//! against the fallback.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use super::error::LlmError;
use super::message::{Message, RequestOptions};
use super::provider::{LlmEventStream, ProviderAdapter};

/// A provider that falls back to a second provider on retryable errors.
///
/// Non-retryable errors (auth, config) are propagated immediately.
pub struct FallbackProvider {
    primary: Arc<dyn ProviderAdapter>,
    fallback: Arc<dyn ProviderAdapter>,
    fallback_count: AtomicU32,
}

impl FallbackProvider {
    /// Create a new fallback-enabled provider.
    pub fn new(primary: Arc<dyn ProviderAdapter>, fallback: Arc<dyn ProviderAdapter>) -> Self {
        Self {
            primary,
            fallback,
            fallback_count: AtomicU32::new(0),
        }
    }

    /// Number of times the fallback provider has been used.
    pub fn fallback_count(&self) -> u32 {
        self.fallback_count.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for FallbackProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackProvider")
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.name())
            .field("fallback_count", &self.fallback_count())
            .finish()
    }
}

#[async_trait]
impl ProviderAdapter for FallbackProvider {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn send(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<LlmEventStream, LlmError> {
        match self.primary.send(messages, options).await {
            Ok(stream) => Ok(stream),
            Err(e) if e.is_retryable() => {
                self.fallback_count.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    error = %e,
                    "primary provider failed with retryable error, using fallback"
                );
                self.fallback.send(messages, options).await
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::llm::events::LlmEvent;

    struct Replying(&'static str);

    #[async_trait]
    impl ProviderAdapter for Replying {
        fn name(&self) -> &str {
            self.0
        }

        async fn send(
            &self,
            _messages: &[Message],
            _options: &RequestOptions,
        ) -> Result<LlmEventStream, LlmError> {
            Ok(Box::pin(futures_util::stream::iter(vec![LlmEvent::TextDelta {
                text: self.0.to_owned(),
            }])))
        }
    }

    struct Failing(fn() -> LlmError);

    #[async_trait]
    impl ProviderAdapter for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn send(
            &self,
            _messages: &[Message],
            _options: &RequestOptions,
        ) -> Result<LlmEventStream, LlmError> {
            Err((self.0)())
        }
    }

    #[tokio::test]
    async fn primary_success_skips_fallback() {
        let provider = FallbackProvider::new(Arc::new(Replying("primary")), Arc::new(Replying("backup")));
        let text = provider
            .complete(&[Message::user("q")], &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(text, "primary");
        assert_eq!(provider.fallback_count(), 0);
    }

    #[tokio::test]
    async fn retryable_error_uses_fallback() {
        let provider = FallbackProvider::new(
            Arc::new(Failing(|| LlmError::RequestError("connection refused".into()))),
            Arc::new(Replying("backup")),
        );
        let text = provider
            .complete(&[Message::user("q")], &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(text, "backup");
        assert_eq!(provider.fallback_count(), 1);
    }

    #[tokio::test]
    async fn auth_error_is_not_retried() {
        let provider = FallbackProvider::new(
            Arc::new(Failing(|| LlmError::AuthError("bad key".into()))),
            Arc::new(Replying("backup")),
        );
        let err = provider
            .complete(&[Message::user("q")], &RequestOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "AUTH_FAILED");
        assert_eq!(provider.fallback_count(), 0);
    }
}
