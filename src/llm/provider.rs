//! Provider adapter trait for language-model backends.
//!
//! Adapters normalize provider-specific streaming APIs into the shared
//! [`LlmEvent`] stream.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use super::error::LlmError;
use super::events::LlmEvent;
use super::message::{Message, RequestOptions};
use super::sse::{SseEvent, SseLineParser};

/// A boxed stream of normalized events.
pub type LlmEventStream = Pin<Box<dyn Stream<Item = LlmEvent> + Send>>;

/// Trait for language-model provider adapters.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Returns the provider name (e.g. `"openai"`, `"anthropic"`).
    fn name(&self) -> &str;

    /// Start a streaming generation.
    ///
    /// Errors returned here happen before any output; failures after the
    /// stream has started arrive as [`LlmEvent::StreamError`].
    async fn send(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<LlmEventStream, LlmError>;

    /// Generate and collect the whole response text.
    async fn complete(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<String, LlmError> {
        let mut stream = self.send(messages, options).await?;
        let mut text = String::new();
        while let Some(event) = stream.next().await {
            match event {
                LlmEvent::TextDelta { text: delta } => text.push_str(&delta),
                LlmEvent::StreamError { error } => return Err(LlmError::StreamError(error)),
                LlmEvent::StreamStart { .. } | LlmEvent::StreamEnd { .. } => {}
            }
        }
        Ok(text)
    }
}

struct SseStreamState<F> {
    bytes: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    parser: SseLineParser,
    parse: F,
    queue: VecDeque<LlmEvent>,
    finished: bool,
}

/// Turn an SSE byte stream into [`LlmEvent`]s using a per-event parser.
///
/// The `[DONE]` sentinel is skipped. A transport error is surfaced as a
/// single [`LlmEvent::StreamError`] and ends the stream.
pub(crate) fn sse_event_stream<F>(
    bytes: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    parse: F,
) -> LlmEventStream
where
    F: FnMut(&SseEvent) -> Vec<LlmEvent> + Send + 'static,
{
    let state = SseStreamState {
        bytes: Box::pin(bytes),
        parser: SseLineParser::new(),
        parse,
        queue: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.queue.pop_front() {
                return Some((event, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for sse in state.parser.push(&chunk) {
                        if !sse.is_done() {
                            let events = (state.parse)(&sse);
                            state.queue.extend(events);
                        }
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    state.queue.push_back(LlmEvent::StreamError {
                        error: format!("stream read error: {e}"),
                    });
                }
                None => {
                    state.finished = true;
                    if let Some(sse) = state.parser.flush()
                        && !sse.is_done()
                    {
                        let events = (state.parse)(&sse);
                        state.queue.extend(events);
                    }
                }
            }
        }
    }))
}

/// Pull a readable message out of a JSON error body, falling back to the
/// raw text (capped at 500 chars).
pub(crate) fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                "no response body".to_string()
            } else {
                body.chars().take(500).collect()
            }
        })
}

/// Map an HTTP failure status to the error taxonomy.
pub(crate) fn map_http_error(provider: &str, status: reqwest::StatusCode, body: &str) -> LlmError {
    let detail = extract_error_message(body);
    match status.as_u16() {
        401 | 403 => LlmError::AuthError(format!("{provider} authentication failed: {detail}")),
        429 => LlmError::RequestError(format!("{provider} rate limited: {detail}")),
        code => LlmError::ProviderError(format!("{provider} HTTP {code}: {detail}")),
    }
}

/// Map a transport-level `reqwest` failure.
pub(crate) fn map_send_error(provider: &str, err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::TimeoutError(format!("{provider} request timed out: {err}"))
    } else {
        LlmError::RequestError(format!("{provider} request failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::llm::events::FinishReason;

    struct Scripted(Vec<LlmEvent>);

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
            Ok(Box::pin(futures_util::stream::iter(self.0.clone())))
        }
    }

    #[tokio::test]
    async fn complete_concatenates_deltas() {
        let provider = Scripted(vec![
            LlmEvent::StreamStart {
                request_id: "r".into(),
                model: "m".into(),
            },
            LlmEvent::TextDelta { text: "Hel".into() },
            LlmEvent::TextDelta { text: "lo".into() },
            LlmEvent::StreamEnd {
                finish_reason: FinishReason::Stop,
            },
        ]);
        let text = provider
            .complete(&[Message::user("hi")], &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn complete_surfaces_stream_error() {
        let provider = Scripted(vec![
            LlmEvent::TextDelta { text: "partial".into() },
            LlmEvent::StreamError {
                error: "overloaded".into(),
            },
        ]);
        let err = provider
            .complete(&[Message::user("hi")], &RequestOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "STREAM_FAILED");
    }

    #[tokio::test]
    async fn sse_stream_preserves_order_within_chunk() {
        let body = Bytes::from_static(b"data: a\n\ndata: b\n\ndata: [DONE]\n\n");
        let bytes = futures_util::stream::iter(vec![Ok::<_, reqwest::Error>(body)]);
        let stream = sse_event_stream(bytes, |sse| {
            vec![
                LlmEvent::TextDelta {
                    text: sse.data.clone(),
                },
                LlmEvent::TextDelta {
                    text: sse.data.to_uppercase(),
                },
            ]
        });
        let texts: Vec<String> = stream
            .filter_map(|e| async move {
                match e {
                    LlmEvent::TextDelta { text } => Some(text),
                    _ => None,
                }
            })
            .collect()
            .await;
        assert_eq!(texts, vec!["a", "A", "b", "B"]);
    }

    #[test]
    fn http_errors_map_to_codes() {
        let body = r#"{"error":{"message":"bad key"}}"#;
        let err = map_http_error("openai", reqwest::StatusCode::UNAUTHORIZED, body);
        assert_eq!(err.code(), "AUTH_FAILED");
        assert!(err.message().contains("bad key"));
        assert_eq!(
            map_http_error("openai", reqwest::StatusCode::FORBIDDEN, "").code(),
            "AUTH_FAILED"
        );
        assert_eq!(
            map_http_error("openai", reqwest::StatusCode::TOO_MANY_REQUESTS, "").code(),
            "REQUEST_FAILED"
        );
        assert_eq!(
            map_http_error("openai", reqwest::StatusCode::BAD_GATEWAY, "").code(),
            "PROVIDER_ERROR"
        );
    }
}
