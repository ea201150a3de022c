//! OpenAI-compatible Chat Completions adapter.
//!
//! Works against `api.openai.com` and any server exposing the same
//! `/v1/chat/completions` streaming contract (`data:` chunks terminated by
//! `data: [DONE]`).
//!
//! ```rust,no_run
//! use seeker::llm::openai::{OpenAiAdapter, OpenAiConfig};
//! use seeker::llm::provider::ProviderAdapter;
//! use seeker::llm::message::{Message, RequestOptions};
//!
//! # async fn example() -> Result<(), seeker::llm::LlmError> {
//! let adapter = OpenAiAdapter::new(OpenAiConfig::new("sk-...", "gpt-4o-mini"));
//! let text = adapter
//!     .complete(&[Message::user("Hello")], &RequestOptions::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use super::error::LlmError;
use super::events::{FinishReason, LlmEvent};
use super::message::{Message, RequestOptions};
use super::provider::{LlmEventStream, ProviderAdapter, map_http_error, map_send_error, sse_event_stream};

/// Configuration for the OpenAI adapter.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication. May be empty for local servers.
    pub api_key: String,
    /// Base URL (defaults to `https://api.openai.com`).
    pub base_url: String,
    /// The model to use.
    pub model: String,
}

impl OpenAiConfig {
    /// Create a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com".into(),
            model: model.into(),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Build the JSON request body for the Chat Completions API.
pub fn build_completions_request(
    model: &str,
    messages: &[Message],
    options: &RequestOptions,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
        "stream": options.stream,
    });
    if let Some(max_tokens) = options.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    if let Some(temperature) = options.temperature {
        body["temperature"] = serde_json::json!(temperature);
    }
    body
}

/// Parse one streamed completion chunk.
///
/// Invalid JSON and empty deltas produce no events.
pub fn parse_completions_chunk(data: &str) -> Vec<LlmEvent> {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(data) else {
        return Vec::new();
    };

    if let Some(message) = json.pointer("/error/message").and_then(|m| m.as_str()) {
        return vec![LlmEvent::StreamError {
            error: message.to_owned(),
        }];
    }

    let Some(choice) = json.pointer("/choices/0") else {
        return Vec::new();
    };

    let mut events = Vec::new();
    if let Some(text) = choice.pointer("/delta/content").and_then(|c| c.as_str())
        && !text.is_empty()
    {
        events.push(LlmEvent::TextDelta {
            text: text.to_owned(),
        });
    }
    if let Some(reason) = choice.get("finish_reason").and_then(|r| r.as_str()) {
        events.push(LlmEvent::StreamEnd {
            finish_reason: FinishReason::from_openai(reason),
        });
    }
    events
}

/// OpenAI Chat Completions adapter.
pub struct OpenAiAdapter {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAdapter")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl OpenAiAdapter {
    /// Create a new adapter with the given configuration.
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// The configured model name.
    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    async fn send(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<LlmEventStream, LlmError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = build_completions_request(&self.config.model, messages, options);

        let mut request = self.client.post(&url).json(&body);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_send_error("OpenAI", e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error("OpenAI", status, &body_text));
        }

        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("openai-req")
            .to_owned();
        let model = self.config.model.clone();
        tracing::debug!(%request_id, %model, "OpenAI stream opened");

        let mut started = false;
        Ok(sse_event_stream(response.bytes_stream(), move |sse| {
            let mut events = Vec::new();
            if !started {
                started = true;
                events.push(LlmEvent::StreamStart {
                    request_id: request_id.clone(),
                    model: model.clone(),
                });
            }
            events.extend(parse_completions_chunk(&sse.data));
            events
        }))
    }
}
