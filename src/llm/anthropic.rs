//! Anthropic Messages API adapter.
//!
//! Streams typed SSE events (`message_start`, `content_block_delta`,
//! `message_delta`, `error`) and normalizes them to [`LlmEvent`]s. System
//! messages are lifted into the top-level `system` field.

use async_trait::async_trait;

use super::error::LlmError;
use super::events::{FinishReason, LlmEvent};
use super::message::{Message, RequestOptions, Role};
use super::provider::{LlmEventStream, ProviderAdapter, map_http_error, map_send_error, sse_event_stream};

/// Configuration for the Anthropic adapter.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// Anthropic API key.
    pub api_key: String,
    /// Base URL for the API (defaults to `https://api.anthropic.com`).
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// API version header value.
    pub api_version: String,
}

impl AnthropicConfig {
    /// Create a new Anthropic config.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".to_string(),
            model: model.into(),
            api_version: "2023-06-01".to_string(),
        }
    }

    /// Set the base URL (useful for testing with mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Build a Messages API request body.
pub fn build_messages_request(
    model: &str,
    messages: &[Message],
    options: &RequestOptions,
) -> serde_json::Value {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let turns: Vec<serde_json::Value> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| serde_json::json!({ "role": m.role, "content": m.content }))
        .collect();

    let mut body = serde_json::json!({
        "model": model,
        "max_tokens": options.max_tokens.unwrap_or(4096),
        "messages": turns,
    });
    if !system.is_empty() {
        body["system"] = serde_json::Value::String(system.join("\n\n"));
    }
    if options.stream {
        body["stream"] = serde_json::Value::Bool(true);
    }
    if let Some(temp) = options.temperature {
        body["temperature"] = serde_json::json!(temp);
    }
    body
}

/// Parse one typed Anthropic stream event.
pub fn parse_anthropic_event(event_type: &str, data: &str) -> Vec<LlmEvent> {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(data) else {
        return Vec::new();
    };

    match event_type {
        "message_start" => {
            let model = json
                .pointer("/message/model")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            let id = json
                .pointer("/message/id")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            vec![LlmEvent::StreamStart {
                request_id: id.to_owned(),
                model: model.to_owned(),
            }]
        }
        "content_block_delta" => json
            .pointer("/delta/text")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .map(|text| {
                vec![LlmEvent::TextDelta {
                    text: text.to_owned(),
                }]
            })
            .unwrap_or_default(),
        "message_delta" => json
            .pointer("/delta/stop_reason")
            .and_then(|v| v.as_str())
            .map(|reason| {
                vec![LlmEvent::StreamEnd {
                    finish_reason: FinishReason::from_anthropic(reason),
                }]
            })
            .unwrap_or_default(),
        "error" => {
            let message = json
                .pointer("/error/message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            vec![LlmEvent::StreamError {
                error: message.to_owned(),
            }]
        }
        _ => Vec::new(),
    }
}

/// Anthropic Messages API adapter.
pub struct AnthropicAdapter {
    config: AnthropicConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicAdapter")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl AnthropicAdapter {
    /// Create a new adapter.
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn send(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<LlmEventStream, LlmError> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let body = build_messages_request(&self.config.model, messages, options);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error("Anthropic", e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error("Anthropic", status, &body_text));
        }

        Ok(sse_event_stream(response.bytes_stream(), |sse| {
            parse_anthropic_event(sse.event_type.as_deref().unwrap_or(""), &sse.data)
        }))
    }
}
