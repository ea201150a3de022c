//! Language-model provider layer.
//!
//! Provider adapters normalize OpenAI-compatible and Anthropic streaming
//! APIs into one [`LlmEvent`] stream. The pipeline only sees the
//! [`ProviderAdapter`] trait.

pub mod anthropic;
pub mod error;
pub mod events;
pub mod fallback;
pub mod message;
pub mod openai;
pub mod provider;
pub mod sse;

use std::sync::Arc;

pub use error::LlmError;
pub use events::{FinishReason, LlmEvent};
pub use message::{Message, RequestOptions, Role};
pub use provider::{LlmEventStream, ProviderAdapter};

use crate::config::{LlmConfig, ProviderConfig, ProviderKind};
use anthropic::{AnthropicAdapter, AnthropicConfig};
use fallback::FallbackProvider;
use openai::{OpenAiAdapter, OpenAiConfig};

/// Build one adapter for an endpoint.
///
/// OpenAI-compatible endpoints may run without a key (local servers);
/// Anthropic requires one.
///
/// # Errors
///
/// Returns [`LlmError::ConfigError`] when a required API key is missing.
pub fn build_adapter(config: &ProviderConfig) -> Result<Arc<dyn ProviderAdapter>, LlmError> {
    let key = config.api_key();
    match config.provider {
        ProviderKind::OpenAi => {
            if key.is_none() && config.base_url.is_none() {
                tracing::warn!(env = %config.api_key_env, "no API key set for OpenAI endpoint");
            }
            let adapter = OpenAiAdapter::new(
                OpenAiConfig::new(key.unwrap_or_default(), &config.model)
                    .with_base_url(config.base_url()),
            );
            Ok(Arc::new(adapter))
        }
        ProviderKind::Anthropic => {
            let key = key.ok_or_else(|| {
                LlmError::ConfigError(format!(
                    "Anthropic API key missing: set {}",
                    config.api_key_env
                ))
            })?;
            let adapter = AnthropicAdapter::new(
                AnthropicConfig::new(key, &config.model).with_base_url(config.base_url()),
            );
            Ok(Arc::new(adapter))
        }
    }
}

/// Build the synthesis provider, wrapped in a fallback when one is configured.
///
/// # Errors
///
/// Returns [`LlmError::ConfigError`] when either endpoint is misconfigured.
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn ProviderAdapter>, LlmError> {
    let primary = build_adapter(&config.primary())?;
    match &config.fallback {
        Some(fallback) => Ok(Arc::new(FallbackProvider::new(
            primary,
            build_adapter(fallback)?,
        ))),
        None => Ok(primary),
    }
}
