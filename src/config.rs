//! Configuration for the seeker service.
//!
//! One TOML document with a section per component. Every section has
//! defaults, so an empty or missing file is a valid configuration. API keys
//! are never stored here, only the names of the environment variables that
//! hold them.

use std::path::{Path, PathBuf};

use seeker_search::{CrawlConfig, SearchConfig};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "SEEKER_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekerConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub classifier: ClassifierConfig,
    pub fanout: FanoutConfig,
    pub search: SearchConfig,
    pub crawl: CrawlConfig,
    pub retrieval: RetrievalConfig,
    pub cache: CacheConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8787,
        }
    }
}

/// Which provider API an endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI Chat Completions, or any compatible server.
    #[default]
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

impl ProviderKind {
    /// Base URL used when none is configured.
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com",
            Self::Anthropic => "https://api.anthropic.com",
        }
    }
}

/// One provider endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    pub model: String,
    /// `None` means the provider's public endpoint.
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            model: "gpt-4o-mini".into(),
            base_url: None,
            api_key_env: "OPENAI_API_KEY".into(),
        }
    }
}

impl ProviderConfig {
    /// The API key from the environment, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_owned())
            .filter(|k| !k.is_empty())
    }

    /// The configured base URL, or the provider default.
    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_owned())
    }

    fn validate(&self, section: &str) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(PipelineError::Config(format!("{section}.model must not be empty")));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(PipelineError::Config(format!(
                "{section}.api_key_env must not be empty"
            )));
        }
        Ok(())
    }
}

/// Language-model settings for synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub model: String,
    /// `None` means the provider's public endpoint.
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f64,
    pub max_tokens: usize,
    /// Used when the primary fails with a retryable error.
    pub fallback: Option<ProviderConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let primary = ProviderConfig::default();
        Self {
            provider: primary.provider,
            model: primary.model,
            base_url: primary.base_url,
            api_key_env: primary.api_key_env,
            temperature: 0.7,
            max_tokens: 2000,
            fallback: None,
        }
    }
}

impl LlmConfig {
    /// The primary endpoint.
    pub fn primary(&self) -> ProviderConfig {
        ProviderConfig {
            provider: self.provider,
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            api_key_env: self.api_key_env.clone(),
        }
    }
}

/// Query classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// When false, only the keyword heuristic runs.
    pub enabled: bool,
    pub timeout_ms: u64,
    /// Model override for classification calls.
    pub model: Option<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 5000,
            model: None,
        }
    }
}

/// Source fan-out budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    pub simple_timeout_secs: u64,
    pub research_timeout_secs: u64,
    /// Share of the research budget each source gets.
    pub research_source_fraction: f64,
    pub simple_max_results: usize,
    /// Web results crawled for full text after searching. 0 disables.
    pub crawl_top_results: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            simple_timeout_secs: 5,
            research_timeout_secs: 15,
            research_source_fraction: 0.6,
            simple_max_results: 5,
            crawl_top_results: 0,
        }
    }
}

impl FanoutConfig {
    /// Per-source timeout on the research path.
    pub fn research_source_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(
            self.research_timeout_secs as f64 * self.research_source_fraction,
        )
    }
}

/// External vector index endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// `None` disables the academic index.
    pub academic_index_url: Option<String>,
    /// `None` disables the conversation index.
    pub conversation_index_url: Option<String>,
    pub top_k: usize,
    pub timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            academic_index_url: None,
            conversation_index_url: None,
            top_k: 3,
            timeout_ms: 5000,
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 200,
            ttl_secs: 3600,
        }
    }
}

impl SeekerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Load from `SEEKER_CONFIG` or the default path. A missing file
    /// yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_config_path);
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        tracing::info!(path = %path.display(), "loading config");
        Self::from_file(&path)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/seeker/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("seeker")
            .join("config.toml")
    }

    /// Check every section.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<()> {
        self.llm.primary().validate("llm")?;
        if let Some(fallback) = &self.llm.fallback {
            fallback.validate("llm.fallback")?;
        }
        if self.llm.max_tokens == 0 {
            return Err(PipelineError::Config("llm.max_tokens must be greater than 0".into()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(PipelineError::Config(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.classifier.timeout_ms == 0 {
            return Err(PipelineError::Config(
                "classifier.timeout_ms must be greater than 0".into(),
            ));
        }
        let fraction = self.fanout.research_source_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(PipelineError::Config(
                "fanout.research_source_fraction must be in (0, 1]".into(),
            ));
        }
        if self.fanout.simple_timeout_secs == 0 || self.fanout.research_timeout_secs == 0 {
            return Err(PipelineError::Config("fanout timeouts must be greater than 0".into()));
        }
        if self.fanout.simple_max_results == 0 {
            return Err(PipelineError::Config(
                "fanout.simple_max_results must be greater than 0".into(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(PipelineError::Config("retrieval.top_k must be greater than 0".into()));
        }
        if self.cache.max_entries == 0 {
            return Err(PipelineError::Config("cache.max_entries must be greater than 0".into()));
        }
        self.search.validate()?;
        self.crawl.validate()?;
        Ok(())
    }
}
