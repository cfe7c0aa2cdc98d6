//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Provider names the backend registry understands.
pub const KNOWN_PROVIDERS: [&str; 2] = ["openai", "ollama"];

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Provider used by the CLI when none is given
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model used by the CLI when none is given
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// System prompt used when a request names no prompt, or an unknown one
    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,

    /// Provider tables, keyed by provider name (`openai`, `ollama`)
    #[serde(default = "default_providers")]
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Named system prompts, optionally bound to a tool
    #[serde(default)]
    pub prompts: Vec<PromptConfig>,

    #[serde(default)]
    pub rag: RagConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub chat_memory: ChatMemoryConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_provider() -> String {
    "ollama".into()
}
fn default_model() -> String {
    "qwen3:14b".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_system_prompt() -> String {
    "You are a helpful, honest assistant. Answer clearly and concisely, \
     and say so when you do not know something."
        .into()
}
fn default_true() -> bool {
    true
}

fn default_providers() -> BTreeMap<String, ProviderConfig> {
    let mut providers = BTreeMap::new();
    providers.insert(
        "openai".into(),
        ProviderConfig {
            api_key: None,
            api_url: None,
            models: vec!["gpt-4o".into(), "grok-3".into()],
        },
    );
    providers.insert(
        "ollama".into(),
        ProviderConfig {
            api_key: None,
            api_url: None,
            models: vec!["qwen3:14b".into()],
        },
    );
    providers
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("providers", &self.providers)
            .field("prompts", &self.prompts.len())
            .field("rag", &self.rag)
            .field("history", &self.history)
            .field("chat_memory", &self.chat_memory)
            .field("gateway", &self.gateway)
            .field("logging", &self.logging)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("models", &self.models)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Overrides the provider's default base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Models registered as backends for this provider
    #[serde(default)]
    pub models: Vec<String>,
}

/// A named system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub id: String,

    #[serde(default)]
    pub name: String,

    pub content: String,

    /// Tool id bound to this prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

/// Retrieval-augmented generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Passage bodies longer than this are cut before prompting
    #[serde(default = "default_max_passage_chars")]
    pub max_passage_chars: usize,

    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,

    /// Ingestion chunk size
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,

    /// Provider whose `/embeddings` endpoint embeds documents and queries
    #[serde(default = "default_embedding_provider")]
    pub embedding_provider: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_top_k() -> usize {
    3
}
fn default_similarity_threshold() -> f32 {
    0.3
}
fn default_max_passage_chars() -> usize {
    1000
}
fn default_retrieval_timeout_secs() -> u64 {
    10
}
fn default_chunk_chars() -> usize {
    800
}
fn default_embedding_provider() -> String {
    "openai".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            max_passage_chars: default_max_passage_chars(),
            timeout_secs: default_retrieval_timeout_secs(),
            chunk_chars: default_chunk_chars(),
            embedding_provider: default_embedding_provider(),
            embedding_model: default_embedding_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// `sqlite` or `memory`
    #[serde(default = "default_history_backend")]
    pub backend: String,

    /// SQLite file; defaults to `~/.parley/history.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_history_backend() -> String {
    "sqlite".into()
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: default_history_backend(),
            path: None,
        }
    }
}

impl HistoryConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| AppConfig::config_dir().join("history.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMemoryConfig {
    /// Prior messages replayed into each request
    #[serde(default = "default_memory_window")]
    pub window: usize,
}

fn default_memory_window() -> usize {
    20
}

impl Default for ChatMemoryConfig {
    fn default() -> Self {
        Self {
            window: default_memory_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Request body limit; uploads count against it
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    42617
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_body_bytes() -> usize {
    20 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml).
    ///
    /// Environment overrides:
    /// - `PARLEY_OPENAI_API_KEY`, then `OPENAI_API_KEY`
    /// - `PARLEY_OLLAMA_URL`
    /// - `PARLEY_HISTORY_PATH`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        let openai_key = std::env::var("PARLEY_OPENAI_API_KEY")
            .ok()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        if let Some(key) = openai_key {
            let entry = self.providers.entry("openai".into()).or_default();
            if entry.api_key.is_none() {
                entry.api_key = Some(key);
            }
        }

        if let Ok(url) = std::env::var("PARLEY_OLLAMA_URL") {
            self.providers.entry("ollama".into()).or_default().api_url = Some(url);
        }

        if let Ok(path) = std::env::var("PARLEY_HISTORY_PATH") {
            self.history.path = Some(path);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        for name in self.providers.keys() {
            if !KNOWN_PROVIDERS.contains(&name.to_ascii_lowercase().as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "unknown provider '{name}' (expected one of: {})",
                    KNOWN_PROVIDERS.join(", ")
                )));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for prompt in &self.prompts {
            if prompt.id.trim().is_empty() {
                return Err(ConfigError::ValidationError("prompt id must not be blank".into()));
            }
            if !seen.insert(prompt.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate prompt id '{}'",
                    prompt.id
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.rag.similarity_threshold) {
            return Err(ConfigError::ValidationError(
                "rag.similarity_threshold must be between 0.0 and 1.0".into(),
            ));
        }
        if self.rag.top_k == 0 || self.rag.max_passage_chars == 0 || self.rag.chunk_chars == 0 {
            return Err(ConfigError::ValidationError(
                "rag.top_k, rag.max_passage_chars and rag.chunk_chars must be > 0".into(),
            ));
        }

        match self.history.backend.as_str() {
            "sqlite" | "memory" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "history.backend must be 'sqlite' or 'memory', got '{other}'"
                )));
            }
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(ConfigError::ValidationError(format!(
                "logging.format must be 'pretty' or 'json', got '{other}'"
            ))),
        }
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            default_system_prompt: default_system_prompt(),
            providers: default_providers(),
            prompts: vec![],
            rag: RagConfig::default(),
            history: HistoryConfig::default(),
            chat_memory: ChatMemoryConfig::default(),
            gateway: GatewayConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
