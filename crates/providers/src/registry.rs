//! Backend registry: resolves a (provider, model) pair to a ready handle.
//!
//! The table is built once from configuration and never changes afterwards.
//! There is no fallback; a pair that is not in the table is an error.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parley_config::AppConfig;
use parley_core::error::BackendLookupError;
use parley_core::memory::ChatMemory;
use parley_core::provider::Provider;
use serde::Serialize;
use tracing::{info, warn};

use crate::handle::BackendHandle;
use crate::openai_compat::OpenAiCompatProvider;

/// The closed set of supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Ollama,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::OpenAi, ProviderKind::Ollama];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = BackendLookupError;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            _ => Err(BackendLookupError::UnknownProvider(s.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One row of the backend table, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendInfo {
    pub provider: ProviderKind,
    pub model: String,
}

/// Lookup table from (provider, model) to backend handle.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<(ProviderKind, String), BackendHandle>,
    providers: BTreeMap<ProviderKind, Arc<dyn Provider>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one handle per model for a provider.
    pub fn register_provider(
        &mut self,
        kind: ProviderKind,
        provider: Arc<dyn Provider>,
        models: &[String],
        memory: Arc<dyn ChatMemory>,
        configure: impl Fn(BackendHandle) -> BackendHandle,
    ) {
        for model in models {
            let handle = BackendHandle::new(kind, model.clone(), provider.clone(), memory.clone());
            self.backends.insert((kind, model.clone()), configure(handle));
        }
        self.providers.insert(kind, provider);
    }

    /// Resolve a provider name (any case) and model name to a handle.
    pub fn resolve(&self, provider: &str, model: &str) -> Result<BackendHandle, BackendLookupError> {
        let kind: ProviderKind = provider.parse()?;
        self.backends
            .get(&(kind, model.to_string()))
            .cloned()
            .ok_or_else(|| BackendLookupError::UnknownModel {
                provider: kind.as_str().to_string(),
                model: model.to_string(),
            })
    }

    /// The raw provider client, e.g. for embeddings.
    pub fn provider(&self, kind: ProviderKind) -> Option<Arc<dyn Provider>> {
        self.providers.get(&kind).cloned()
    }

    /// Every registered backend, sorted by provider then model.
    pub fn list(&self) -> Vec<BackendInfo> {
        self.backends
            .keys()
            .map(|(provider, model)| BackendInfo {
                provider: *provider,
                model: model.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Log the loaded backend table at startup.
    pub fn log_table(&self) {
        info!("Loaded model backends:");
        for kind in ProviderKind::ALL {
            let models: Vec<&str> = self
                .backends
                .keys()
                .filter(|(k, _)| *k == kind)
                .map(|(_, m)| m.as_str())
                .collect();
            if models.is_empty() {
                warn!(provider = %kind, "No models registered");
            }
            for model in models {
                info!(provider = %kind, model = %model, "Backend ready");
            }
        }
        info!(total = self.backends.len(), "Backend registry initialized");
    }
}

/// Build the backend table from configuration.
pub fn build_from_config(config: &AppConfig, memory: Arc<dyn ChatMemory>) -> BackendRegistry {
    let mut registry = BackendRegistry::new();

    for (name, provider_config) in &config.providers {
        // Names were validated at config load.
        let Ok(kind) = name.parse::<ProviderKind>() else {
            warn!(provider = %name, "Skipping unknown provider table");
            continue;
        };

        let base_url = provider_config
            .api_url
            .clone()
            .unwrap_or_else(|| kind.default_base_url().to_string());

        let provider: Arc<dyn Provider> = match kind {
            ProviderKind::OpenAi => {
                let api_key = provider_config.api_key.clone().unwrap_or_default();
                if api_key.is_empty() && !provider_config.models.is_empty() {
                    warn!("OpenAI models registered without an API key");
                }
                Arc::new(OpenAiCompatProvider::new(kind.as_str(), &base_url, api_key))
            }
            ProviderKind::Ollama => Arc::new(OpenAiCompatProvider::ollama(Some(&base_url))),
        };

        let temperature = config.default_temperature;
        let max_tokens = config.default_max_tokens;
        registry.register_provider(kind, provider, &provider_config.models, memory.clone(), |h| {
            h.with_temperature(temperature).with_max_tokens(max_tokens)
        });
    }

    registry.log_table();
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_config::ProviderConfig;
    use parley_memory::WindowChatMemory;

    fn memory() -> Arc<dyn ChatMemory> {
        Arc::new(WindowChatMemory::new(20))
    }

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("OLLAMA".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert!(matches!(
            "anthropic".parse::<ProviderKind>(),
            Err(BackendLookupError::UnknownProvider(p)) if p == "anthropic"
        ));
    }

    #[test]
    fn resolve_known_pair() {
        let registry = build_from_config(&AppConfig::default(), memory());
        let handle = registry.resolve("Ollama", "qwen3:14b").unwrap();
        assert_eq!(handle.kind(), ProviderKind::Ollama);
        assert_eq!(handle.model(), "qwen3:14b");
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let registry = build_from_config(&AppConfig::default(), memory());
        let err = registry.resolve("bard", "qwen3:14b").unwrap_err();
        assert!(matches!(err, BackendLookupError::UnknownProvider(_)));
    }

    #[test]
    fn unknown_model_is_an_error_with_no_fallback() {
        let registry = build_from_config(&AppConfig::default(), memory());
        let err = registry.resolve("ollama", "gpt-4o").unwrap_err();
        assert_eq!(
            err,
            BackendLookupError::UnknownModel {
                provider: "ollama".into(),
                model: "gpt-4o".into()
            }
        );
    }

    #[test]
    fn list_is_sorted_and_complete() {
        let registry = build_from_config(&AppConfig::default(), memory());
        let rows: Vec<(ProviderKind, String)> = registry
            .list()
            .into_iter()
            .map(|b| (b.provider, b.model))
            .collect();
        assert_eq!(
            rows,
            vec![
                (ProviderKind::OpenAi, "gpt-4o".to_string()),
                (ProviderKind::OpenAi, "grok-3".to_string()),
                (ProviderKind::Ollama, "qwen3:14b".to_string()),
            ]
        );
    }

    #[test]
    fn custom_provider_url_and_models() {
        let mut config = AppConfig::default();
        config.providers.clear();
        config.providers.insert(
            "Ollama".into(),
            ProviderConfig {
                api_key: None,
                api_url: Some("http://gpu-box:11434/v1".into()),
                models: vec!["llama3.1:8b".into()],
            },
        );
        let registry = build_from_config(&config, memory());
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve("ollama", "llama3.1:8b").is_ok());
        assert!(registry.provider(ProviderKind::OpenAi).is_none());
    }
}
