//! Builds every shared service from configuration, once, at start-up.

use parley_agent::{ChatOrchestrator, ContextRetriever, ConversationService, DocumentIngestor, StaticPromptCatalog};
use parley_config::AppConfig;
use parley_core::error::MemoryError;
use parley_core::history::HistoryStore;
use parley_core::memory::ChatMemory;
use parley_core::retrieval::VectorIndex;
use parley_memory::{InMemoryHistoryStore, InMemoryVectorIndex, NoopVectorIndex, SqliteHistoryStore, WindowChatMemory};
use parley_providers::{BackendRegistry, ProviderEmbedder, ProviderKind, build_from_config};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::api_v1::ApiV1State;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("history store unavailable: {0}")]
    History(#[from] MemoryError),

    #[error("cannot create history directory {path}: {reason}")]
    HistoryDir { path: String, reason: String },
}

/// Open the configured history store.
pub async fn open_history(config: &AppConfig) -> Result<Arc<dyn HistoryStore>, BootstrapError> {
    if config.history.backend == "memory" {
        info!("Using in-memory history store; turns are lost on exit");
        return Ok(Arc::new(InMemoryHistoryStore::new()));
    }

    let path = config.history.resolved_path();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BootstrapError::HistoryDir {
                path: parent.display().to_string(),
                reason: e.to_string(),
            })?;
    }
    let store = SqliteHistoryStore::new(&path.to_string_lossy()).await?;
    Ok(Arc::new(store))
}

/// The vector index backing retrieval and ingestion.
fn build_vector_index(config: &AppConfig, backends: &BackendRegistry) -> Arc<dyn VectorIndex> {
    if !config.rag.enabled {
        info!("Retrieval disabled");
        return Arc::new(NoopVectorIndex);
    }

    let provider = config
        .rag
        .embedding_provider
        .parse::<ProviderKind>()
        .ok()
        .and_then(|kind| backends.provider(kind));
    match provider {
        Some(provider) => {
            info!(
                provider = %config.rag.embedding_provider,
                model = %config.rag.embedding_model,
                "Retrieval enabled"
            );
            let embedder = ProviderEmbedder::new(provider, config.rag.embedding_model.clone());
            Arc::new(InMemoryVectorIndex::new(Arc::new(embedder)))
        }
        None => {
            warn!(
                provider = %config.rag.embedding_provider,
                "Embedding provider not configured, retrieval disabled"
            );
            Arc::new(NoopVectorIndex)
        }
    }
}

/// Assemble the full service graph around a given history store.
pub fn build_state_with_history(config: &AppConfig, history: Arc<dyn HistoryStore>) -> ApiV1State {
    let memory: Arc<dyn ChatMemory> = Arc::new(WindowChatMemory::new(config.chat_memory.window));
    let backends = Arc::new(build_from_config(config, memory.clone()));
    let tools = Arc::new(parley_tools::default_registry());
    let prompts = Arc::new(StaticPromptCatalog::from_config(&config.prompts));

    let index = build_vector_index(config, &backends);
    let retriever = Arc::new(ContextRetriever::from_config(index.clone(), &config.rag));
    let ingestor = Arc::new(DocumentIngestor::new(index).with_chunk_chars(config.rag.chunk_chars));

    let orchestrator = Arc::new(
        ChatOrchestrator::new(
            backends.clone(),
            prompts.clone(),
            retriever,
            tools.clone(),
            history.clone(),
        )
        .with_default_system_prompt(config.default_system_prompt.clone())
        .with_max_passage_chars(config.rag.max_passage_chars),
    );

    ApiV1State {
        orchestrator,
        conversations: ConversationService::new(history).with_chat_memory(memory),
        ingestor,
        backends,
        tools,
        prompts,
        default_provider: config.default_provider.clone(),
        default_model: config.default_model.clone(),
    }
}

/// Assemble the full service graph from configuration.
pub async fn build_state(config: &AppConfig) -> Result<ApiV1State, BootstrapError> {
    let history = open_history(config).await?;
    info!(store = history.name(), "History store ready");
    Ok(build_state_with_history(config, history))
}
