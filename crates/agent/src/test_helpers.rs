//! Shared test doubles for orchestrator tests.

use async_trait::async_trait;
use parley_core::error::{MemoryError, ProviderError};
use parley_core::history::{ChatTurn, ConversationSummary, HistoryStore};
use parley_core::message::{ConversationId, Message};
use parley_core::provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
use parley_memory::WindowChatMemory;
use parley_providers::{BackendRegistry, ProviderKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// A provider that answers with a fixed list of text deltas.
///
/// Streams can be made to fail or stall after a given number of deltas.
#[derive(Default)]
pub struct ChunkedProvider {
    chunks: Vec<String>,
    fail_at: Option<(usize, ProviderError)>,
    pause_at: Option<(usize, Duration)>,
    refuse: Option<ProviderError>,
    calls: AtomicUsize,
    last_request: Mutex<Option<ProviderRequest>>,
}

impl ChunkedProvider {
    pub fn new(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Send an error instead of delta number `index`.
    pub fn failing_at(mut self, index: usize, error: ProviderError) -> Self {
        self.fail_at = Some((index, error));
        self
    }

    /// Sleep before delta number `index`.
    pub fn pausing_at(mut self, index: usize, pause: Duration) -> Self {
        self.pause_at = Some((index, pause));
        self
    }

    /// Fail every request up front.
    pub fn refusing(error: ProviderError) -> Self {
        Self {
            refuse: Some(error),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.last_request.lock().unwrap().clone()
    }

    fn record(&self, request: ProviderRequest) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
        match &self.refuse {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Provider for ChunkedProvider {
    fn name(&self) -> &str {
        "chunked"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.record(request)?;
        if let Some((_, e)) = &self.fail_at {
            return Err(e.clone());
        }
        Ok(ProviderResponse {
            message: Message::assistant(self.chunks.concat()),
            usage: None,
            model: "test".into(),
            metadata: serde_json::Map::new(),
        })
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        self.record(request)?;
        let (tx, rx) = mpsc::channel(8);
        let chunks = self.chunks.clone();
        let fail_at = self.fail_at.clone();
        let pause_at = self.pause_at;

        tokio::spawn(async move {
            for (i, text) in chunks.into_iter().enumerate() {
                if let Some((at, pause)) = pause_at {
                    if at == i {
                        tokio::time::sleep(pause).await;
                    }
                }
                if let Some((at, e)) = &fail_at {
                    if *at == i {
                        let _ = tx.send(Err(e.clone())).await;
                        return;
                    }
                }
                let chunk = StreamChunk {
                    content: Some(text),
                    tool_calls: vec![],
                    done: false,
                    usage: None,
                };
                if tx.send(Ok(chunk)).await.is_err() {
                    return;
                }
            }
            let _ = tx
                .send(Ok(StreamChunk {
                    content: None,
                    tool_calls: vec![],
                    done: true,
                    usage: None,
                }))
                .await;
        });

        Ok(rx)
    }
}

/// Registry with one ollama model, `qwen3:14b`, backed by `provider`.
pub fn registry_with(provider: Arc<dyn Provider>) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register_provider(
        ProviderKind::Ollama,
        provider,
        &["qwen3:14b".to_string()],
        Arc::new(WindowChatMemory::new(20)),
        |handle| handle,
    );
    registry
}

/// A history store whose every operation fails.
pub struct BrokenHistoryStore;

#[async_trait]
impl HistoryStore for BrokenHistoryStore {
    fn name(&self) -> &str {
        "broken"
    }

    async fn insert_turns(&self, _turns: &[ChatTurn]) -> Result<u64, MemoryError> {
        Err(MemoryError::Storage("disk full".into()))
    }

    async fn turns_for(&self, _id: &ConversationId) -> Result<Vec<ChatTurn>, MemoryError> {
        Err(MemoryError::QueryFailed("disk full".into()))
    }

    async fn delete_turns(&self, _id: &ConversationId) -> Result<u64, MemoryError> {
        Err(MemoryError::Storage("turns locked".into()))
    }

    async fn list_summaries(&self) -> Result<Vec<ConversationSummary>, MemoryError> {
        Err(MemoryError::QueryFailed("disk full".into()))
    }

    async fn insert_summary(&self, _summary: &ConversationSummary) -> Result<(), MemoryError> {
        Err(MemoryError::Storage("disk full".into()))
    }

    async fn update_summary(&self, _summary: &ConversationSummary) -> Result<bool, MemoryError> {
        Err(MemoryError::Storage("disk full".into()))
    }

    async fn delete_summary(&self, _id: &ConversationId) -> Result<bool, MemoryError> {
        Err(MemoryError::Storage("summary locked".into()))
    }
}
