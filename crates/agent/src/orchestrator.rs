//! The chat orchestrator: the single entry point for a chat turn.
//!
//! # Flow
//!
//! 1. Resolve the backend for (provider, model). Failure ends the request.
//! 2. Resolve the system prompt. Failure falls back to the default prompt.
//! 3. Retrieve conversation-scoped context. Failure means no context.
//! 4. Assemble the prompt.
//! 5. Invoke the backend, streamed or buffered.
//! 6. On success, write the (user, assistant) pair to the history store.
//!
//! Only backend lookup and backend invocation errors reach the caller.

use parley_core::error::ChatError;
use parley_core::history::{ChatTurn, HistoryStore};
use parley_core::message::{ConversationId, MediaAttachment};
use parley_core::tool::ToolRegistry;
use parley_providers::{BackendRegistry, TextStream};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};

use crate::assembler::PromptAssembler;
use crate::degrade::{self, Degradation};
use crate::prompt::{PromptCatalog, SystemPromptBinding};
use crate::retriever::ContextRetriever;

/// Capacity of the caller-facing chunk channel.
pub const STREAM_BUFFER: usize = 64;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are Parley, a helpful assistant. Answer clearly and concisely.";

/// One chat turn as requested by a client.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub text: String,
    pub conversation_id: ConversationId,
    pub stream: bool,
    pub provider: String,
    pub model: String,
    pub system_prompt_id: Option<String>,
    pub media: Vec<MediaAttachment>,
}

impl ChatRequest {
    pub fn new(
        text: impl Into<String>,
        conversation_id: ConversationId,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            conversation_id,
            stream: false,
            provider: provider.into(),
            model: model.into(),
            system_prompt_id: None,
            media: Vec::new(),
        }
    }

    pub fn streamed(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_system_prompt(mut self, id: impl Into<String>) -> Self {
        self.system_prompt_id = Some(id.into());
        self
    }

    pub fn with_media(mut self, media: Vec<MediaAttachment>) -> Self {
        self.media = media;
        self
    }
}

/// Text deltas in order. Ends after the last delta or after one `Err`.
/// Dropping it cancels the turn.
pub type ChatStream = ReceiverStream<Result<String, ChatError>>;

pub enum ChatOutcome {
    Streamed(ChatStream),
    Complete(String),
}

impl std::fmt::Debug for ChatOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Streamed(_) => f.write_str("Streamed(..)"),
            Self::Complete(text) => f.debug_tuple("Complete").field(text).finish(),
        }
    }
}

pub struct ChatOrchestrator {
    backends: Arc<BackendRegistry>,
    prompts: Arc<dyn PromptCatalog>,
    retriever: Arc<ContextRetriever>,
    assembler: PromptAssembler,
    history: Arc<dyn HistoryStore>,
    default_system_prompt: String,
}

impl ChatOrchestrator {
    pub fn new(
        backends: Arc<BackendRegistry>,
        prompts: Arc<dyn PromptCatalog>,
        retriever: Arc<ContextRetriever>,
        tools: Arc<ToolRegistry>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            backends,
            prompts,
            retriever,
            assembler: PromptAssembler::new(tools),
            history,
            default_system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_default_system_prompt(mut self, text: impl Into<String>) -> Self {
        self.default_system_prompt = text.into();
        self
    }

    pub fn with_max_passage_chars(mut self, max: usize) -> Self {
        self.assembler = self.assembler.with_max_passage_chars(max);
        self
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    pub async fn execute(&self, request: ChatRequest) -> Result<ChatOutcome, ChatError> {
        let ChatRequest {
            text,
            conversation_id,
            stream,
            provider,
            model,
            system_prompt_id,
            media,
        } = request;

        let handle = self.backends.resolve(&provider, &model).map_err(|e| {
            warn!(conversation_id = %conversation_id, provider = %provider, model = %model, error = %e, "Backend lookup failed");
            ChatError::from(e)
        })?;

        let binding = self
            .system_prompt(&conversation_id, system_prompt_id.as_deref())
            .await;
        let passages = self.retriever.retrieve(&text, &conversation_id).await;
        let prompt = self.assembler.assemble(
            &conversation_id,
            binding.text,
            &text,
            &passages,
            media,
            binding.tool_id.as_deref(),
        );

        info!(
            conversation_id = %conversation_id,
            provider = %handle.kind(),
            model = %handle.model(),
            stream,
            passages = passages.len(),
            "Executing chat turn"
        );

        if stream {
            let upstream = handle.stream(&conversation_id, prompt).await.map_err(|e| {
                error!(conversation_id = %conversation_id, error = %e, "Backend stream failed to start");
                ChatError::from(e)
            })?;
            Ok(ChatOutcome::Streamed(forward(
                self.history.clone(),
                conversation_id,
                text,
                upstream,
            )))
        } else {
            let answer = handle.call(&conversation_id, &prompt).await.map_err(|e| {
                error!(conversation_id = %conversation_id, error = %e, "Backend call failed");
                ChatError::from(e)
            })?;
            persist_turns(self.history.as_ref(), &conversation_id, &text, &answer).await;
            Ok(ChatOutcome::Complete(answer))
        }
    }

    async fn system_prompt(
        &self,
        conversation_id: &ConversationId,
        prompt_id: Option<&str>,
    ) -> SystemPromptBinding {
        let fallback = || SystemPromptBinding::plain(self.default_system_prompt.clone());
        let Some(prompt_id) = prompt_id.map(str::trim).filter(|id| !id.is_empty()) else {
            return fallback();
        };

        let resolved = self
            .prompts
            .resolve(prompt_id)
            .await
            .map_err(|e| Degradation::Prompt(e.to_string()));
        degrade::or_fallback(resolved, conversation_id, fallback)
    }
}

/// Forward deltas to the caller and accumulate them in the same pass.
///
/// The turn is persisted only when the upstream ends cleanly. The sender is
/// dropped after persistence, so the end of the caller's stream means the
/// rows are written.
fn forward(
    history: Arc<dyn HistoryStore>,
    conversation_id: ConversationId,
    user_text: String,
    mut upstream: TextStream,
) -> ChatStream {
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);

    tokio::spawn(async move {
        let mut answer = String::new();
        while let Some(item) = upstream.recv().await {
            match item {
                Ok(delta) => {
                    if tx.send(Ok(delta.clone())).await.is_err() {
                        info!(conversation_id = %conversation_id, "Client disconnected, turn discarded");
                        return;
                    }
                    answer.push_str(&delta);
                }
                Err(e) => {
                    error!(conversation_id = %conversation_id, error = %e, "Stream failed, turn discarded");
                    let _ = tx.send(Err(ChatError::Backend(e))).await;
                    return;
                }
            }
        }

        persist_turns(history.as_ref(), &conversation_id, &user_text, &answer).await;
        drop(tx);
    });

    ReceiverStream::new(rx)
}

/// Write the (user, assistant) pair in one batch. Failures are logged only.
async fn persist_turns(
    history: &dyn HistoryStore,
    conversation_id: &ConversationId,
    user_text: &str,
    answer: &str,
) {
    let turns = ChatTurn::pair(conversation_id, user_text, answer);
    match history.insert_turns(&turns).await {
        Ok(rows) => info!(
            conversation_id = %conversation_id,
            rows,
            answer_chars = answer.chars().count(),
            store = history.name(),
            "Chat history saved"
        ),
        Err(e) => error!(
            conversation_id = %conversation_id,
            error = %e,
            store = history.name(),
            "Failed to save chat history"
        ),
    }
}
