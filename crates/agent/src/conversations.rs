//! Conversation management: summary CRUD and turn history over a
//! [`HistoryStore`].

use chrono::Utc;
use parley_core::error::MemoryError;
use parley_core::history::{ChatTurn, ConversationSummary, HistoryStore};
use parley_core::memory::ChatMemory;
use parley_core::message::ConversationId;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("invalid conversation: {0}")]
    Validation(String),

    #[error("conversation '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] MemoryError),

    /// Part of a delete failed. Whatever succeeded stays done.
    #[error("failed to delete conversation '{conversation_id}': {}", .failures.join("; "))]
    Delete {
        conversation_id: String,
        failures: Vec<String>,
    },
}

impl From<ConversationError> for MemoryError {
    fn from(e: ConversationError) -> Self {
        match e {
            ConversationError::Validation(m) => MemoryError::Validation(m),
            ConversationError::NotFound(m) => MemoryError::NotFound(m),
            ConversationError::Storage(inner) => inner,
            other => MemoryError::Storage(other.to_string()),
        }
    }
}

/// What a delete removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub summary_removed: bool,
    pub turns_removed: u64,
    /// False when no chat memory is attached.
    pub memory_cleared: bool,
}

#[derive(Clone)]
pub struct ConversationService {
    store: Arc<dyn HistoryStore>,
    chat_memory: Option<Arc<dyn ChatMemory>>,
}

fn require(value: &str, field: &str) -> Result<(), ConversationError> {
    if value.trim().is_empty() {
        return Err(ConversationError::Validation(format!("{field} must not be blank")));
    }
    Ok(())
}

impl ConversationService {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self {
            store,
            chat_memory: None,
        }
    }

    /// Attach the chat memory the backends replay from, so a delete forgets
    /// the conversation there too.
    pub fn with_chat_memory(mut self, memory: Arc<dyn ChatMemory>) -> Self {
        self.chat_memory = Some(memory);
        self
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// All summaries, most recently updated first.
    pub async fn list(&self) -> Result<Vec<ConversationSummary>, ConversationError> {
        Ok(self.store.list_summaries().await?)
    }

    pub async fn create(
        &self,
        id: &str,
        title: &str,
        tag: Option<String>,
    ) -> Result<ConversationSummary, ConversationError> {
        require(id, "conversation id")?;
        require(title, "title")?;

        let summary = ConversationSummary::new(ConversationId::from(id.trim()), title.trim(), tag);
        self.store.insert_summary(&summary).await?;
        info!(conversation_id = %summary.conversation_id, "Conversation created");
        Ok(summary)
    }

    pub async fn update(
        &self,
        id: &str,
        title: &str,
        tag: Option<String>,
    ) -> Result<ConversationSummary, ConversationError> {
        require(id, "conversation id")?;

        let conversation_id = ConversationId::from(id.trim());
        let existing = self
            .store
            .list_summaries()
            .await?
            .into_iter()
            .find(|s| s.conversation_id == conversation_id)
            .ok_or_else(|| ConversationError::NotFound(id.to_string()))?;

        let summary = ConversationSummary {
            title: if title.trim().is_empty() {
                existing.title
            } else {
                title.trim().to_string()
            },
            tag,
            updated_at: Utc::now(),
            ..existing
        };
        if !self.store.update_summary(&summary).await? {
            return Err(ConversationError::NotFound(id.to_string()));
        }
        info!(conversation_id = %conversation_id, "Conversation updated");
        Ok(summary)
    }

    /// Remove the summary, every turn and the replayed chat memory. Each
    /// deletion is always attempted; there is no rollback if only some succeed.
    pub async fn delete(&self, id: &str) -> Result<DeleteReport, ConversationError> {
        require(id, "conversation id")?;
        let conversation_id = ConversationId::from(id.trim());

        let summary = self.store.delete_summary(&conversation_id).await;
        let turns = self.store.delete_turns(&conversation_id).await;
        let memory = match &self.chat_memory {
            Some(memory) => memory.clear(&conversation_id).await.map(|()| true),
            None => Ok(false),
        };

        match (summary, turns, memory) {
            (Ok(summary_removed), Ok(turns_removed), Ok(memory_cleared)) => {
                info!(
                    conversation_id = %conversation_id,
                    summary_removed,
                    turns_removed,
                    memory_cleared,
                    "Conversation deleted"
                );
                Ok(DeleteReport {
                    summary_removed,
                    turns_removed,
                    memory_cleared,
                })
            }
            (summary, turns, memory) => {
                let mut failures = Vec::new();
                if let Err(e) = summary {
                    failures.push(format!("summary: {e}"));
                }
                if let Err(e) = turns {
                    failures.push(format!("turns: {e}"));
                }
                if let Err(e) = memory {
                    failures.push(format!("chat memory: {e}"));
                }
                error!(conversation_id = %conversation_id, failures = ?failures, "Conversation delete incomplete");
                Err(ConversationError::Delete {
                    conversation_id: conversation_id.to_string(),
                    failures,
                })
            }
        }
    }

    /// Turns in insertion order.
    pub async fn history(&self, id: &str) -> Result<Vec<ChatTurn>, ConversationError> {
        require(id, "conversation id")?;
        Ok(self.store.turns_for(&ConversationId::from(id.trim())).await?)
    }
}
