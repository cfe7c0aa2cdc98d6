//! In-memory history store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use parley_core::error::MemoryError;
use parley_core::history::{ChatTurn, ConversationSummary, HistoryStore};
use parley_core::message::ConversationId;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Stores turns and summaries in Vecs behind a lock.
#[derive(Clone, Default)]
pub struct InMemoryHistoryStore {
    turns: Arc<RwLock<Vec<ChatTurn>>>,
    summaries: Arc<RwLock<Vec<ConversationSummary>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total turns across all conversations.
    pub async fn turn_count(&self) -> usize {
        self.turns.read().await.len()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn insert_turns(&self, turns: &[ChatTurn]) -> Result<u64, MemoryError> {
        self.turns.write().await.extend_from_slice(turns);
        Ok(turns.len() as u64)
    }

    async fn turns_for(&self, id: &ConversationId) -> Result<Vec<ChatTurn>, MemoryError> {
        let turns = self.turns.read().await;
        Ok(turns.iter().filter(|t| &t.conversation_id == id).cloned().collect())
    }

    async fn delete_turns(&self, id: &ConversationId) -> Result<u64, MemoryError> {
        let mut turns = self.turns.write().await;
        let before = turns.len();
        turns.retain(|t| &t.conversation_id != id);
        Ok((before - turns.len()) as u64)
    }

    async fn list_summaries(&self) -> Result<Vec<ConversationSummary>, MemoryError> {
        let mut all = self.summaries.read().await.clone();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }

    async fn insert_summary(&self, summary: &ConversationSummary) -> Result<(), MemoryError> {
        let mut summaries = self.summaries.write().await;
        if summaries.iter().any(|s| s.conversation_id == summary.conversation_id) {
            return Err(MemoryError::Validation(format!(
                "conversation '{}' already exists",
                summary.conversation_id
            )));
        }
        summaries.push(summary.clone());
        Ok(())
    }

    async fn update_summary(&self, summary: &ConversationSummary) -> Result<bool, MemoryError> {
        let mut summaries = self.summaries.write().await;
        match summaries
            .iter_mut()
            .find(|s| s.conversation_id == summary.conversation_id)
        {
            Some(existing) => {
                existing.title = summary.title.clone();
                existing.tag = summary.tag.clone();
                existing.updated_at = summary.updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_summary(&self, id: &ConversationId) -> Result<bool, MemoryError> {
        let mut summaries = self.summaries.write().await;
        let before = summaries.len();
        summaries.retain(|s| &s.conversation_id != id);
        Ok(summaries.len() < before)
    }
}
