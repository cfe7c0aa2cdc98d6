//! Chat memory: the short window of prior messages a backend sees.
//!
//! This is separate from [`HistoryStore`](crate::HistoryStore). History is the
//! durable record; chat memory is what gets replayed into the next request.

use async_trait::async_trait;
use crate::error::MemoryError;
use crate::message::{ConversationId, Message};

#[async_trait]
pub trait ChatMemory: Send + Sync {
    /// Prior messages for the conversation, oldest first.
    async fn load(&self, id: &ConversationId) -> std::result::Result<Vec<Message>, MemoryError>;

    /// Append messages after a completed exchange.
    async fn append(&self, id: &ConversationId, messages: Vec<Message>) -> std::result::Result<(), MemoryError>;

    /// Forget a conversation.
    async fn clear(&self, id: &ConversationId) -> std::result::Result<(), MemoryError>;
}
