//! Sliding-window chat memory kept in process.

use async_trait::async_trait;
use parley_core::error::MemoryError;
use parley_core::memory::ChatMemory;
use parley_core::message::{ConversationId, Message};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// Keeps the last `window` messages per conversation.
pub struct WindowChatMemory {
    window: usize,
    conversations: RwLock<HashMap<ConversationId, VecDeque<Message>>>,
}

impl WindowChatMemory {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            conversations: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ChatMemory for WindowChatMemory {
    async fn load(&self, id: &ConversationId) -> Result<Vec<Message>, MemoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations
            .get(id)
            .map(|messages| messages.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn append(&self, id: &ConversationId, messages: Vec<Message>) -> Result<(), MemoryError> {
        if self.window == 0 {
            return Ok(());
        }
        let mut conversations = self.conversations.write().await;
        let slot = conversations.entry(id.clone()).or_default();
        for mut message in messages {
            // Attachments are not replayed.
            message.media.clear();
            slot.push_back(message);
        }
        while slot.len() > self.window {
            slot.pop_front();
        }
        Ok(())
    }

    async fn clear(&self, id: &ConversationId) -> Result<(), MemoryError> {
        self.conversations.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::message::{MediaAttachment, Role};

    #[tokio::test]
    async fn window_keeps_most_recent() {
        let memory = WindowChatMemory::new(3);
        let id = ConversationId::from("c1");
        memory
            .append(&id, vec![Message::user("1"), Message::assistant("2")])
            .await
            .unwrap();
        memory
            .append(&id, vec![Message::user("3"), Message::assistant("4")])
            .await
            .unwrap();

        let loaded: Vec<String> = memory.load(&id).await.unwrap().into_iter().map(|m| m.content).collect();
        assert_eq!(loaded, vec!["2", "3", "4"]);
    }

    #[tokio::test]
    async fn conversations_are_isolated() {
        let memory = WindowChatMemory::new(10);
        memory
            .append(&ConversationId::from("a"), vec![Message::user("for a")])
            .await
            .unwrap();
        assert!(memory.load(&ConversationId::from("b")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn media_is_not_replayed() {
        let memory = WindowChatMemory::new(10);
        let id = ConversationId::from("c1");
        let image = MediaAttachment::new("image/png", None, vec![1, 2, 3]).unwrap();
        memory
            .append(&id, vec![Message::user_with_media("look", vec![image])])
            .await
            .unwrap();

        let loaded = memory.load(&id).await.unwrap();
        assert_eq!(loaded[0].role, Role::User);
        assert!(loaded[0].media.is_empty());
    }

    #[tokio::test]
    async fn clear_forgets_conversation() {
        let memory = WindowChatMemory::new(10);
        let id = ConversationId::from("c1");
        memory.append(&id, vec![Message::user("x")]).await.unwrap();
        memory.clear(&id).await.unwrap();
        assert!(memory.load(&id).await.unwrap().is_empty());
    }
}
