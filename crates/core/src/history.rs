//! Durable chat history: turn rows and conversation summaries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::MemoryError;
use crate::message::ConversationId;

/// Who produced a persisted turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One persisted row of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub conversation_id: ConversationId,
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(conversation_id: ConversationId, role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            conversation_id,
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// The user/assistant pair written after a successful exchange.
    ///
    /// Both rows share a timestamp; stores keep insertion order within it.
    pub fn pair(
        conversation_id: &ConversationId,
        user_text: impl Into<String>,
        assistant_text: impl Into<String>,
    ) -> [ChatTurn; 2] {
        let now = Utc::now();
        [
            ChatTurn {
                conversation_id: conversation_id.clone(),
                role: TurnRole::User,
                content: user_text.into(),
                created_at: now,
            },
            ChatTurn {
                conversation_id: conversation_id.clone(),
                role: TurnRole::Assistant,
                content: assistant_text.into(),
                created_at: now,
            },
        ]
    }
}

/// The list entry for a conversation (title and optional tag).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: ConversationId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSummary {
    pub fn new(conversation_id: ConversationId, title: impl Into<String>, tag: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            conversation_id,
            title: title.into(),
            tag,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Persistence for chat turns and conversation summaries.
///
/// Implementations: SQLite and in-memory.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "memory").
    fn name(&self) -> &str;

    /// Append a batch of turns in one call. Returns the number of rows written.
    async fn insert_turns(&self, turns: &[ChatTurn]) -> std::result::Result<u64, MemoryError>;

    /// All turns for a conversation, in insertion order.
    async fn turns_for(&self, id: &ConversationId) -> std::result::Result<Vec<ChatTurn>, MemoryError>;

    /// Remove every turn of a conversation. Returns the number removed.
    async fn delete_turns(&self, id: &ConversationId) -> std::result::Result<u64, MemoryError>;

    /// All summaries, most recently updated first.
    async fn list_summaries(&self) -> std::result::Result<Vec<ConversationSummary>, MemoryError>;

    async fn insert_summary(&self, summary: &ConversationSummary) -> std::result::Result<(), MemoryError>;

    /// Returns `false` when no summary exists for the id.
    async fn update_summary(&self, summary: &ConversationSummary) -> std::result::Result<bool, MemoryError>;

    /// Returns `false` when no summary exists for the id.
    async fn delete_summary(&self, id: &ConversationId) -> std::result::Result<bool, MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_is_user_then_assistant() {
        let id = ConversationId::from("c1");
        let [user, assistant] = ChatTurn::pair(&id, "What's the weather?", "Sunny.");
        assert_eq!(user.role, TurnRole::User);
        assert_eq!(user.content, "What's the weather?");
        assert_eq!(assistant.role, TurnRole::Assistant);
        assert_eq!(assistant.conversation_id, id);
    }

    #[test]
    fn turn_role_parses_its_own_names() {
        for role in [TurnRole::User, TurnRole::Assistant] {
            assert_eq!(TurnRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(TurnRole::parse("system"), None);
    }
}
