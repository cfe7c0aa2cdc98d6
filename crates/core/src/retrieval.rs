//! Similarity search over conversation-scoped documents.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::MemoryError;
use crate::message::ConversationId;

/// A chunk of text stored in a vector index, tagged with its conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub conversation_id: ConversationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(conversation_id: ConversationId, text: impl Into<String>, source: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            conversation_id,
            source,
            created_at: Utc::now(),
        }
    }
}

/// A similarity query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Hits scoring below this are dropped.
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Restrict hits to one conversation. Evaluated inside the index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
}

fn default_top_k() -> usize {
    3
}

fn default_threshold() -> f32 {
    0.3
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: default_top_k(),
            threshold: default_threshold(),
            conversation_id: None,
        }
    }

    pub fn in_conversation(mut self, id: ConversationId) -> Self {
        self.conversation_id = Some(id);
        self
    }
}

/// A search hit, ranked by descending score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub text: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Turns text into embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: Vec<String>) -> std::result::Result<Vec<Vec<f32>>, MemoryError>;
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The backend name (e.g., "in_memory", "none").
    fn name(&self) -> &str;

    /// Embed and store documents. Returns how many were added.
    async fn add(&self, documents: Vec<Document>) -> std::result::Result<usize, MemoryError>;

    /// Top-k hits above the threshold, best first.
    async fn similarity_search(
        &self,
        request: SearchRequest,
    ) -> std::result::Result<Vec<RetrievedPassage>, MemoryError>;

    /// Total documents stored.
    async fn count(&self) -> std::result::Result<usize, MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_request_defaults() {
        let req = SearchRequest::new("rust async");
        assert_eq!(req.top_k, 3);
        assert!((req.threshold - 0.3).abs() < f32::EPSILON);
        assert!(req.conversation_id.is_none());
    }

    #[test]
    fn search_request_scoped() {
        let req = SearchRequest::new("q").in_conversation(ConversationId::from("c9"));
        assert_eq!(req.conversation_id.unwrap().as_str(), "c9");
    }
}
