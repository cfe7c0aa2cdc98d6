//! Document ingestion: chunk, embed, and store text for one conversation.

use parley_core::error::MemoryError;
use parley_core::message::ConversationId;
use parley_core::retrieval::{Document, VectorIndex};
use parley_memory::split_into_chunks;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_CHUNK_CHARS: usize = 800;

pub struct DocumentIngestor {
    index: Arc<dyn VectorIndex>,
    chunk_chars: usize,
}

impl DocumentIngestor {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self {
            index,
            chunk_chars: DEFAULT_CHUNK_CHARS,
        }
    }

    pub fn with_chunk_chars(mut self, chunk_chars: usize) -> Self {
        self.chunk_chars = chunk_chars;
        self
    }

    /// Returns the number of chunks stored.
    pub async fn ingest(
        &self,
        conversation_id: &ConversationId,
        source: Option<String>,
        text: &str,
    ) -> Result<usize, MemoryError> {
        if conversation_id.is_blank() {
            return Err(MemoryError::Validation("conversation id must not be blank".into()));
        }
        let chunks = split_into_chunks(text, self.chunk_chars);
        if chunks.is_empty() {
            return Err(MemoryError::Validation("document has no text".into()));
        }

        let documents: Vec<Document> = chunks
            .into_iter()
            .map(|chunk| Document::new(conversation_id.clone(), chunk, source.clone()))
            .collect();
        let stored = self.index.add(documents).await?;
        info!(
            conversation_id = %conversation_id,
            source = source.as_deref().unwrap_or("-"),
            chunks = stored,
            index = self.index.name(),
            "Document ingested"
        );
        Ok(stored)
    }
}
