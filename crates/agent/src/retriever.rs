//! Context retrieval for RAG.
//!
//! Searches the vector index for passages belonging to the requesting
//! conversation. Retrieval never fails the request: errors and timeouts
//! degrade to "no passages".

use parley_config::RagConfig;
use parley_core::message::ConversationId;
use parley_core::retrieval::{RetrievedPassage, SearchRequest, VectorIndex};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::degrade::{self, Degradation};

pub struct ContextRetriever {
    index: Arc<dyn VectorIndex>,
    top_k: usize,
    threshold: f32,
    timeout: Duration,
}

impl ContextRetriever {
    /// Defaults: top 3 passages scoring at least 0.3, 10 second budget.
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self {
            index,
            top_k: 3,
            threshold: 0.3,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn from_config(index: Arc<dyn VectorIndex>, config: &RagConfig) -> Self {
        Self {
            index,
            top_k: config.top_k,
            threshold: config.similarity_threshold,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Passages for `query` in `conversation_id`, best first. Empty on any failure.
    pub async fn retrieve(&self, query: &str, conversation_id: &ConversationId) -> Vec<RetrievedPassage> {
        degrade::or_fallback(self.search(query, conversation_id).await, conversation_id, Vec::new)
    }

    async fn search(
        &self,
        query: &str,
        conversation_id: &ConversationId,
    ) -> Result<Vec<RetrievedPassage>, Degradation> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let request = SearchRequest {
            top_k: self.top_k,
            threshold: self.threshold,
            ..SearchRequest::new(query)
        }
        .in_conversation(conversation_id.clone());

        let passages = tokio::time::timeout(self.timeout, self.index.similarity_search(request))
            .await
            .map_err(|_| Degradation::Retrieval(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| Degradation::Retrieval(e.to_string()))?;

        for (i, passage) in passages.iter().enumerate() {
            let preview: String = passage.text.chars().take(50).collect();
            debug!(
                conversation_id = %conversation_id,
                rank = i + 1,
                score = passage.score,
                preview = %preview,
                "Retrieved passage"
            );
        }
        if passages.is_empty() {
            debug!(conversation_id = %conversation_id, index = self.index.name(), "No relevant passages");
        } else {
            info!(conversation_id = %conversation_id, passages = passages.len(), "Context retrieved");
        }
        Ok(passages)
    }
}
