//! No-op vector index: retrieval disabled.

use async_trait::async_trait;
use parley_core::error::MemoryError;
use parley_core::retrieval::{Document, RetrievedPassage, SearchRequest, VectorIndex};

/// Stores nothing and finds nothing.
pub struct NoopVectorIndex;

#[async_trait]
impl VectorIndex for NoopVectorIndex {
    fn name(&self) -> &str { "none" }

    async fn add(&self, _documents: Vec<Document>) -> Result<usize, MemoryError> {
        Ok(0)
    }

    async fn similarity_search(&self, _request: SearchRequest) -> Result<Vec<RetrievedPassage>, MemoryError> {
        Ok(Vec::new())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(0)
    }
}
