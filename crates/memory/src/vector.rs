//! Vector similarity search.
//!
//! [`cosine_similarity`] plus an in-process [`InMemoryVectorIndex`] that
//! embeds through an [`Embedder`] and ranks stored chunks against the query.

use async_trait::async_trait;
use parley_core::error::MemoryError;
use parley_core::retrieval::{Document, Embedder, RetrievedPassage, SearchRequest, VectorIndex};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

struct StoredChunk {
    document: Document,
    embedding: Vec<f32>,
}

/// Brute-force vector index held in memory.
pub struct InMemoryVectorIndex {
    embedder: Arc<dyn Embedder>,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryVectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            chunks: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn add(&self, documents: Vec<Document>) -> Result<usize, MemoryError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let embeddings = self.embedder.embed(texts).await?;
        if embeddings.len() != documents.len() {
            return Err(MemoryError::EmbeddingFailed(format!(
                "expected {} embeddings, got {}",
                documents.len(),
                embeddings.len()
            )));
        }

        let added = documents.len();
        let mut chunks = self.chunks.write().await;
        chunks.extend(
            documents
                .into_iter()
                .zip(embeddings)
                .map(|(document, embedding)| StoredChunk { document, embedding }),
        );
        debug!(added, total = chunks.len(), "Indexed document chunks");
        Ok(added)
    }

    async fn similarity_search(&self, request: SearchRequest) -> Result<Vec<RetrievedPassage>, MemoryError> {
        if request.query.trim().is_empty() || request.top_k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(vec![request.query.clone()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::EmbeddingFailed("no embedding returned for query".into()))?;

        let chunks = self.chunks.read().await;
        let mut hits: Vec<RetrievedPassage> = chunks
            .iter()
            .filter(|c| match &request.conversation_id {
                Some(id) => &c.document.conversation_id == id,
                None => true,
            })
            .filter_map(|c| {
                let score = cosine_similarity(&c.embedding, &query_embedding);
                (score >= request.threshold).then(|| RetrievedPassage {
                    text: c.document.text.clone(),
                    score,
                    source: c.document.source.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(request.top_k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.chunks.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::message::ConversationId;

    /// Embeds by keyword presence so similarities are predictable.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, MemoryError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    ["rust", "coffee", "weather"]
                        .iter()
                        .map(|k| if t.contains(k) { 1.0 } else { 0.0 })
                        .collect()
                })
                .collect())
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        async fn embed(&self, _texts: Vec<String>) -> Result<Vec<Vec<f32>>, MemoryError> {
            Err(MemoryError::EmbeddingFailed("offline".into()))
        }
    }

    fn doc(conv: &str, text: &str) -> Document {
        Document::new(ConversationId::from(conv), text, None)
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn cosine_known_value() {
        // [1,1] · [1,0] = 1, |[1,1]| = sqrt(2), |[1,0]| = 1
        let sim = cosine_similarity(&[1.0, 1.0], &[1.0, 0.0]);
        assert!((sim - 0.7071).abs() < 0.001);
    }

    #[tokio::test]
    async fn search_ranks_and_applies_threshold() {
        let index = InMemoryVectorIndex::new(Arc::new(KeywordEmbedder));
        index
            .add(vec![
                doc("c1", "Rust and coffee"),
                doc("c1", "Rust ownership rules"),
                doc("c1", "Tomorrow's weather"),
            ])
            .await
            .unwrap();

        let hits = index
            .similarity_search(SearchRequest::new("rust").in_conversation(ConversationId::from("c1")))
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "Rust ownership rules");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn search_never_crosses_conversations() {
        let index = InMemoryVectorIndex::new(Arc::new(KeywordEmbedder));
        index
            .add(vec![doc("c1", "rust in c1"), doc("c2", "rust in c2")])
            .await
            .unwrap();

        let hits = index
            .similarity_search(SearchRequest::new("rust").in_conversation(ConversationId::from("c2")))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "rust in c2");
    }

    #[tokio::test]
    async fn top_k_caps_results() {
        let index = InMemoryVectorIndex::new(Arc::new(KeywordEmbedder));
        let docs = (0..5).map(|i| doc("c1", &format!("rust note {i}"))).collect();
        index.add(docs).await.unwrap();

        let hits = index.similarity_search(SearchRequest::new("rust")).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(index.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn embedder_failure_surfaces_as_error() {
        let index = InMemoryVectorIndex::new(Arc::new(BrokenEmbedder));
        let err = index.similarity_search(SearchRequest::new("rust")).await.unwrap_err();
        assert!(matches!(err, MemoryError::EmbeddingFailed(_)));
    }
}
