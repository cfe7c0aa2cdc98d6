//! Embeddings through a provider's `/embeddings` endpoint.

use async_trait::async_trait;
use parley_core::error::MemoryError;
use parley_core::provider::{EmbeddingRequest, Provider};
use parley_core::retrieval::Embedder;
use std::sync::Arc;

pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, MemoryError> {
        let expected = texts.len();
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: texts,
            })
            .await
            .map_err(|e| MemoryError::EmbeddingFailed(e.to_string()))?;

        if response.embeddings.len() != expected {
            return Err(MemoryError::EmbeddingFailed(format!(
                "{} returned {} embeddings for {expected} inputs",
                self.provider.name(),
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::error::ProviderError;
    use parley_core::message::Message;
    use parley_core::provider::{EmbeddingResponse, ProviderRequest, ProviderResponse};

    struct FakeEmbeddings;

    #[async_trait]
    impl Provider for FakeEmbeddings {
        fn name(&self) -> &str {
            "fake"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: Message::assistant(""),
                usage: None,
                model: String::new(),
                metadata: serde_json::Map::new(),
            })
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            Ok(EmbeddingResponse {
                embeddings: request.inputs.iter().map(|t| vec![t.len() as f32]).collect(),
                model: request.model,
                usage: None,
            })
        }
    }

    struct NoEmbeddings;

    #[async_trait]
    impl Provider for NoEmbeddings {
        fn name(&self) -> &str {
            "none"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("none".into()))
        }
    }

    #[tokio::test]
    async fn embeds_one_vector_per_input() {
        let embedder = ProviderEmbedder::new(Arc::new(FakeEmbeddings), "text-embedding-3-small");
        let out = embedder.embed(vec!["ab".into(), "abcd".into()]).await.unwrap();
        assert_eq!(out, vec![vec![2.0], vec![4.0]]);
    }

    #[tokio::test]
    async fn provider_errors_become_embedding_failures() {
        let embedder = ProviderEmbedder::new(Arc::new(NoEmbeddings), "x");
        let err = embedder.embed(vec!["a".into()]).await.unwrap_err();
        assert!(matches!(err, MemoryError::EmbeddingFailed(_)));
    }
}
