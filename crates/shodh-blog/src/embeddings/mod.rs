pub mod api;
pub mod cached;
pub mod hashing;

pub use api::ApiEmbeddings;
pub use cached::CachedEmbeddings;
pub use hashing::HashingEmbeddings;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingBackend, EmbeddingConfig};

/// Unified embedding model trait
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed a search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a document chunk
    async fn embed_document(&self, text: &str) -> Result<Vec<f32>>;

    /// Batch embed documents for ingestion
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_document(text).await?);
        }
        Ok(out)
    }

    /// Embedding vector dimension
    fn dimension(&self) -> usize;
}

/// Build the configured backend, wrapped in a query cache.
pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingModel>> {
    let model: Arc<dyn EmbeddingModel> = match config.backend {
        EmbeddingBackend::Hashing => Arc::new(CachedEmbeddings::new(
            HashingEmbeddings::new(config.dimension),
            config.cache_size,
        )),
        EmbeddingBackend::Api => Arc::new(CachedEmbeddings::new(
            ApiEmbeddings::from_config(config)?,
            config.cache_size,
        )),
    };
    tracing::info!(
        backend = ?config.backend,
        dimension = model.dimension(),
        "Embedding model ready"
    );
    Ok(model)
}

/// Cosine similarity; vectors of different length (or zero norm) score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_dimension_mismatch() {
        assert_eq!(cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_from_config_hashing() {
        let model = from_config(&EmbeddingConfig::default()).unwrap();
        assert_eq!(model.dimension(), 384);
        let v = model.embed_query("rust ownership").await.unwrap();
        assert_eq!(v.len(), 384);
    }
}
