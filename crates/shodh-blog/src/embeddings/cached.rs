use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

use super::EmbeddingModel;

/// LRU cache of query embeddings in front of another model.
///
/// Only queries are cached; documents are embedded once at ingestion anyway.
pub struct CachedEmbeddings<E> {
    inner: E,
    cache: Mutex<lru::LruCache<String, Vec<f32>>>,
}

impl<E: EmbeddingModel> CachedEmbeddings<E> {
    pub fn new(inner: E, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(lru::LruCache::new(capacity)),
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }
}

#[async_trait]
impl<E: EmbeddingModel> EmbeddingModel for CachedEmbeddings<E> {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let hit = self.cache.lock().get(text).cloned();
        if let Some(hit) = hit {
            return Ok(hit);
        }
        let vector = self.inner.embed_query(text).await?;
        self.cache.lock().put(text.to_string(), vector.clone());
        Ok(vector)
    }

    async fn embed_document(&self, text: &str) -> Result<Vec<f32>> {
        self.inner.embed_document(text).await
    }

    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.inner.embed_documents(texts).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbeddings;

    #[tokio::test]
    async fn test_queries_are_cached() {
        let model = CachedEmbeddings::new(HashingEmbeddings::new(32), 2);
        let first = model.embed_query("alpha").await.unwrap();
        let again = model.embed_query("alpha").await.unwrap();
        assert_eq!(first, again);
        assert_eq!(model.cached_len(), 1);

        model.embed_query("beta").await.unwrap();
        model.embed_query("gamma").await.unwrap();
        assert_eq!(model.cached_len(), 2);

        model.embed_document("delta").await.unwrap();
        assert_eq!(model.cached_len(), 2);
    }
}
