use std::sync::Arc;
use tokio::sync::Mutex;

use crate::embeddings::EmbeddingModel;
use crate::error::{BlogError, Result};
use crate::storage::VectorStore;
use crate::types::{Chunk, IndexEntry, ScoredChunk};

/// Similarity index over ingested chunks.
///
/// Writers serialize on an async mutex; queries go straight to the store,
/// which answers from memory.
pub struct VectorIndex {
    embeddings: Arc<dyn EmbeddingModel>,
    store: Arc<dyn VectorStore>,
    write_lock: Mutex<()>,
}

impl VectorIndex {
    pub fn new(embeddings: Arc<dyn EmbeddingModel>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embeddings,
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Embed and store `chunks`. Either all of them land in the index or none do.
    pub async fn add(&self, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let _guard = self.write_lock.lock().await;

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self
            .embeddings
            .embed_documents(&texts)
            .await
            .map_err(BlogError::Embedding)?;
        if vectors.len() != chunks.len() {
            return Err(BlogError::Embedding(anyhow::anyhow!(
                "Embedding model returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let created_at = chrono::Utc::now().timestamp();
        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry {
                chunk,
                vector,
                created_at,
            })
            .collect();
        let count = entries.len();

        self.store.append(entries).await.map_err(BlogError::Storage)?;
        tracing::info!(chunks = count, "Added chunks to vector index");
        Ok(count)
    }

    /// Top `min(k, len)` chunks for `text`, highest score first.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 || self.len().await? == 0 {
            return Ok(Vec::new());
        }

        let query = self
            .embeddings
            .embed_query(text)
            .await
            .map_err(BlogError::Embedding)?;
        let hits = self
            .store
            .search(&query, k)
            .await
            .map_err(BlogError::Storage)?;

        tracing::debug!(k, hits = hits.len(), "Vector query");
        Ok(hits)
    }

    pub async fn len(&self) -> Result<usize> {
        self.store.count().await.map_err(BlogError::Storage)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbeddings;
    use crate::processing::TextChunker;
    use crate::storage::FlatFileStore;
    use crate::types::{Document, DocumentFormat};
    use anyhow::anyhow;
    use async_trait::async_trait;

    fn index() -> VectorIndex {
        VectorIndex::new(
            Arc::new(HashingEmbeddings::new(128)),
            Arc::new(FlatFileStore::in_memory()),
        )
    }

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        let chunker = TextChunker::default();
        texts
            .iter()
            .flat_map(|t| {
                chunker.chunk_document(&Document::new(t.to_string(), "t.txt", DocumentFormat::TXT))
            })
            .collect()
    }

    struct FailingEmbeddings;

    #[async_trait]
    impl EmbeddingModel for FailingEmbeddings {
        async fn embed_query(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Err(anyhow!("embedding service down"))
        }
        async fn embed_document(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Err(anyhow!("embedding service down"))
        }
        fn dimension(&self) -> usize {
            8
        }
    }

    /// Holds `embed_documents` until released; queries embed immediately.
    struct GatedEmbeddings {
        inner: HashingEmbeddings,
        started: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl EmbeddingModel for GatedEmbeddings {
        async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            self.inner.embed_query(text).await
        }
        async fn embed_document(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            self.inner.embed_document(text).await
        }
        async fn embed_documents(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.started.notify_one();
            self.release.notified().await;
            self.inner.embed_documents(texts).await
        }
        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
    }

    #[tokio::test]
    async fn test_empty_index_query_returns_nothing() {
        let index = index();
        let hits = index.query("AI", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_query_returns_min_k_len_sorted() {
        let index = index();
        index
            .add(chunks(&[
                "Rust ownership and borrowing",
                "Python list comprehensions",
                "Rust async runtimes like tokio",
            ]))
            .await
            .unwrap();

        let hits = index.query("rust", 5).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(hits[0].chunk.text.contains("Rust"));

        let hits = index.query("rust", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_embedding_failure_stores_nothing() {
        let store = Arc::new(FlatFileStore::in_memory());
        let index = VectorIndex::new(Arc::new(FailingEmbeddings), store.clone());

        let err = index.add(chunks(&["anything"])).await.unwrap_err();
        assert!(matches!(err, BlogError::Embedding(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mismatched_dimensions_score_zero() {
        let store = Arc::new(FlatFileStore::in_memory());
        VectorIndex::new(Arc::new(HashingEmbeddings::new(64)), store.clone())
            .add(chunks(&["quantum computing"]))
            .await
            .unwrap();

        let index = VectorIndex::new(Arc::new(HashingEmbeddings::new(128)), store);
        let hits = index.query("quantum computing", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 0.0);
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_all_stored() {
        let index = Arc::new(index());
        let mut handles = Vec::new();
        for i in 0..4 {
            let index = index.clone();
            handles.push(tokio::spawn(async move {
                index.add(chunks(&[&format!("document number {i}")])).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(index.len().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_query_completes_while_add_is_embedding() {
        let store = Arc::new(FlatFileStore::in_memory());
        VectorIndex::new(Arc::new(HashingEmbeddings::new(128)), store.clone())
            .add(chunks(&["Rust ownership"]))
            .await
            .unwrap();

        let embeddings = Arc::new(GatedEmbeddings {
            inner: HashingEmbeddings::new(128),
            started: tokio::sync::Notify::new(),
            release: tokio::sync::Notify::new(),
        });
        let index = Arc::new(VectorIndex::new(embeddings.clone(), store));

        let writer = {
            let index = index.clone();
            tokio::spawn(async move { index.add(chunks(&["Rust lifetimes"])).await })
        };
        embeddings.started.notified().await;

        let hits = tokio::time::timeout(std::time::Duration::from_secs(5), index.query("rust", 5))
            .await
            .expect("query blocked behind an in-flight add")
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "Rust ownership");

        embeddings.release.notify_one();
        assert_eq!(writer.await.unwrap().unwrap(), 1);
        assert_eq!(index.len().await.unwrap(), 2);
    }
}
