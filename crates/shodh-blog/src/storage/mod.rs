pub mod flat_store;
#[cfg(feature = "lancedb")]
pub mod lance_store;

pub use flat_store::FlatFileStore;
#[cfg(feature = "lancedb")]
pub use lance_store::LanceStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{IndexEntry, ScoredChunk};

/// Persistent home of (chunk, vector) entries.
///
/// Implementations only append; nothing is ever updated or deleted.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append every entry or none of them.
    async fn append(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Top `k` entries by cosine similarity to `query`, best first.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    async fn count(&self) -> Result<usize>;
}
