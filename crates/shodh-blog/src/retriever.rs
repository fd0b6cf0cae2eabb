use std::sync::Arc;

use crate::error::Result;
use crate::index::VectorIndex;

/// Topic in, context blob out.
pub struct Retriever {
    index: Arc<VectorIndex>,
    k: usize,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, k: usize) -> Self {
        Self { index, k }
    }

    /// Texts of the top-k chunks in similarity order, separated by blank lines.
    pub async fn retrieve(&self, topic: &str) -> Result<String> {
        let hits = self.index.query(topic, self.k).await?;
        tracing::debug!(topic, hits = hits.len(), "Retrieved context");
        Ok(hits
            .iter()
            .map(|h| h.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
