use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::VectorStore;
use crate::embeddings::cosine_similarity;
use crate::types::{IndexEntry, ScoredChunk};

const ENTRIES_FILE: &str = "entries.jsonl";

/// In-memory entries mirrored to an append-only JSON-lines file.
///
/// Searches only touch memory; the file is read once on open and written on append.
pub struct FlatFileStore {
    entries: RwLock<Vec<IndexEntry>>,
    file: Option<PathBuf>,
}

impl FlatFileStore {
    /// Open (or create) the store under `dir`, loading any entries from earlier runs.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create store directory: {}", dir.display()))?;

        let file = dir.join(ENTRIES_FILE);
        let entries = if tokio::fs::try_exists(&file).await.unwrap_or(false) {
            let mut raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let complete = complete_len(&raw);
            if complete < raw.len() {
                tracing::warn!(
                    path = %file.display(),
                    dropped_bytes = raw.len() - complete,
                    "Dropping torn entry at end of store file"
                );
                truncate(&file, complete as u64).await?;
                raw.truncate(complete);
            }
            parse_entries(&raw)
        } else {
            Vec::new()
        };

        tracing::info!(
            path = %file.display(),
            entries = entries.len(),
            "Opened vector store"
        );

        Ok(Self {
            entries: RwLock::new(entries),
            file: Some(file),
        })
    }

    /// Store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            file: None,
        }
    }
}

/// Length of `raw` up to and including its last newline.
fn complete_len(raw: &str) -> usize {
    raw.rfind('\n').map(|i| i + 1).unwrap_or(0)
}

async fn truncate(file: &Path, len: u64) -> Result<()> {
    let handle = tokio::fs::OpenOptions::new()
        .write(true)
        .open(file)
        .await
        .with_context(|| format!("Failed to open {}", file.display()))?;
    handle
        .set_len(len)
        .await
        .with_context(|| format!("Failed to truncate {}", file.display()))
}

/// Write `bytes` at the end of `handle` and sync, or cut the file back to its prior length.
async fn append_or_rollback(handle: &mut tokio::fs::File, bytes: &[u8]) -> Result<()> {
    let len = handle.metadata().await.context("Failed to stat store file")?.len();
    let written = async {
        handle.write_all(bytes).await?;
        // tokio reports a failed background write on flush, not on sync.
        handle.flush().await?;
        handle.sync_data().await
    }
    .await;

    if let Err(e) = written {
        if let Err(rollback) = handle.set_len(len).await {
            tracing::error!(error = %rollback, "Failed to roll back partial store append");
        }
        return Err(e).context("Failed to append to store file");
    }
    Ok(())
}

fn parse_entries(raw: &str) -> Vec<IndexEntry> {
    let mut entries = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<IndexEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!(line = line_no + 1, error = %e, "Skipping corrupt store entry");
            }
        }
    }
    entries
}

#[async_trait]
impl VectorStore for FlatFileStore {
    async fn append(&self, entries: Vec<IndexEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        if let Some(file) = &self.file {
            let mut buf = String::new();
            for entry in &entries {
                buf.push_str(&serde_json::to_string(entry).context("Failed to serialize entry")?);
                buf.push('\n');
            }

            let mut handle = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .await
                .with_context(|| format!("Failed to open {}", file.display()))?;
            append_or_rollback(&mut handle, buf.as_bytes())
                .await
                .with_context(|| format!("Failed to append to {}", file.display()))?;
        }

        self.entries.write().extend(entries);
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let entries = self.entries.read();
        let mut scored: Vec<(usize, f32)> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: entries[i].chunk.clone(),
                score,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }
}
