use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray, UInt64Array,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::path::Path;
use std::sync::Arc;

use super::VectorStore;
use crate::types::{Chunk, IndexEntry, ScoredChunk};

/// LanceDB-backed store for corpora too large to scan in memory.
pub struct LanceStore {
    db: lancedb::Connection,
    dimension: usize,
    table_name: String,
}

impl LanceStore {
    pub async fn open(path: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let uri = path.to_string_lossy().to_string();
        let db = lancedb::connect(&uri)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        let store = Self {
            db,
            dimension,
            table_name: "blog_chunks".to_string(),
        };

        store.ensure_table().await?;
        Ok(store)
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("doc_id", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt64, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("start_offset", DataType::UInt64, false),
            Field::new("end_offset", DataType::UInt64, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension as i32,
                ),
                true,
            ),
            Field::new("metadata_json", DataType::Utf8, false),
            Field::new("created_at", DataType::Int64, false),
        ]))
    }

    fn vector_array(&self, flat: Vec<f32>) -> FixedSizeListArray {
        FixedSizeListArray::new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.dimension as i32,
            Arc::new(Float32Array::from(flat)) as Arc<dyn Array>,
            None,
        )
    }

    async fn ensure_table(&self) -> Result<()> {
        let names = self.db.table_names().execute().await?;
        if names.contains(&self.table_name) {
            return Ok(());
        }

        self.db
            .create_empty_table(&self.table_name, self.schema())
            .execute()
            .await
            .context("Failed to create chunks table")?;
        Ok(())
    }

    fn to_batch(&self, entries: &[IndexEntry]) -> Result<RecordBatch> {
        let ids: Vec<String> = entries.iter().map(|e| e.chunk.id.to_string()).collect();
        let doc_ids: Vec<String> = entries.iter().map(|e| e.chunk.doc_id.to_string()).collect();
        let indices = widen(entries.iter().map(|e| e.chunk.index))?;
        let texts: Vec<&str> = entries.iter().map(|e| e.chunk.text.as_str()).collect();
        let sources: Vec<&str> = entries.iter().map(|e| e.chunk.source.as_str()).collect();
        let starts = widen(entries.iter().map(|e| e.chunk.start_offset))?;
        let ends = widen(entries.iter().map(|e| e.chunk.end_offset))?;
        let metadata: Vec<String> = entries
            .iter()
            .map(|e| serde_json::to_string(&e.chunk.metadata).unwrap_or_else(|_| "{}".into()))
            .collect();
        let created: Vec<i64> = entries.iter().map(|e| e.created_at).collect();
        let flat: Vec<f32> = entries.iter().flat_map(|e| e.vector.iter().copied()).collect();

        RecordBatch::try_new(
            self.schema(),
            vec![
                Arc::new(StringArray::from(ids)) as Arc<dyn Array>,
                Arc::new(StringArray::from(doc_ids)),
                Arc::new(UInt64Array::from(indices)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(sources)),
                Arc::new(UInt64Array::from(starts)),
                Arc::new(UInt64Array::from(ends)),
                Arc::new(self.vector_array(flat)) as Arc<dyn Array>,
                Arc::new(StringArray::from(metadata)),
                Arc::new(Int64Array::from(created)),
            ],
        )
        .context("Failed to create RecordBatch")
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn append(&self, entries: Vec<IndexEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != self.dimension) {
            anyhow::bail!(
                "Vector dimension {} does not match table dimension {}",
                bad.vector.len(),
                self.dimension
            );
        }

        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .context("Failed to open chunks table")?;

        let batch = self.to_batch(&entries)?;
        let reader = RecordBatchIterator::new(vec![Ok(batch)], self.schema());
        table
            .add(Box::new(reader))
            .execute()
            .await
            .context("Failed to insert chunks")?;

        tracing::debug!(count = entries.len(), "Inserted chunks into LanceDB");
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let table = self.db.open_table(&self.table_name).execute().await?;

        // Same contract as the flat store: every entry scores 0.0 against a
        // vector of the wrong length, so return the first k rows unranked.
        if query.len() != self.dimension {
            tracing::debug!(
                query_dimension = query.len(),
                table_dimension = self.dimension,
                "Query dimension mismatch, returning unranked rows"
            );
            let results = table
                .query()
                .limit(k)
                .execute()
                .await
                .context("LanceDB scan failed")?;
            let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;
            let mut hits = extract_hits(&batches);
            hits.truncate(k);
            return Ok(hits);
        }

        let results = table
            .query()
            .nearest_to(query)?
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .context("LanceDB vector search failed")?;

        let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;
        let mut hits = extract_hits(&batches);
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let table = self.db.open_table(&self.table_name).execute().await?;
        Ok(table.count_rows(None).await?)
    }
}

fn widen(values: impl Iterator<Item = usize>) -> Result<Vec<u64>> {
    values
        .map(|v| u64::try_from(v).context("Chunk offset does not fit in u64"))
        .collect()
}

fn extract_hits(batches: &[RecordBatch]) -> Vec<ScoredChunk> {
    let mut hits = Vec::new();
    for batch in batches {
        let strings = |name: &str| {
            batch
                .column_by_name(name)
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        };
        let positions = |name: &str| {
            batch
                .column_by_name(name)
                .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
        };

        let (Some(ids), Some(doc_ids), Some(texts), Some(sources)) =
            (strings("id"), strings("doc_id"), strings("text"), strings("source"))
        else {
            continue;
        };
        let metadata = strings("metadata_json");
        let indices = positions("chunk_index");
        let starts = positions("start_offset");
        let ends = positions("end_offset");
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

        for i in 0..batch.num_rows() {
            let (Ok(id), Ok(doc_id)) = (ids.value(i).parse(), doc_ids.value(i).parse()) else {
                tracing::warn!(id = ids.value(i), "Skipping LanceDB row with invalid id");
                continue;
            };
            let position = |col: Option<&UInt64Array>| {
                col.map(|c| usize::try_from(c.value(i))).transpose()
            };
            let (Ok(index), Ok(start_offset), Ok(end_offset)) =
                (position(indices), position(starts), position(ends))
            else {
                tracing::warn!(id = ids.value(i), "Skipping LanceDB row with out-of-range offsets");
                continue;
            };
            hits.push(ScoredChunk {
                chunk: Chunk {
                    id,
                    doc_id,
                    text: texts.value(i).to_string(),
                    source: sources.value(i).to_string(),
                    index: index.unwrap_or(0),
                    start_offset: start_offset.unwrap_or(0),
                    end_offset: end_offset.unwrap_or(0),
                    metadata: metadata
                        .and_then(|m| serde_json::from_str(m.value(i)).ok())
                        .unwrap_or_default(),
                },
                score: distances.map(|d| 1.0 - d.value(i)).unwrap_or(0.0),
            });
        }
    }
    hits
}
