use uuid::Uuid;

use crate::types::{Chunk, Document};

#[derive(Debug, Clone)]
pub struct ChunkResult {
    pub text: String,
    pub index: usize,
    /// Offsets are counted in chars, not bytes.
    pub start_offset: usize,
    pub end_offset: usize,
}

/// Fixed-window splitter. Consecutive windows share exactly `chunk_overlap` chars.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    /// `chunk_overlap` is clamped below `chunk_size` so the window always advances.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    pub fn chunk(&self, text: &str) -> Vec<ChunkResult> {
        // Byte offset of every char plus the end, so windows never split a char.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_len = boundaries.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut index = 0;

        while start < char_len {
            let end = (start + self.chunk_size).min(char_len);
            chunks.push(ChunkResult {
                text: text[boundaries[start]..boundaries[end]].to_string(),
                index,
                start_offset: start,
                end_offset: end,
            });
            index += 1;

            if end == char_len {
                break;
            }
            start += self.step();
        }

        chunks
    }

    /// Split a loaded document into chunks that inherit its source and metadata.
    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        self.chunk(&doc.content)
            .into_iter()
            .map(|c| Chunk {
                id: Uuid::new_v4(),
                doc_id: doc.id,
                text: c.text,
                source: doc.source.clone(),
                index: c.index,
                start_offset: c.start_offset,
                end_offset: c.end_offset,
                metadata: doc.metadata.clone(),
            })
            .collect()
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}
