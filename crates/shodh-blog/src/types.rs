use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{BlogError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    PDF,
    TXT,
    CSV,
    DOCX,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::PDF),
            "txt" => Some(Self::TXT),
            "csv" => Some(Self::CSV),
            "docx" => Some(Self::DOCX),
            _ => None,
        }
    }

    /// Resolve the declared format of an uploaded file from its name alone.
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        std::path::Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| BlogError::UnsupportedFormat(file_name.to_string()))
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::PDF => "pdf",
            Self::TXT => "txt",
            Self::CSV => "csv",
            Self::DOCX => "docx",
        }
    }
}

/// Loaded source content. One file may produce several documents (PDF pages, CSV rows).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub content: String,
    pub source: String,
    pub format: DocumentFormat,
    /// 1-based page for PDFs, 0-based data row for CSVs.
    pub position: Option<usize>,
    pub metadata: HashMap<String, String>,
    pub loaded_at: DateTime<Utc>,
}

impl Document {
    pub fn new(content: String, source: &str, format: DocumentFormat) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            source: source.to_string(),
            format,
            position: None,
            metadata: HashMap::new(),
            loaded_at: Utc::now(),
        }
    }

    pub fn with_position(mut self, key: &str, position: usize) -> Self {
        self.position = Some(position);
        self.metadata.insert(key.to_string(), position.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: Uuid,
    pub doc_id: Uuid,
    pub text: String,
    pub source: String,
    pub index: usize,
    /// Char (not byte) offsets into the parent document.
    pub start_offset: usize,
    pub end_offset: usize,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Persisted (chunk, vector) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
    pub created_at: i64,
}
