use anyhow::Context;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::chunker::TextChunker;
use super::parser::DocumentLoader;
use crate::config::ChunkingConfig;
use crate::error::{BlogError, Result};
use crate::types::{Chunk, DocumentFormat};

/// Turns uploaded bytes into chunks ready for the vector index.
pub struct DocumentIngestor {
    scratch_dir: PathBuf,
    chunker: TextChunker,
}

impl DocumentIngestor {
    pub fn new(scratch_dir: impl Into<PathBuf>, chunking: &ChunkingConfig) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            chunker: TextChunker::new(chunking.chunk_size, chunking.chunk_overlap),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Parse and chunk one uploaded file.
    ///
    /// The bytes are spooled to a temp file in the scratch directory for the
    /// loaders; the file is removed when this returns, on success or failure.
    pub fn ingest(&self, file_name: &str, bytes: &[u8]) -> Result<Vec<Chunk>> {
        let format = DocumentFormat::from_file_name(file_name)?;
        let loader = DocumentLoader::for_format(format);

        let docs = self
            .spool(format, bytes)
            .and_then(|temp| loader.load(temp.path(), file_name))
            .map_err(|source| BlogError::IngestionFailure {
                file: file_name.to_string(),
                source,
            })?;

        let chunks: Vec<Chunk> = docs
            .iter()
            .flat_map(|doc| self.chunker.chunk_document(doc))
            .collect();

        tracing::info!(
            file = file_name,
            format = ?format,
            documents = docs.len(),
            chunks = chunks.len(),
            "Ingested file"
        );

        Ok(chunks)
    }

    fn spool(
        &self,
        format: DocumentFormat,
        bytes: &[u8],
    ) -> anyhow::Result<tempfile::NamedTempFile> {
        std::fs::create_dir_all(&self.scratch_dir).with_context(|| {
            format!(
                "Failed to create scratch directory: {}",
                self.scratch_dir.display()
            )
        })?;

        let suffix = format!(".{}", format.extension());
        let mut temp = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(&self.scratch_dir)
            .context("Failed to create temp file")?;
        temp.write_all(bytes).context("Failed to write temp file")?;
        temp.flush().context("Failed to flush temp file")?;
        Ok(temp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingestor(dir: &Path) -> DocumentIngestor {
        DocumentIngestor::new(dir.join("scratch"), &ChunkingConfig::default())
    }

    fn scratch_is_empty(ing: &DocumentIngestor) -> bool {
        std::fs::read_dir(ing.scratch_dir())
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }

    #[test]
    fn test_ingest_txt_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let ing = ingestor(dir.path());

        let text = "a".repeat(2500);
        let chunks = ing.ingest("notes.txt", text.as_bytes()).unwrap();

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.source == "notes.txt"));
        assert!(ing.scratch_dir().exists());
        assert!(scratch_is_empty(&ing));
    }

    #[test]
    fn test_unsupported_format_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ing = ingestor(dir.path());

        let err = ing.ingest("photo.png", b"\x89PNG").unwrap_err();
        assert!(matches!(err, BlogError::UnsupportedFormat(_)));
        assert!(!ing.scratch_dir().exists());
    }

    #[test]
    fn test_parse_failure_cleans_up_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let ing = ingestor(dir.path());

        let err = ing.ingest("broken.docx", b"definitely not a zip").unwrap_err();
        match err {
            BlogError::IngestionFailure { file, .. } => assert_eq!(file, "broken.docx"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(scratch_is_empty(&ing));
    }

    #[test]
    fn test_ingest_pdf_keeps_page_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let ing = ingestor(dir.path());

        let pdf = crate::testing::pdf_with_pages(&["Intro to Rust", "Lifetimes"]);
        let chunks = ing.ingest("book.pdf", &pdf).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "Lifetimes");
        assert_eq!(chunks[1].metadata.get("page").map(String::as_str), Some("2"));
        assert!(scratch_is_empty(&ing));
    }

    #[test]
    fn test_corrupt_pdf_cleans_up_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let ing = ingestor(dir.path());

        let err = ing.ingest("corrupt.pdf", b"%PDF-1.4 truncated").unwrap_err();
        match err {
            BlogError::IngestionFailure { file, .. } => assert_eq!(file, "corrupt.pdf"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(ing.scratch_dir().exists());
        assert!(scratch_is_empty(&ing));
    }

    #[test]
    fn test_textless_pdf_is_an_ingestion_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ing = ingestor(dir.path());

        let pdf = crate::testing::pdf_with_pages(&[""]);
        let err = ing.ingest("blank.pdf", &pdf).unwrap_err();
        assert!(matches!(err, BlogError::IngestionFailure { .. }));
        assert!(scratch_is_empty(&ing));
    }

    #[test]
    fn test_invalid_utf8_txt_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ing = ingestor(dir.path());

        let err = ing.ingest("bad.txt", &[0xff, 0xfe, 0x00, 0xc3]).unwrap_err();
        assert!(matches!(err, BlogError::IngestionFailure { .. }));
        assert!(scratch_is_empty(&ing));
    }

    #[test]
    fn test_empty_txt_yields_no_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let ing = ingestor(dir.path());
        assert!(ing.ingest("empty.txt", b"").unwrap().is_empty());
    }

    #[test]
    fn test_csv_rows_become_separate_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let ing = ingestor(dir.path());

        let chunks = ing
            .ingest("topics.CSV", b"topic,notes\nRust,ownership\nGo,goroutines\n")
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "topic: Go\nnotes: goroutines");
        assert_ne!(chunks[0].doc_id, chunks[1].doc_id);
    }
}
