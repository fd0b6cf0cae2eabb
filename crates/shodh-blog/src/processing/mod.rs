pub mod chunker;
pub mod ingest;
pub mod parser;

pub use chunker::{ChunkResult, TextChunker};
pub use ingest::DocumentIngestor;
pub use parser::DocumentLoader;
