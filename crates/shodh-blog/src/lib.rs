//! Blog generation with retrieval-augmented context and a bounded tool-using agent.

pub mod agent;
pub mod chain;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod knowledge;
pub mod llm;
pub mod processing;
pub mod prompts;
pub mod retriever;
pub mod service;
pub mod storage;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience
pub use config::BlogConfig;
pub use error::{BlogError, Result};
pub use service::{BlogOutcome, BlogService, PipelineMode};
pub use types::{Chunk, Document, DocumentFormat, ScoredChunk};

// Re-export LLM types
pub use llm::{ApiProvider, GenerationConfig, LLMProvider, ProviderInfo, SimpleExternalProvider};
