//! Error types for the blog generation pipeline.

use thiserror::Error;

/// Errors surfaced by ingestion, retrieval, prompt assembly, and generation.
///
/// Agent-internal failures (`UnknownTool`, `LookupUnavailable`, tool errors)
/// are converted into observations by the agent loop and only reach a caller
/// when a tool is invoked directly.
#[derive(Debug, Error)]
pub enum BlogError {
    /// The file extension is not one of pdf, txt, csv, docx.
    #[error("Unsupported file format: '{0}' (expected .pdf, .txt, .csv or .docx)")]
    UnsupportedFormat(String),

    /// The file could not be parsed.
    #[error("Failed to ingest '{file}': {source:#}")]
    IngestionFailure {
        /// Name of the uploaded file.
        file: String,
        /// Underlying parse or I/O failure.
        #[source]
        source: anyhow::Error,
    },

    /// A template placeholder had no value.
    #[error("Missing template variable: {0}")]
    MissingVariable(String),

    /// The agent named a tool that is not registered for this run.
    #[error("{name} is not a valid tool, try one of [{available}]")]
    UnknownTool {
        /// Name the model asked for.
        name: String,
        /// Comma-separated names of the registered tools.
        available: String,
    },

    /// The external knowledge service could not be reached.
    #[error("Knowledge lookup unavailable: {0:#}")]
    LookupUnavailable(anyhow::Error),

    /// The model provider failed or is not configured.
    #[error("Model call failed: {0:#}")]
    ModelCallFailure(anyhow::Error),

    /// The embedding backend failed.
    #[error("Embedding error: {0:#}")]
    Embedding(anyhow::Error),

    /// The vector store failed to read or persist entries.
    #[error("Vector store error: {0:#}")]
    Storage(anyhow::Error),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller supplied an unusable argument.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A tool received arguments it could not use.
    #[error("Tool '{tool}' failed: {message}")]
    Tool {
        /// Tool display name.
        tool: String,
        /// What went wrong.
        message: String,
    },
}

/// Convenience result type for blog operations.
pub type Result<T> = std::result::Result<T, BlogError>;
