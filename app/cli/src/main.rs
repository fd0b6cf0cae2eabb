//! shodh-blog CLI
//!
//! ## Usage
//!
//! ```bash
//! export GROQ_API_KEY=...
//! shodh-blog ingest notes.pdf data.csv
//! shodh-blog generate "Quantum Computing" --rag --agent
//! shodh-blog code "binary search" --language Rust
//! ```
//!
//! Set `RUST_LOG=debug` to follow each agent step.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use shodh_blog::{embeddings, BlogConfig, BlogOutcome, BlogService, PipelineMode, SimpleExternalProvider};

#[derive(Parser)]
#[command(name = "shodh-blog")]
#[command(version)]
#[command(about = "Generate blog posts with optional retrieval and a tool-using agent", long_about = None)]
struct Cli {
    /// Path to a JSON config file (defaults to the per-user config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a blog post on a topic
    Generate {
        topic: String,

        /// Ground the post in documents from the local index
        #[arg(long)]
        rag: bool,

        /// Let the agent research the topic with tools
        #[arg(long)]
        agent: bool,
    },

    /// Add files (.pdf, .txt, .csv, .docx) to the local index
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Generate code for a task
    Code {
        topic: String,

        #[arg(short, long, default_value = "Python")]
        language: String,
    },

    /// Print the indexed context retrieved for a topic
    Retrieve { topic: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let llm = Arc::new(
        SimpleExternalProvider::from_config(&config.llm).context("Failed to configure model provider")?,
    );
    let embedder = embeddings::from_config(&config.embedding).context("Failed to configure embeddings")?;
    let service = BlogService::open(config, llm, embedder).await?;

    match cli.command {
        Commands::Generate { topic, rag, agent } => {
            let outcome = service.generate(&topic, PipelineMode { rag, agent }).await?;
            if let BlogOutcome::Partial { iterations, .. } = &outcome {
                println!("[partial result: agent stopped after {} iterations]\n", iterations);
            }
            println!("{}", outcome.text());
        }
        Commands::Ingest { files } => {
            let mut total = 0;
            for path in &files {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .with_context(|| format!("Invalid file name: {}", path.display()))?;
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let stored = service.ingest_file(name, &bytes).await?;
                println!("{}: {} chunks", name, stored);
                total += stored;
            }
            println!("Indexed {} chunks from {} file(s)", total, files.len());
        }
        Commands::Code { topic, language } => {
            println!("{}", service.generate_code(&topic, &language).await?);
        }
        Commands::Retrieve { topic } => {
            let docs = service.retrieve_docs(&topic).await?;
            if docs.is_empty() {
                println!("No indexed documents matched.");
            } else {
                println!("{}", docs);
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<BlogConfig> {
    if let Some(path) = path {
        return Ok(BlogConfig::from_file(path)?);
    }
    let default = BlogConfig::default_path();
    if default.exists() {
        tracing::info!(path = %default.display(), "Loading config");
        Ok(BlogConfig::from_file(&default)?)
    } else {
        Ok(BlogConfig::default())
    }
}
