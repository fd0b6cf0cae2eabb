use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BlogError, Result};
use crate::llm::ApiProvider;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogConfig {
    /// Persisted vector-store directory, created on first run.
    pub data_dir: PathBuf,
    /// Scratch directory for uploaded files while they are parsed.
    pub scratch_dir: PathBuf,
    pub chunking: ChunkingConfig,
    pub search: SearchConfig,
    pub agent: AgentConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub knowledge: KnowledgeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_iterations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// Local feature-hashing embedder, no network.
    Hashing,
    /// OpenAI-compatible `/v1/embeddings` endpoint.
    Api,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub dimension: usize,
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub cache_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ApiProvider,
    pub model: String,
    /// Environment variable holding the provider API key.
    pub api_key_env: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub api_url: String,
    pub summary_url: String,
    pub top_k_results: usize,
    pub max_chars: usize,
    pub timeout_secs: u64,
}

impl BlogConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(BlogError::Config("chunking.chunk_size must be > 0".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(BlogError::Config(
                "chunking.chunk_overlap must be < chunk_size".into(),
            ));
        }
        if self.search.default_k == 0 {
            return Err(BlogError::Config("search.default_k must be > 0".into()));
        }
        if self.agent.max_iterations == 0 {
            return Err(BlogError::Config("agent.max_iterations must be > 0".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(BlogError::Config("embedding.dimension must be > 0".into()));
        }
        if self.knowledge.top_k_results == 0 {
            return Err(BlogError::Config(
                "knowledge.top_k_results must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BlogError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| BlogError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Conventional per-user config location (`<config_dir>/shodh-blog/config.json`).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shodh-blog")
            .join("config.json")
    }
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("blog_chroma_db"),
            scratch_dir: PathBuf::from("blog_temp_files"),
            chunking: ChunkingConfig::default(),
            search: SearchConfig::default(),
            agent: AgentConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            knowledge: KnowledgeConfig::default(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_k: 5 }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { max_iterations: 3 }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Hashing,
            dimension: 384,
            endpoint: "https://api.openai.com/v1/embeddings".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            cache_size: 1000,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ApiProvider::Groq,
            model: "llama-3.3-70b-versatile".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            top_p: 0.95,
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            api_url: "https://en.wikipedia.org/w/api.php".to_string(),
            summary_url: "https://en.wikipedia.org/api/rest_v1/page/summary".to_string(),
            top_k_results: 3,
            max_chars: 4000,
            timeout_secs: 20,
        }
    }
}
