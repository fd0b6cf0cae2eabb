//! Blog Service
//!
//! Entry point for the user-facing surface. Owns the vector index and every
//! component built on top of it, and picks one of the four pipelines from the
//! `rag`/`agent` toggles.

use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::{ReactAgent, Termination, ToolContext, ToolInput, ToolKind, ToolRegistry};
use crate::chain::GenerationChain;
use crate::config::BlogConfig;
use crate::embeddings::EmbeddingModel;
use crate::error::{BlogError, Result};
use crate::index::VectorIndex;
use crate::knowledge::{KnowledgeSource, WikipediaClient};
use crate::llm::{GenerationConfig, LLMProvider};
use crate::processing::DocumentIngestor;
use crate::prompts::TemplateKind;
use crate::retriever::Retriever;
use crate::storage::VectorStore;

/// Which pipeline `generate` runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineMode {
    pub rag: bool,
    pub agent: bool,
}

impl PipelineMode {
    pub fn label(&self) -> &'static str {
        match (self.rag, self.agent) {
            (false, false) => "chain",
            (true, false) => "rag-chain",
            (false, true) => "agent",
            (true, true) => "rag-agent",
        }
    }
}

/// Generated text, marked partial when the agent ran out of iterations.
#[derive(Debug, Clone, PartialEq)]
pub enum BlogOutcome {
    Complete(String),
    Partial { text: String, iterations: usize },
}

impl BlogOutcome {
    pub fn text(&self) -> &str {
        match self {
            BlogOutcome::Complete(text) => text,
            BlogOutcome::Partial { text, .. } => text,
        }
    }
}

pub struct BlogService {
    config: BlogConfig,
    llm: Arc<dyn LLMProvider>,
    index: Arc<VectorIndex>,
    chain: Arc<GenerationChain>,
    tools: Arc<ToolContext>,
    ingestor: DocumentIngestor,
}

impl BlogService {
    /// Open the persisted index under `config.data_dir` and wire up the
    /// pipelines against the encyclopedia configured in `config.knowledge`.
    pub async fn open(
        config: BlogConfig,
        llm: Arc<dyn LLMProvider>,
        embeddings: Arc<dyn EmbeddingModel>,
    ) -> Result<Self> {
        let knowledge: Arc<dyn KnowledgeSource> = Arc::new(
            WikipediaClient::new(config.knowledge.clone()).map_err(|e| BlogError::Config(format!("{:#}", e)))?,
        );
        Self::open_with_knowledge(config, llm, embeddings, knowledge).await
    }

    pub async fn open_with_knowledge(
        config: BlogConfig,
        llm: Arc<dyn LLMProvider>,
        embeddings: Arc<dyn EmbeddingModel>,
        knowledge: Arc<dyn KnowledgeSource>,
    ) -> Result<Self> {
        config.validate()?;

        let store = open_store(&config, embeddings.dimension()).await?;
        let index = Arc::new(VectorIndex::new(embeddings, store));
        let chunks = index.len().await?;

        let retriever = Arc::new(Retriever::new(index.clone(), config.search.default_k));
        let chain = Arc::new(GenerationChain::new(
            llm.clone(),
            GenerationConfig::from(&config.llm),
        ));
        let tools = Arc::new(ToolContext {
            retriever,
            knowledge,
            chain: chain.clone(),
        });
        let ingestor = DocumentIngestor::new(config.scratch_dir.clone(), &config.chunking);

        tracing::info!(
            data_dir = %config.data_dir.display(),
            chunks,
            provider = %llm.info().name,
            model = %llm.info().model,
            "Blog service ready"
        );

        Ok(Self {
            config,
            llm,
            index,
            chain,
            tools,
            ingestor,
        })
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub async fn generate(&self, topic: &str, mode: PipelineMode) -> Result<BlogOutcome> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(BlogError::InvalidInput("topic must not be empty".into()));
        }
        tracing::info!(topic, mode = mode.label(), "Generating blog");

        if mode.agent {
            return self.run_agent(topic, mode.rag).await;
        }

        let text = if mode.rag {
            let context = self.tools.retriever.retrieve(topic).await?;
            let vars = HashMap::from([("topic", topic.to_string()), ("context", context)]);
            self.chain.run(TemplateKind::RagBlog, &vars).await?
        } else {
            let vars = HashMap::from([("topic", topic.to_string())]);
            self.chain.run(TemplateKind::Blog, &vars).await?
        };
        Ok(BlogOutcome::Complete(text))
    }

    async fn run_agent(&self, topic: &str, rag: bool) -> Result<BlogOutcome> {
        let (registry, template) = if rag {
            (ToolRegistry::rag(self.tools.clone()), TemplateKind::RagAgent)
        } else {
            (ToolRegistry::plain(self.tools.clone()), TemplateKind::Agent)
        };
        let agent = ReactAgent::new(
            self.llm.clone(),
            registry,
            template,
            GenerationConfig::from(&self.config.llm),
            self.config.agent.max_iterations,
        );

        let outcome = agent.run(topic).await?;
        Ok(match outcome.termination {
            Termination::FinalAnswer => BlogOutcome::Complete(outcome.output),
            Termination::IterationLimit => BlogOutcome::Partial {
                text: outcome.output,
                iterations: outcome.iterations,
            },
        })
    }

    /// Parse, chunk and index one uploaded file. Returns the number of chunks stored.
    pub async fn ingest_file(&self, file_name: &str, bytes: &[u8]) -> Result<usize> {
        let chunks = self.ingestor.ingest(file_name, bytes)?;
        let stored = self.index.add(chunks).await?;
        tracing::info!(file = file_name, chunks = stored, "Indexed file");
        Ok(stored)
    }

    pub async fn generate_code(&self, topic: &str, language: &str) -> Result<String> {
        let input = ToolInput {
            tool_id: ToolKind::CodeGenerator.name().to_string(),
            parameters: serde_json::json!({ "topic": topic, "language": language }),
        };
        self.tools.execute(ToolKind::CodeGenerator, &input).await
    }

    pub async fn retrieve_docs(&self, topic: &str) -> Result<String> {
        self.tools
            .execute(ToolKind::RagRetriever, &ToolInput::from_raw(ToolKind::RagRetriever.name(), topic))
            .await
    }
}

#[cfg(not(feature = "lancedb"))]
async fn open_store(config: &BlogConfig, _dimension: usize) -> Result<Arc<dyn VectorStore>> {
    let store = crate::storage::FlatFileStore::open(&config.data_dir)
        .await
        .map_err(BlogError::Storage)?;
    Ok(Arc::new(store))
}

#[cfg(feature = "lancedb")]
async fn open_store(config: &BlogConfig, dimension: usize) -> Result<Arc<dyn VectorStore>> {
    let store = crate::storage::LanceStore::open(&config.data_dir, dimension)
        .await
        .map_err(BlogError::Storage)?;
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbeddings;
    use crate::llm::ChatResponse;
    use crate::testing::{ScriptedProvider, StaticKnowledge, UnreachableKnowledge};

    fn test_config(dir: &std::path::Path) -> BlogConfig {
        BlogConfig {
            data_dir: dir.join("blog_chroma_db"),
            scratch_dir: dir.join("blog_temp_files"),
            ..BlogConfig::default()
        }
    }

    async fn service(
        dir: &std::path::Path,
        llm: Arc<ScriptedProvider>,
        knowledge: Arc<dyn KnowledgeSource>,
    ) -> BlogService {
        BlogService::open_with_knowledge(
            test_config(dir),
            llm,
            Arc::new(HashingEmbeddings::new(128)),
            knowledge,
        )
        .await
        .unwrap()
    }

    fn article(topic: &str) -> String {
        format!("{topic} notes. ").repeat(150)
    }

    #[tokio::test]
    async fn test_plain_mode_single_call() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedProvider::new(vec![ScriptedProvider::text(
            "# Quantum Computing\n\nQubits.",
        )]));
        let svc = service(dir.path(), llm.clone(), Arc::new(StaticKnowledge("x".into()))).await;

        let out = svc
            .generate("Quantum Computing", PipelineMode::default())
            .await
            .unwrap();
        assert_eq!(out, BlogOutcome::Complete("# Quantum Computing\n\nQubits.".into()));
        assert_eq!(llm.call_count(), 1);
        let call = &llm.calls()[0];
        assert!(call.tool_names.is_empty());
        assert_eq!(
            call.messages[1].content,
            "Generate a blog post on Quantum Computing."
        );
    }

    #[tokio::test]
    async fn test_empty_topic_rejected_before_model_call() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedProvider::new(vec![]));
        let svc = service(dir.path(), llm.clone(), Arc::new(StaticKnowledge("x".into()))).await;

        let err = svc
            .generate("   ", PipelineMode { rag: true, agent: true })
            .await
            .unwrap_err();
        assert!(matches!(err, BlogError::InvalidInput(_)));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_rag_mode_puts_context_in_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedProvider::new(vec![ScriptedProvider::text("blog")]));
        let svc = service(dir.path(), llm.clone(), Arc::new(StaticKnowledge("x".into()))).await;

        let stored = svc
            .ingest_file("notes.txt", "Rust ownership rules keep memory safe.".as_bytes())
            .await
            .unwrap();
        assert_eq!(stored, 1);

        svc.generate("Rust", PipelineMode { rag: true, agent: false })
            .await
            .unwrap();
        let user = llm.calls()[0].messages[1].content.clone();
        assert_eq!(
            user,
            "Generate a blog on Rust, using the following context: Rust ownership rules keep memory safe.."
        );
    }

    #[tokio::test]
    async fn test_rag_mode_with_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedProvider::new(vec![ScriptedProvider::text("blog")]));
        let svc = service(dir.path(), llm.clone(), Arc::new(StaticKnowledge("x".into()))).await;

        let out = svc
            .generate("AI", PipelineMode { rag: true, agent: false })
            .await
            .unwrap();
        assert_eq!(out.text(), "blog");
        let user = llm.calls()[0].messages[1].content.clone();
        assert_eq!(user, "Generate a blog on AI, using the following context: .");
    }

    #[tokio::test]
    async fn test_agent_mode_complete() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::tool_call("Wikipedia Search", r#"{"topic":"Rust"}"#),
            ScriptedProvider::text("Final Answer: # Rust\nSafe and fast."),
        ]));
        let svc = service(dir.path(), llm.clone(), Arc::new(StaticKnowledge("Page: Rust".into()))).await;

        let out = svc
            .generate("Rust", PipelineMode { rag: false, agent: true })
            .await
            .unwrap();
        assert_eq!(out, BlogOutcome::Complete("# Rust\nSafe and fast.".into()));
        assert_eq!(llm.calls()[0].tool_names, vec!["Wikipedia Search"]);
    }

    #[tokio::test]
    async fn test_rag_agent_partial_when_lookup_is_down() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedProvider::repeating(ChatResponse::Content(
            "Action: Blog Generator\nAction Input: Rust".into(),
        )));
        let svc = service(dir.path(), llm.clone(), Arc::new(UnreachableKnowledge)).await;

        let out = svc
            .generate("Rust", PipelineMode { rag: true, agent: true })
            .await
            .unwrap();
        match out {
            BlogOutcome::Partial { text, iterations } => {
                assert_eq!(iterations, 3);
                assert!(!text.is_empty());
            }
            other => panic!("expected partial outcome, got {other:?}"),
        }
        assert_eq!(
            llm.calls()[0].tool_names,
            vec!["Blog Generator", "Wikipedia Search"]
        );
    }

    #[tokio::test]
    async fn test_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let llm = Arc::new(ScriptedProvider::new(vec![]));
            let svc = service(dir.path(), llm, Arc::new(StaticKnowledge("x".into()))).await;
            let stored = svc
                .ingest_file("article.txt", article("Rust").as_bytes())
                .await
                .unwrap();
            assert!(stored > 1);
        }

        let llm = Arc::new(ScriptedProvider::new(vec![]));
        let svc = service(dir.path(), llm, Arc::new(StaticKnowledge("x".into()))).await;
        assert!(!svc.index().is_empty().await.unwrap());
        let docs = svc.retrieve_docs("Rust").await.unwrap();
        assert!(docs.contains("Rust notes."));
    }

    #[tokio::test]
    async fn test_unsupported_upload_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedProvider::new(vec![]));
        let svc = service(dir.path(), llm, Arc::new(StaticKnowledge("x".into()))).await;

        let err = svc.ingest_file("slides.pptx", b"data").await.unwrap_err();
        assert!(matches!(err, BlogError::UnsupportedFormat(_)));
        assert!(svc.index().is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_generate_code_uses_code_template() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedProvider::new(vec![ScriptedProvider::text("fn main() {}")]));
        let svc = service(dir.path(), llm.clone(), Arc::new(StaticKnowledge("x".into()))).await;

        let code = svc.generate_code("hello world", "Rust").await.unwrap();
        assert_eq!(code, "fn main() {}");
        assert_eq!(
            llm.calls()[0].messages[1].content,
            "Write Rust code for: hello world"
        );
    }
}
