//! Agent Tools - the fixed set of tools the blog agent may call

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::chain::GenerationChain;
use crate::error::{BlogError, Result};
use crate::knowledge::KnowledgeSource;
use crate::llm::ToolSchema;
use crate::prompts::TemplateKind;
use crate::retriever::Retriever;

/// Input for a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    /// Tool display name
    pub tool_id: String,

    /// Parameters for the tool
    pub parameters: serde_json::Value,
}

impl ToolInput {
    /// Accept either a JSON object (native tool calls) or the free text a
    /// ReAct `Action Input:` line carries.
    pub fn from_raw(tool_id: &str, raw: &str) -> Self {
        let trimmed = raw.trim();
        let parameters = match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(value @ serde_json::Value::Object(_)) => value,
            Ok(serde_json::Value::String(s)) => json!({ "input": s }),
            _ => json!({ "input": strip_quotes(trimmed) }),
        };
        Self {
            tool_id: tool_id.to_string(),
            parameters,
        }
    }

    fn text(&self, key: &str) -> Option<String> {
        self.parameters
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// `topic`, or the free-text `input` when the model sent plain text.
    pub fn topic(&self) -> Result<String> {
        self.text("topic")
            .or_else(|| self.text("query"))
            .or_else(|| self.text("input"))
            .ok_or_else(|| BlogError::Tool {
                tool: self.tool_id.clone(),
                message: "missing 'topic'".to_string(),
            })
    }

    /// `(topic, language)` from `{topic, language}` or text `"topic, language"`.
    pub fn topic_and_language(&self) -> Result<(String, String)> {
        if let (Some(topic), Some(language)) = (self.text("topic"), self.text("language")) {
            return Ok((topic, language));
        }
        let raw = self.text("input").unwrap_or_default();
        match raw.rsplit_once(',') {
            Some((topic, language)) if !topic.trim().is_empty() && !language.trim().is_empty() => {
                Ok((
                    strip_quotes(topic.trim()).to_string(),
                    strip_quotes(language.trim()).to_string(),
                ))
            }
            _ => Err(BlogError::Tool {
                tool: self.tool_id.clone(),
                message: "expected 'topic, language' or {\"topic\", \"language\"}".to_string(),
            }),
        }
    }
}

fn strip_quotes(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

/// Result from tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether execution was successful
    pub success: bool,

    /// Output text, or the error message when `success` is false
    pub output: String,
}

impl From<Result<String>> for ToolResult {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(output) => Self {
                success: true,
                output,
            },
            Err(e) => Self {
                success: false,
                output: e.to_string(),
            },
        }
    }
}

/// The closed set of tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    CodeGenerator,
    RagRetriever,
    KnowledgeLookup,
    BlogGenerator,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::CodeGenerator,
        ToolKind::RagRetriever,
        ToolKind::KnowledgeLookup,
        ToolKind::BlogGenerator,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::CodeGenerator => "Code Generator",
            Self::RagRetriever => "RAG Retriever",
            Self::KnowledgeLookup => "Wikipedia Search",
            Self::BlogGenerator => "Blog Generator",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::CodeGenerator => {
                "Generates a code snippet based on a given topic and programming language."
            }
            Self::RagRetriever => {
                "Retrieves relevant documents for a given topic using a vector store."
            }
            Self::KnowledgeLookup => {
                "Fetches relevant information from Wikipedia based on a given topic."
            }
            Self::BlogGenerator => {
                "Generates a blog post using Wikipedia summaries and RAG-retrieved documents."
            }
        }
    }

    /// Parameter schema (JSON Schema format)
    pub fn parameters_schema(&self) -> serde_json::Value {
        match self {
            Self::CodeGenerator => json!({
                "type": "object",
                "properties": {
                    "topic": { "type": "string", "description": "What the code should do" },
                    "language": { "type": "string", "description": "Programming language" }
                },
                "required": ["topic", "language"]
            }),
            _ => json!({
                "type": "object",
                "properties": {
                    "topic": { "type": "string", "description": "Blog topic" }
                },
                "required": ["topic"]
            }),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = strip_quotes(name.trim());
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }

    pub fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Collaborators every tool executor draws on.
pub struct ToolContext {
    pub retriever: Arc<Retriever>,
    pub knowledge: Arc<dyn KnowledgeSource>,
    pub chain: Arc<GenerationChain>,
}

impl ToolContext {
    pub async fn execute(&self, kind: ToolKind, input: &ToolInput) -> Result<String> {
        match kind {
            ToolKind::CodeGenerator => {
                let (topic, language) = input.topic_and_language()?;
                self.generate_code(&topic, &language).await
            }
            ToolKind::RagRetriever => self.retriever.retrieve(&input.topic()?).await,
            ToolKind::KnowledgeLookup => self.lookup(&input.topic()?).await,
            ToolKind::BlogGenerator => self.compose_blog(&input.topic()?).await,
        }
    }

    pub async fn generate_code(&self, topic: &str, language: &str) -> Result<String> {
        let vars = HashMap::from([
            ("topic", topic.to_string()),
            ("language", language.to_string()),
        ]);
        self.chain.run(TemplateKind::Code, &vars).await
    }

    pub async fn lookup(&self, topic: &str) -> Result<String> {
        self.knowledge
            .lookup(topic)
            .await
            .map_err(BlogError::LookupUnavailable)
    }

    async fn compose_blog(&self, topic: &str) -> Result<String> {
        let summary = self.lookup(topic).await?;
        let rag = self.retriever.retrieve(topic).await?;
        Ok(compose_blog(topic, &summary, &rag))
    }
}

/// Plain string composition of an encyclopedia summary and retrieved context.
pub fn compose_blog(topic: &str, summary: &str, rag: &str) -> String {
    format!(
        "### {topic}\n\n\
         #### Wikipedia Summary:\n{summary}\n\n\
         #### Additional Insights from RAG:\n{rag}\n\n\
         This blog combines structured knowledge from Wikipedia and relevant documents retrieved using RAG."
    )
}

/// Tools available to one agent run. Membership is fixed at construction.
pub struct ToolRegistry {
    tools: Vec<ToolKind>,
    context: Arc<ToolContext>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<ToolKind>, context: Arc<ToolContext>) -> Self {
        Self { tools, context }
    }

    /// Registry for the plain agent: knowledge lookup only.
    pub fn plain(context: Arc<ToolContext>) -> Self {
        Self::new(vec![ToolKind::KnowledgeLookup], context)
    }

    /// Registry for the RAG agent: composite blog generator plus knowledge lookup.
    pub fn rag(context: Arc<ToolContext>) -> Self {
        Self::new(vec![ToolKind::BlogGenerator, ToolKind::KnowledgeLookup], context)
    }

    pub fn get(&self, name: &str) -> Option<ToolKind> {
        ToolKind::from_name(name).filter(|k| self.tools.contains(k))
    }

    pub fn names(&self) -> String {
        self.tools
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// One `name: description` line per tool, for the `{tools}` placeholder.
    pub fn describe(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("{}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    /// Resolve `name` in this registry and run it.
    pub async fn execute(&self, name: &str, input: &ToolInput) -> Result<String> {
        let kind = self.get(name).ok_or_else(|| BlogError::UnknownTool {
            name: name.to_string(),
            available: self.names(),
        })?;
        self.context.execute(kind, input).await
    }
}
