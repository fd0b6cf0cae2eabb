use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{BlogError, Result};
use crate::llm::{ChatResponse, GenerationConfig, LLMProvider};
use crate::prompts::{self, Prompt, TemplateKind};

/// Single-shot generation: prompt in, text out, no tools.
pub struct GenerationChain {
    llm: Arc<dyn LLMProvider>,
    config: GenerationConfig,
}

impl GenerationChain {
    pub fn new(llm: Arc<dyn LLMProvider>, config: GenerationConfig) -> Self {
        Self { llm, config }
    }

    pub async fn generate(&self, prompt: &Prompt) -> Result<String> {
        tracing::debug!(kind = ?prompt.kind, prompt = %prompt.text(), "Generation chain call");
        let response = self
            .llm
            .chat(&prompt.messages, &[], &self.config)
            .await
            .map_err(BlogError::ModelCallFailure)?;

        match response {
            ChatResponse::Content(text) => Ok(text),
            ChatResponse::ToolCalls(calls) => Err(BlogError::ModelCallFailure(anyhow::anyhow!(
                "Model requested {} tool call(s) but none were offered",
                calls.len()
            ))),
        }
    }

    /// Render `kind` with `variables` and generate.
    pub async fn run(&self, kind: TemplateKind, variables: &HashMap<&str, String>) -> Result<String> {
        let prompt = prompts::render(kind, variables)?;
        self.generate(&prompt).await
    }
}
