//! ReAct Agent Loop
//!
//! Renders the agent prompt with the scratchpad, asks the model for the next
//! step, runs the requested tool, and repeats until the model gives a final
//! answer or the iteration cap is reached. Every model call is one iteration;
//! tool and parse failures are fed back as observations instead of aborting.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use super::tools::{ToolInput, ToolRegistry, ToolResult};
use crate::error::{BlogError, Result};
use crate::llm::{ChatResponse, GenerationConfig, LLMProvider};
use crate::prompts::{self, TemplateKind};

pub const ITERATION_LIMIT_MESSAGE: &str = "Agent stopped due to iteration limit.";
const BOTH_ACTION_AND_ANSWER: &str = "Parsing LLM output produced both a final answer and a parse-able action";

static FINAL_ANSWER_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?s)Final Answer\s*:\s*(.*)").expect("final answer regex is valid")
});
static ACTION_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?s)Action\s*\d*\s*:[ \t]*(.*?)\s*Action\s*\d*\s*Input\s*\d*\s*:[ \t]*(.*)")
        .expect("action regex is valid")
});
static ACTION_ONLY_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"Action\s*\d*\s*:").expect("action-only regex is valid")
});

/// What the model asked for on one step.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    ToolCall { tool: String, input: String },
    FinalAnswer(String),
    ParseError { reason: String, text: String },
}

/// Interpret one model reply.
pub fn parse_decision(response: ChatResponse) -> Decision {
    match response {
        ChatResponse::ToolCalls(calls) => match calls.into_iter().next() {
            Some(call) => Decision::ToolCall {
                tool: call.name,
                input: call.arguments,
            },
            None => Decision::ParseError {
                reason: "Empty tool call list".to_string(),
                text: String::new(),
            },
        },
        ChatResponse::Content(text) => parse_text(&text),
    }
}

/// Parse a ReAct-formatted text reply.
///
/// A reply carrying both an action and a final answer is rejected, so a model
/// that invents its own observation cannot end the run unresearched.
pub fn parse_text(text: &str) -> Decision {
    let final_answer = FINAL_ANSWER_RE.captures(text);

    if let Some(cap) = ACTION_RE.captures(text) {
        if final_answer.is_some() {
            return Decision::ParseError {
                reason: BOTH_ACTION_AND_ANSWER.to_string(),
                text: text.trim().to_string(),
            };
        }
        let tool = cap[1].trim().to_string();
        let mut input = cap[2].to_string();
        if let Some(pos) = input.find("\nObservation") {
            input.truncate(pos);
        }
        if !tool.is_empty() {
            return Decision::ToolCall {
                tool,
                input: input.trim().to_string(),
            };
        }
    }

    if let Some(cap) = final_answer {
        return Decision::FinalAnswer(cap[1].trim().to_string());
    }

    let reason = if ACTION_ONLY_RE.is_match(text) {
        "Missing 'Action Input:' after 'Action:'"
    } else {
        "Missing 'Action:' after 'Thought:'"
    };
    Decision::ParseError {
        reason: reason.to_string(),
        text: text.trim().to_string(),
    }
}

/// One step the agent took, kept for the next prompt and for the caller.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScratchpadEntry {
    /// Tool name, `None` for a reply that could not be parsed.
    pub tool: Option<String>,
    pub input: String,
    pub observation: String,
}

/// A single tool invocation record for observability.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub result: String,
    pub success: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Termination {
    FinalAnswer,
    IterationLimit,
}

/// The final output of an agent run.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Never empty.
    pub output: String,
    pub termination: Termination,
    /// Model calls made.
    pub iterations: usize,
    pub scratchpad: Vec<ScratchpadEntry>,
    pub tool_invocations: Vec<ToolInvocation>,
}

enum AgentState {
    Thinking,
    Acting { tool: String, input: String },
    Finished { termination: Termination, output: String },
}

pub struct ReactAgent {
    llm: Arc<dyn LLMProvider>,
    registry: ToolRegistry,
    template: TemplateKind,
    config: GenerationConfig,
    max_iterations: usize,
}

impl ReactAgent {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        registry: ToolRegistry,
        template: TemplateKind,
        mut config: GenerationConfig,
        max_iterations: usize,
    ) -> Self {
        if !config.stop_sequences.iter().any(|s| s == "\nObservation") {
            config.stop_sequences.push("\nObservation".to_string());
        }
        Self {
            llm,
            registry,
            template,
            config,
            max_iterations: max_iterations.max(1),
        }
    }

    pub async fn run(&self, topic: &str) -> Result<AgentOutcome> {
        let mut scratchpad: Vec<ScratchpadEntry> = Vec::new();
        let mut invocations: Vec<ToolInvocation> = Vec::new();
        let mut last_text: Option<String> = None;
        let mut iterations = 0;
        let mut state = AgentState::Thinking;

        loop {
            state = match state {
                AgentState::Thinking if iterations >= self.max_iterations => {
                    tracing::warn!(
                        max = self.max_iterations,
                        "Agent hit max iterations, returning partial result"
                    );
                    AgentState::Finished {
                        termination: Termination::IterationLimit,
                        output: partial_output(&invocations, last_text.as_deref()),
                    }
                }
                AgentState::Thinking => {
                    iterations += 1;
                    tracing::debug!(iteration = iterations, "Agent thinking");

                    let prompt = prompts::render(self.template, &self.variables(topic, &scratchpad))?;
                    let response = self
                        .llm
                        .chat(&prompt.messages, &self.registry.schemas(), &self.config)
                        .await
                        .map_err(BlogError::ModelCallFailure)?;

                    match parse_decision(response) {
                        Decision::FinalAnswer(answer) if !answer.is_empty() => AgentState::Finished {
                            termination: Termination::FinalAnswer,
                            output: answer,
                        },
                        Decision::FinalAnswer(_) => {
                            scratchpad.push(ScratchpadEntry {
                                tool: None,
                                input: String::new(),
                                observation: "Invalid Format: Empty 'Final Answer:'".to_string(),
                            });
                            AgentState::Thinking
                        }
                        Decision::ToolCall { tool, input } => AgentState::Acting { tool, input },
                        Decision::ParseError { reason, text } => {
                            tracing::debug!(reason = %reason, "Agent reply did not parse");
                            if !text.is_empty() {
                                last_text = Some(text.clone());
                            }
                            scratchpad.push(ScratchpadEntry {
                                tool: None,
                                input: text,
                                observation: format!("Invalid Format: {}", reason),
                            });
                            AgentState::Thinking
                        }
                    }
                }
                AgentState::Acting { tool, input } => {
                    let tool_input = ToolInput::from_raw(&tool, &input);
                    let started = Instant::now();
                    let result = ToolResult::from(self.registry.execute(&tool, &tool_input).await);
                    let duration_ms = started.elapsed().as_millis() as u64;

                    if result.success {
                        tracing::debug!(tool = %tool, duration_ms, "Agent observed");
                    } else {
                        tracing::warn!(tool = %tool, error = %result.output, "Tool call failed");
                    }

                    invocations.push(ToolInvocation {
                        tool_name: tool.clone(),
                        arguments: tool_input.parameters,
                        result: result.output.clone(),
                        success: result.success,
                        duration_ms,
                    });
                    scratchpad.push(ScratchpadEntry {
                        tool: Some(tool),
                        input,
                        observation: result.output,
                    });
                    AgentState::Thinking
                }
                AgentState::Finished {
                    termination,
                    output,
                } => {
                    tracing::info!(
                        iterations,
                        tools_called = invocations.len(),
                        termination = ?termination,
                        "Agent finished"
                    );
                    return Ok(AgentOutcome {
                        output,
                        termination,
                        iterations,
                        scratchpad,
                        tool_invocations: invocations,
                    });
                }
            };
        }
    }

    fn variables(&self, topic: &str, scratchpad: &[ScratchpadEntry]) -> HashMap<&'static str, String> {
        HashMap::from([
            ("topic", topic.to_string()),
            ("tools", self.registry.describe()),
            ("tool_names", self.registry.names()),
            ("agent_scratchpad", format_scratchpad(scratchpad)),
        ])
    }
}

/// Render steps as ReAct text so the next prompt continues the trace.
pub fn format_scratchpad(entries: &[ScratchpadEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        match &entry.tool {
            Some(tool) => {
                out.push_str(&format!("Action: {}\nAction Input: {}\n", tool, entry.input));
            }
            None if !entry.input.is_empty() => {
                out.push_str(&entry.input);
                out.push('\n');
            }
            None => {}
        }
        out.push_str(&format!("Observation: {}\nThought: ", entry.observation));
    }
    out
}

/// Best text available when the cap is reached.
fn partial_output(invocations: &[ToolInvocation], last_text: Option<&str>) -> String {
    invocations
        .iter()
        .rev()
        .map(|i| i.result.as_str())
        .find(|r| !r.trim().is_empty())
        .or(last_text.filter(|t| !t.trim().is_empty()))
        .unwrap_or(ITERATION_LIMIT_MESSAGE)
        .to_string()
}
