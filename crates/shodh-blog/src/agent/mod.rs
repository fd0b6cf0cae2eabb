//! Agent Framework - Tool-using blog writer
//!
//! This module provides the bounded reasoning loop behind the agent modes:
//! - ToolRegistry: the closed set of tools one agent run may call
//! - ReactAgent: Thought / Action / Observation loop over a registry
//!
//! Architecture:
//! - ToolKind: every tool the crate knows about (name, description, schema)
//! - ToolContext: shared collaborators tools run against (retriever, lookup, chain)
//! - AgentOutcome: final text plus how the run ended and what it called

mod react;
mod tools;

pub use react::{
    format_scratchpad, parse_decision, parse_text, AgentOutcome, Decision, ReactAgent,
    ScratchpadEntry, Termination, ToolInvocation, ITERATION_LIMIT_MESSAGE,
};
pub use tools::{compose_blog, ToolContext, ToolInput, ToolKind, ToolRegistry, ToolResult};
