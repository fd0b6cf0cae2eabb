//! Prompt templates for blog, agent, and code generation.
//!
//! Placeholders are `{name}` and are substituted in a single pass, so values
//! that themselves contain braces are inserted verbatim.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::{BlogError, Result};
use crate::llm::{ChatMessage, ChatRole};

static PLACEHOLDER_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex is valid")
});

const BLOG_SYSTEM: &str = "\
I am your dedicated blog generator assistant, here to help you craft insightful, well-structured, and captivating blog posts tailored to any topic you provide.
My expertise is strictly focused on creating blogs, so I will only assist in writing detailed, engaging, and high-quality blog content based on your chosen subject.

I use my understanding of the topic to make the blog informative and relevant to its audience, in whatever tone suits it: casual, professional, or thought-provoking.

Every post should be clear, well structured, and enjoyable to read.

If you try to ask for anything beyond a blog, I will kindly remind you: \"I'm sorry, I can only generate blogs. Please provide a topic, and I'll create a blog post for you.\"

I cannot assist with tasks unrelated to blog creation.";

const BLOG_USER: &str = "Generate a blog post on {topic}.";

const RAG_BLOG_USER: &str = "Generate a blog on {topic}, using the following context: {context}.";

const REACT_FORMAT: &str = "\
Tools: {tools}
Tool names: {tool_names}

Use the following format:

Thought: think about what to do next
Action: the action to take, one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (Thought/Action/Action Input/Observation can repeat)
Thought: I now know the final answer
Final Answer: the complete blog post

Current scratchpad: {agent_scratchpad}";

const AGENT_INTRO: &str = "You are a blog generator agent. Write a blog on {topic} using the available tools.";

const RAG_AGENT_INTRO: &str = "You are a blog generator agent. Use the RAG retriever tool first, then write the blog on {topic}.";

const AGENT_RULES: &str = "\
You are a blog generator assistant, specialized in creating blog posts based on a given topic.
Write a well-structured, informative, and engaging blog on the given topic.
You will not perform any other tasks except blog generation.

If you request anything other than a blog post, I will respond with: \"I'm sorry, I can only generate blogs. Please provide a topic for a blog post.\"";

const CODE_SYSTEM: &str = "\
You are an expert programmer. Reply with one complete, idiomatic, well-commented code snippet in the requested language and nothing else.";

const CODE_USER: &str = "Write {language} code for: {topic}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Blog,
    RagBlog,
    Agent,
    RagAgent,
    Code,
}

/// Rendered, model-ready chat turns.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub kind: TemplateKind,
    pub messages: Vec<ChatMessage>,
}

impl Prompt {
    /// All turns concatenated; handy for logging and assertions.
    pub fn text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl TemplateKind {
    fn turns(&self) -> Vec<(ChatRole, String)> {
        match self {
            Self::Blog => vec![
                (ChatRole::System, BLOG_SYSTEM.to_string()),
                (ChatRole::User, BLOG_USER.to_string()),
            ],
            Self::RagBlog => vec![
                (ChatRole::System, BLOG_SYSTEM.to_string()),
                (ChatRole::User, RAG_BLOG_USER.to_string()),
            ],
            Self::Agent => vec![(
                ChatRole::User,
                format!("{AGENT_INTRO}\n\n{AGENT_RULES}\n\n{REACT_FORMAT}"),
            )],
            Self::RagAgent => vec![(
                ChatRole::User,
                format!("{RAG_AGENT_INTRO}\n\n{AGENT_RULES}\n\n{REACT_FORMAT}"),
            )],
            Self::Code => vec![
                (ChatRole::System, CODE_SYSTEM.to_string()),
                (ChatRole::User, CODE_USER.to_string()),
            ],
        }
    }

    /// Placeholder names the template expects, in first-appearance order.
    pub fn variables(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (_, text) in self.turns() {
            for cap in PLACEHOLDER_RE.captures_iter(&text) {
                let name = cap[1].to_string();
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

/// Render `kind` with `variables`. Unused variables are ignored.
pub fn render(kind: TemplateKind, variables: &HashMap<&str, String>) -> Result<Prompt> {
    let messages = kind
        .turns()
        .into_iter()
        .map(|(role, text)| {
            Ok(ChatMessage {
                role,
                content: substitute(&text, variables)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Prompt { kind, messages })
}

fn substitute(template: &str, variables: &HashMap<&str, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for cap in PLACEHOLDER_RE.captures_iter(template) {
        let whole = cap.get(0).map(|m| m.range()).unwrap_or(0..0);
        let name = &cap[1];
        let value = variables
            .get(name)
            .ok_or_else(|| BlogError::MissingVariable(name.to_string()))?;
        out.push_str(&template[last..whole.start]);
        out.push_str(value);
        last = whole.end;
    }
    out.push_str(&template[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_blog_prompt() {
        let prompt = render(TemplateKind::Blog, &vars(&[("topic", "Quantum Computing")])).unwrap();
        assert_eq!(prompt.messages.len(), 2);
        assert_eq!(prompt.messages[0].role, ChatRole::System);
        assert!(prompt.messages[0]
            .content
            .contains("I'm sorry, I can only generate blogs. Please provide a topic, and I'll create a blog post for you."));
        assert_eq!(
            prompt.messages[1].content,
            "Generate a blog post on Quantum Computing."
        );
    }

    #[test]
    fn test_rag_blog_prompt() {
        let prompt = render(
            TemplateKind::RagBlog,
            &vars(&[("topic", "Rust"), ("context", "ownership notes")]),
        )
        .unwrap();
        assert_eq!(
            prompt.messages[1].content,
            "Generate a blog on Rust, using the following context: ownership notes."
        );
    }

    #[test]
    fn test_missing_variable() {
        let err = render(TemplateKind::RagBlog, &vars(&[("topic", "Rust")])).unwrap_err();
        assert!(matches!(err, BlogError::MissingVariable(name) if name == "context"));
    }

    #[test]
    fn test_extra_variables_ignored() {
        let prompt = render(
            TemplateKind::Blog,
            &vars(&[("topic", "Rust"), ("context", "unused")]),
        )
        .unwrap();
        assert!(!prompt.text().contains("unused"));
    }

    #[test]
    fn test_substitution_is_single_pass() {
        let prompt = render(
            TemplateKind::RagBlog,
            &vars(&[("topic", "{context}"), ("context", "{topic}")]),
        )
        .unwrap();
        assert_eq!(
            prompt.messages[1].content,
            "Generate a blog on {context}, using the following context: {topic}."
        );
    }

    #[test]
    fn test_agent_templates() {
        assert_eq!(
            TemplateKind::Agent.variables(),
            vec!["topic", "tools", "tool_names", "agent_scratchpad"]
        );
        let prompt = render(
            TemplateKind::RagAgent,
            &vars(&[
                ("topic", "Rust"),
                ("tools", "Blog Generator: writes blogs"),
                ("tool_names", "Blog Generator, Wikipedia Search"),
                ("agent_scratchpad", ""),
            ]),
        )
        .unwrap();
        assert_eq!(prompt.messages.len(), 1);
        let text = prompt.text();
        assert!(text.starts_with("You are a blog generator agent. Use the RAG retriever tool first"));
        assert!(text.contains("one of [Blog Generator, Wikipedia Search]"));
        assert!(text.contains("Please provide a topic for a blog post."));
    }

    #[test]
    fn test_code_template_variables() {
        assert_eq!(TemplateKind::Code.variables(), vec!["language", "topic"]);
    }
}
