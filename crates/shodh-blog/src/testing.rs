//! Scripted collaborators shared by unit tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::knowledge::KnowledgeSource;
use crate::llm::{ChatMessage, ChatResponse, GenerationConfig, LLMProvider, ProviderInfo, ToolCall, ToolSchema};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub tool_names: Vec<String>,
}

/// Replays canned responses in order and records every request.
///
/// Once the script runs out, `fallback` (if any) is returned for every
/// further call; otherwise the call fails.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ChatResponse>>>,
    fallback: Option<ChatResponse>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ChatResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(response: ChatResponse) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(response),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn text(text: &str) -> Result<ChatResponse> {
        Ok(ChatResponse::Content(text.to_string()))
    }

    pub fn tool_call(name: &str, arguments: &str) -> Result<ChatResponse> {
        Ok(ChatResponse::ToolCalls(vec![ToolCall {
            id: format!("call_{}", name.to_lowercase().replace(' ', "_")),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }]))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        _config: &GenerationConfig,
    ) -> Result<ChatResponse> {
        self.calls.lock().push(RecordedCall {
            messages: messages.to_vec(),
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
        });
        let next = self.script.lock().pop_front();
        match next {
            Some(response) => response,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| anyhow!("scripted provider exhausted")),
        }
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "Scripted".to_string(),
            model: "test".to_string(),
        }
    }
}

/// Knowledge source with a fixed answer.
pub struct StaticKnowledge(pub String);

#[async_trait]
impl KnowledgeSource for StaticKnowledge {
    async fn lookup(&self, _topic: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Knowledge source whose service is always unreachable.
pub struct UnreachableKnowledge;

#[async_trait]
impl KnowledgeSource for UnreachableKnowledge {
    async fn lookup(&self, _topic: &str) -> Result<String> {
        Err(anyhow!("connection refused"))
    }
}

/// A PDF with one page per entry; an empty string gives a page with no text.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let operations = if text.is_empty() {
            vec![]
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}
