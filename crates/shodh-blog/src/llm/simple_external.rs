//! External chat-completion provider for OpenAI-compatible APIs and Anthropic

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{
    ApiProvider, ChatMessage, ChatResponse, ChatRole, GenerationConfig, LLMProvider,
    ProviderInfo, ToolCall, ToolSchema,
};
use crate::config::LlmConfig;

/// External API provider
pub struct SimpleExternalProvider {
    provider: ApiProvider,
    api_key: String,
    model: String,
    client: Client,
}

impl SimpleExternalProvider {
    /// Parse a response body as JSON, returning a clear error if the server returned HTML
    /// (e.g. a gateway error page) instead of valid JSON.
    async fn parse_json_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &str,
    ) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response body from {}: {}", endpoint, e))?;

        // CDNs and proxies sometimes answer 200 with an HTML page.
        let trimmed = body.trim_start();
        if trimmed.starts_with('<') {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(anyhow!(
                "Endpoint {} returned HTML instead of JSON (HTTP {}). Response: {}",
                endpoint,
                status,
                preview
            ));
        }

        serde_json::from_str::<T>(&body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            anyhow!(
                "Failed to parse JSON from {} (HTTP {}): {}. Response body: {}",
                endpoint,
                status,
                e,
                preview
            )
        })
    }

    pub fn new(provider: ApiProvider, api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .timeout(std::time::Duration::from_secs(300))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()?;

        tracing::info!(
            provider = ?provider,
            model = %model,
            "Creating SimpleExternalProvider (connect_timeout=15s)"
        );

        Ok(Self {
            provider,
            api_key,
            model,
            client,
        })
    }

    /// Build a provider from config, reading the key from the configured env var.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        let api_key = match api_key {
            Some(key) => key,
            None if config.provider.requires_api_key() => {
                return Err(anyhow!(
                    "{} API key not set (expected in ${})",
                    config.provider.name(),
                    config.api_key_env
                ));
            }
            None => String::new(),
        };
        Self::new(config.provider.clone(), api_key, config.model.clone())
    }

    fn get_endpoint(&self) -> String {
        match &self.provider {
            ApiProvider::Groq => "https://api.groq.com/openai/v1/chat/completions".to_string(),
            ApiProvider::OpenAI => "https://api.openai.com/v1/chat/completions".to_string(),
            ApiProvider::Anthropic => "https://api.anthropic.com/v1/messages".to_string(),
            ApiProvider::OpenRouter => "https://openrouter.ai/api/v1/chat/completions".to_string(),
            ApiProvider::Together => "https://api.together.xyz/v1/chat/completions".to_string(),
            ApiProvider::Ollama => "http://localhost:11434/v1/chat/completions".to_string(),
            ApiProvider::Custom { endpoint } => endpoint.clone(),
        }
    }
}

#[async_trait]
impl LLMProvider for SimpleExternalProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        config: &GenerationConfig,
    ) -> Result<ChatResponse> {
        match &self.provider {
            ApiProvider::Anthropic => self.anthropic_chat(messages, tools, config).await,
            _ => self.openai_chat(messages, tools, config).await,
        }
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.provider.name().to_string(),
            model: self.model.clone(),
        }
    }
}

impl SimpleExternalProvider {
    // ==================== OpenAI-compatible ====================

    fn format_openai_messages(messages: &[ChatMessage]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|m| json!({ "role": m.role, "content": m.content }))
            .collect()
    }

    fn format_openai_tools(tools: &[ToolSchema]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": wire_tool_name(&t.name),
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }

    fn parse_openai_choice(body: &serde_json::Value, tools: &[ToolSchema]) -> ChatResponse {
        let choice = &body["choices"][0]["message"];

        if let Some(tool_calls) = choice["tool_calls"].as_array() {
            let calls: Vec<ToolCall> = tool_calls
                .iter()
                .filter_map(|tc| {
                    Some(ToolCall {
                        id: tc["id"].as_str()?.to_string(),
                        name: restore_tool_name(tc["function"]["name"].as_str()?, tools),
                        arguments: tc["function"]["arguments"].as_str()?.to_string(),
                    })
                })
                .collect();
            if !calls.is_empty() {
                return ChatResponse::ToolCalls(calls);
            }
        }

        ChatResponse::Content(choice["content"].as_str().unwrap_or("").to_string())
    }

    async fn openai_chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        config: &GenerationConfig,
    ) -> Result<ChatResponse> {
        let mut request = json!({
            "model": self.model,
            "messages": Self::format_openai_messages(messages),
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
            "top_p": config.top_p,
            "stream": false
        });

        if !config.stop_sequences.is_empty() {
            request["stop"] = json!(config.stop_sequences);
        }
        if !tools.is_empty() {
            request["tools"] = json!(Self::format_openai_tools(tools));
            request["tool_choice"] = json!("auto");
        }

        let endpoint = self.get_endpoint();
        let mut builder = self.client.post(&endpoint).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow!("Chat request to {} timed out", endpoint)
            } else if e.is_connect() {
                anyhow!("Failed to connect to {}: {}", endpoint, e)
            } else {
                anyhow!("Chat request to {} failed: {}", endpoint, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await?;
            return Err(anyhow!("Chat API error ({}): {}", status, error));
        }

        let body: serde_json::Value = Self::parse_json_response(response, &endpoint).await?;
        Ok(Self::parse_openai_choice(&body, tools))
    }

    // ==================== Anthropic ====================

    fn format_anthropic_messages(
        messages: &[ChatMessage],
    ) -> (Option<String>, Vec<serde_json::Value>) {
        let mut system_prompt = None;
        let mut api_messages = Vec::new();

        for m in messages {
            match m.role {
                ChatRole::System => system_prompt = Some(m.content.clone()),
                ChatRole::User => {
                    api_messages.push(json!({ "role": "user", "content": m.content }));
                }
            }
        }
        (system_prompt, api_messages)
    }

    fn format_anthropic_tools(tools: &[ToolSchema]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": wire_tool_name(&t.name),
                    "description": t.description,
                    "input_schema": t.parameters,
                })
            })
            .collect()
    }

    fn parse_anthropic_content(body: &serde_json::Value, tools: &[ToolSchema]) -> ChatResponse {
        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();

        if let Some(content) = body["content"].as_array() {
            for block in content {
                match block["type"].as_str() {
                    Some("text") => {
                        if let Some(text) = block["text"].as_str() {
                            text_parts.push(text.to_string());
                        }
                    }
                    Some("tool_use") => {
                        if let (Some(id), Some(name)) =
                            (block["id"].as_str(), block["name"].as_str())
                        {
                            let args = serde_json::to_string(&block["input"])
                                .unwrap_or_else(|_| "{}".to_string());
                            tool_calls.push(ToolCall {
                                id: id.to_string(),
                                name: restore_tool_name(name, tools),
                                arguments: args,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }

        if !tool_calls.is_empty() {
            ChatResponse::ToolCalls(tool_calls)
        } else {
            ChatResponse::Content(text_parts.join(""))
        }
    }

    async fn anthropic_chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        config: &GenerationConfig,
    ) -> Result<ChatResponse> {
        let (system_prompt, api_messages) = Self::format_anthropic_messages(messages);

        let mut request = json!({
            "model": self.model,
            "messages": api_messages,
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
            "top_p": config.top_p
        });

        if let Some(ref sys) = system_prompt {
            request["system"] = json!(sys);
        }
        if !config.stop_sequences.is_empty() {
            request["stop_sequences"] = json!(config.stop_sequences);
        }
        if !tools.is_empty() {
            request["tools"] = json!(Self::format_anthropic_tools(tools));
        }

        let endpoint = self.get_endpoint();
        let response = self
            .client
            .post(&endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Anthropic request to {} failed: {}", endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await?;
            return Err(anyhow!("Anthropic chat error ({}): {}", status, error));
        }

        let body: serde_json::Value = Self::parse_json_response(response, &endpoint).await?;
        Ok(Self::parse_anthropic_content(&body, tools))
    }
}

/// Function names must match `^[a-zA-Z0-9_-]+$` on both APIs.
fn wire_tool_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Map a name the API echoed back to the registered tool it was derived from.
fn restore_tool_name(wire: &str, tools: &[ToolSchema]) -> String {
    tools
        .iter()
        .find(|t| wire_tool_name(&t.name) == wire)
        .map(|t| t.name.clone())
        .unwrap_or_else(|| wire.to_string())
}
