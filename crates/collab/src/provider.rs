// SPDX-License-Identifier: MIT

//! The `Provider` trait (spec §6): one chat-completions call to an
//! LLM backend. `oddjobs` has no provider abstraction of its own (its
//! agents are opaque CLI subprocesses); the request/response/client split
//! below follows `siumai-core`'s shape (`ChatRequest`/`ChatMessage`, a
//! `tools`/`tool_choice` pair alongside the messages), the one example repo
//! in the pack that is itself an LLM-provider client library, collapsed to
//! the single OpenAI-compatible `/chat/completions` wire format this crate
//! actually needs rather than siumai's multi-vendor builder hierarchy.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ferretbot_context::{Message, Role};

use crate::tools::{ToolCall, ToolSchema};

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub message: Message,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub usage: Option<ProviderUsage>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelCapabilities {
    pub max_context_tokens: Option<u32>,
    pub supports_tools: bool,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to provider failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("provider returned an unexpected response shape: {0}")]
    UnexpectedResponse(String),
    #[error("provider rate-limited the request")]
    RateLimited,
}

#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat_completion(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;

    async fn count_tokens(&self, _text: &str) -> Option<usize> {
        None
    }

    async fn discover_model_capabilities(&self) -> Option<ModelCapabilities> {
        None
    }
}

// ---- OpenAI-compatible wire format (kept separate from the domain types
// above, the same "convert at the boundary" pattern `ferretbot-checks`
// already uses between `CheckResult` and `CheckResultRecord`) ----

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    r#type: &'static str,
    function: WireFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct WireToolCallFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireChatResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// `Provider` over an OpenAI-compatible `/chat/completions` endpoint.
pub struct HttpProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    /// Build from `FERRETBOT_PROVIDER_URL` / `FERRETBOT_PROVIDER_API_KEY`,
    /// returning `None` if no URL is configured.
    pub fn from_env() -> Option<Self> {
        let base_url = ferretbot_core::config::provider_url()?;
        Some(Self::new(base_url, ferretbot_core::config::provider_api_key()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| self.client.clone());
        self
    }
}

#[async_trait]
impl Provider for HttpProvider {
    async fn chat_completion(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let wire_request = WireChatRequest {
            model: &req.model,
            messages: req.messages.iter().map(|m| WireMessage { role: role_str(m.role), content: &m.content }).collect(),
            tools: req
                .tools
                .iter()
                .map(|t| WireTool {
                    r#type: "function",
                    function: WireFunction {
                        name: &t.name,
                        description: &t.description,
                        parameters: &t.parameters,
                    },
                })
                .collect(),
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .json(&wire_request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        let response = response.error_for_status()?;
        let body: WireChatResponse = response.json().await?;
        chat_response_from_wire(body)
    }
}

/// Map the OpenAI-compatible wire response onto the domain `ChatResponse`.
/// Split out from `chat_completion` so the mapping is exercised directly in
/// tests without a live HTTP call.
fn chat_response_from_wire(body: WireChatResponse) -> Result<ChatResponse, ProviderError> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::UnexpectedResponse("no choices in response".to_string()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|tc| {
            let arguments = serde_json::from_str(&tc.function.arguments).unwrap_or(serde_json::Value::Null);
            ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments,
            }
        })
        .collect::<Vec<_>>();

    let finish_reason = match choice.finish_reason.as_deref() {
        Some("tool_calls") => FinishReason::ToolCalls,
        Some("length") => FinishReason::Length,
        _ if !tool_calls.is_empty() => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    };

    Ok(ChatResponse {
        message: Message::assistant(choice.message.content.unwrap_or_default()),
        tool_calls,
        finish_reason,
        usage: body.usage.map(|u| ProviderUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        }),
    })
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
