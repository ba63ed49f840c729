//! OpenAI-compatible chat completions backend

use std::collections::BTreeMap;

use anyhow::Result;
use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::config::HttpSettings;
use crate::error::BackendError;
use crate::http::{self, RetryConfig};
use crate::message::{ChatChunk, ChatMessage, ChatRequest, ChatResponse, Role, ToolCall, Usage};
use crate::model::{ChatBackend, ChatStream};

const PROVIDER: &str = "openai";

/// Client for `/chat/completions` style APIs
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    retry: RetryConfig,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl From<WireUsage> for Usage {
    fn from(u: WireUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<DeltaToolCall>,
}

#[derive(Debug, Deserialize)]
struct DeltaToolCall {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<DeltaFunction>,
}

#[derive(Debug, Deserialize)]
struct DeltaFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Reassembles tool calls whose name and arguments arrive in fragments
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    calls: BTreeMap<usize, (String, String, String)>,
}

impl ToolCallAccumulator {
    fn push(&mut self, delta: DeltaToolCall) {
        let entry = self.calls.entry(delta.index).or_default();
        if let Some(id) = delta.id {
            entry.0 = id;
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name {
                entry.1.push_str(&name);
            }
            if let Some(args) = function.arguments {
                entry.2.push_str(&args);
            }
        }
    }

    fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_values()
            .filter(|(_, name, _)| !name.is_empty())
            .map(|(id, name, args)| to_tool_call(id, name, &args))
            .collect()
    }
}

fn to_tool_call(id: String, name: String, arguments: &str) -> ToolCall {
    let arguments = if arguments.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str(arguments).unwrap_or_else(|_| Value::String(arguments.to_string()))
    };
    ToolCall {
        id: if id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            id
        },
        name,
        arguments,
    }
}

fn wire_message(message: &ChatMessage) -> Value {
    match message.role {
        Role::Assistant if !message.tool_calls.is_empty() => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "type": "function",
                        "function": { "name": c.name, "arguments": c.arguments.to_string() },
                    })
                })
                .collect();
            let content = if message.content.is_empty() {
                Value::Null
            } else {
                Value::String(message.content.clone())
            };
            json!({ "role": "assistant", "content": content, "tool_calls": calls })
        }
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
            "content": message.content,
        }),
        role => json!({ "role": role.as_str(), "content": message.content }),
    }
}

fn request_body(request: &ChatRequest, stream: bool) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": request.messages.iter().map(wire_message).collect::<Vec<_>>(),
    });

    if !request.tools.is_empty() {
        body["tools"] = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    },
                })
            })
            .collect();
    }

    if stream {
        body["stream"] = json!(true);
        body["stream_options"] = json!({ "include_usage": true });
    }

    body
}

fn parse_response(payload: CompletionResponse) -> Result<ChatResponse> {
    let choice = payload
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::decode(PROVIDER, "response has no choices"))?;

    Ok(ChatResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls: choice
            .message
            .tool_calls
            .into_iter()
            .map(|c| to_tool_call(c.id, c.function.name, &c.function.arguments))
            .collect(),
        usage: payload.usage.map(Usage::from),
    })
}

/// Turn a server-sent-events body into chat chunks
fn sse_chunks(response: reqwest::Response) -> impl Stream<Item = Result<ChatChunk>> {
    try_stream! {
        let mut lines = Box::pin(http::lines(response.bytes_stream()));
        let mut calls = ToolCallAccumulator::default();
        let mut usage = None;

        while let Some(line) = lines.next().await {
            let line = line?;
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data == "[DONE]" {
                break;
            }
            if data.is_empty() {
                continue;
            }

            let event: StreamEvent = serde_json::from_str(data)
                .map_err(|e| BackendError::decode(PROVIDER, e))?;
            if let Some(u) = event.usage {
                usage = Some(Usage::from(u));
            }
            for choice in event.choices {
                for delta in choice.delta.tool_calls {
                    calls.push(delta);
                }
                if let Some(content) = choice.delta.content {
                    if !content.is_empty() {
                        yield ChatChunk { content, ..Default::default() };
                    }
                }
            }
        }

        yield ChatChunk {
            tool_calls: calls.finish(),
            done: true,
            usage,
            ..Default::default()
        };
    }
}

impl OpenAiBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        http_settings: &HttpSettings,
    ) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: http::build_client(http_settings.timeout())?,
            retry: http_settings.retry(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        http::send_with_retry(PROVIDER, &self.retry, || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
        })
        .await
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn provider(&self) -> &str {
        PROVIDER
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let body = request_body(request, false);
        let resp = self.send(&body).await?;
        let payload: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::decode(PROVIDER, e))?;
        let response = parse_response(payload)?;
        debug!(
            content_len = response.content.len(),
            tool_calls = response.tool_calls.len(),
            "Completion received"
        );
        Ok(response)
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream> {
        let body = request_body(request, true);
        let resp = self.send(&body).await?;
        Ok(Box::pin(sse_chunks(resp)))
    }
}
