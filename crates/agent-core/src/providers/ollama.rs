//! Ollama API client

use anyhow::{Context, Result};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::HttpSettings;
use crate::error::BackendError;
use crate::http::{self, RetryConfig};
use crate::message::{ChatChunk, ChatMessage, ChatRequest, ChatResponse, Role, ToolCall, Usage};
use crate::model::{ChatBackend, ChatStream};

const PROVIDER: &str = "ollama";

/// Locally installed model, as listed by `/api/tags`
#[derive(Debug, Clone, Deserialize)]
pub struct LocalModel {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: String,
}

impl LocalModel {
    /// Get human-readable size
    pub fn size_human(&self) -> String {
        let gb = self.size as f64 / (1024.0 * 1024.0 * 1024.0);
        format!("{:.1} GB", gb)
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<LocalModel>,
}

#[derive(Debug, Default, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// One line of `/api/chat` output (the whole body when not streaming)
#[derive(Debug, Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: WireMessage,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

impl ChatLine {
    fn usage(&self) -> Option<Usage> {
        if self.prompt_eval_count.is_none() && self.eval_count.is_none() {
            return None;
        }
        Some(Usage {
            prompt_tokens: self.prompt_eval_count.unwrap_or(0),
            completion_tokens: self.eval_count.unwrap_or(0),
        })
    }

    fn tool_calls(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.message.tool_calls)
            .into_iter()
            .map(|c| ToolCall {
                id: uuid::Uuid::new_v4().to_string(),
                name: c.function.name,
                arguments: c.function.arguments,
            })
            .collect()
    }
}

fn wire_message(message: &ChatMessage) -> Value {
    match message.role {
        Role::Assistant if !message.tool_calls.is_empty() => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|c| json!({ "function": { "name": c.name, "arguments": c.arguments } }))
                .collect();
            json!({ "role": "assistant", "content": message.content, "tool_calls": calls })
        }
        Role::Tool => json!({
            "role": "tool",
            "content": message.content,
            "tool_name": message.name.clone().unwrap_or_default(),
        }),
        role => json!({ "role": role.as_str(), "content": message.content }),
    }
}

fn request_body(request: &ChatRequest, stream: bool) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": request.messages.iter().map(wire_message).collect::<Vec<_>>(),
        "stream": stream,
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
    body
}

fn parse_line(line: &str) -> Result<ChatLine> {
    let parsed: ChatLine =
        serde_json::from_str(line).map_err(|e| BackendError::decode(PROVIDER, e))?;
    if let Some(error) = &parsed.error {
        anyhow::bail!("Ollama error: {}", error);
    }
    Ok(parsed)
}

/// Turn an NDJSON body into chat chunks
fn ndjson_chunks(response: reqwest::Response) -> impl Stream<Item = Result<ChatChunk>> {
    try_stream! {
        let mut lines = Box::pin(http::lines(response.bytes_stream()));
        let mut tool_calls = Vec::new();
        let mut finished = false;

        while let Some(line) = lines.next().await {
            let mut parsed = parse_line(&line?)?;
            tool_calls.extend(parsed.tool_calls());

            if parsed.done {
                finished = true;
                yield ChatChunk {
                    usage: parsed.usage(),
                    content: parsed.message.content,
                    tool_calls: std::mem::take(&mut tool_calls),
                    done: true,
                };
                break;
            }
            if !parsed.message.content.is_empty() {
                yield ChatChunk {
                    content: parsed.message.content,
                    ..Default::default()
                };
            }
        }

        if !finished {
            yield ChatChunk {
                tool_calls,
                done: true,
                ..Default::default()
            };
        }
    }
}

/// Ollama API client
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    base_url: String,
    client: reqwest::Client,
    retry: RetryConfig,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>, http_settings: &HttpSettings) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http::build_client(http_settings.timeout())?,
            retry: http_settings.retry(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Check if Ollama is running
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);

        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// List all available models
    pub async fn list_models(&self) -> Result<Vec<LocalModel>> {
        let url = format!("{}/api/tags", self.base_url);

        let resp: TagsResponse = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to connect to Ollama")?
            .error_for_status()
            .context("Ollama rejected the models request")?
            .json()
            .await
            .context("Failed to parse models response")?;

        Ok(resp.models)
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/api/chat", self.base_url);
        http::send_with_retry(PROVIDER, &self.retry, || self.client.post(&url).json(body)).await
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn provider(&self) -> &str {
        PROVIDER
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let resp = self.send(&request_body(request, false)).await?;
        let text = resp.text().await.context("Failed to read Ollama response")?;
        let mut parsed = parse_line(&text)?;

        let response = ChatResponse {
            usage: parsed.usage(),
            tool_calls: parsed.tool_calls(),
            content: parsed.message.content,
        };
        debug!(
            content_len = response.content.len(),
            tool_calls = response.tool_calls.len(),
            "Chat response received"
        );
        Ok(response)
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream> {
        let resp = self.send(&request_body(request, true)).await?;
        Ok(Box::pin(ndjson_chunks(resp)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> OllamaBackend {
        OllamaBackend::new(server.uri(), &HttpSettings::default())
            .unwrap()
            .with_retry(RetryConfig::none())
    }

    fn request() -> ChatRequest {
        ChatRequest::new("qwen3:8b", vec![ChatMessage::user("Hi")])
    }

    #[test]
    fn test_tool_message_carries_tool_name() {
        let call = ToolCall {
            id: "x".to_string(),
            name: "lookup_company_name".to_string(),
            arguments: json!({}),
        };
        let value = wire_message(&ChatMessage::tool_result(&call, "Nexxia"));
        assert_eq!(value["tool_name"], json!("lookup_company_name"));
        assert_eq!(value["role"], json!("tool"));
    }

    #[tokio::test]
    async fn test_chat_reads_tool_calls_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{"function": {"name": "lookup_company_name", "arguments": {"company_number": "150"}}}]
                },
                "done": true,
                "prompt_eval_count": 40,
                "eval_count": 8
            })))
            .mount(&server)
            .await;

        let response = backend(&server).chat(&request()).await.unwrap();
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].arguments["company_number"], json!("150"));
        assert_eq!(
            response.usage,
            Some(Usage {
                prompt_tokens: 40,
                completion_tokens: 8
            })
        );
    }

    #[tokio::test]
    async fn test_chat_stream_reads_ndjson() {
        let server = MockServer::start().await;
        let body = concat!(
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"lo\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true,\"eval_count\":2}\n"
        );
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&server)
            .await;

        let stream = backend(&server).chat_stream(&request()).await.unwrap();
        let chunks: Vec<ChatChunk> = stream.map(|c| c.unwrap()).collect().await;

        let text: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(text, "Hello");
        assert!(chunks.last().unwrap().done);
        assert_eq!(chunks.last().unwrap().usage.unwrap().completion_tokens, 2);
    }

    #[tokio::test]
    async fn test_error_line_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "model not found"})),
            )
            .mount(&server)
            .await;

        let err = backend(&server).chat(&request()).await.unwrap_err();
        assert!(err.to_string().contains("model not found"));
    }

    #[tokio::test]
    async fn test_list_models_and_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{"name": "qwen3:8b", "size": 5368709120u64, "modified_at": "2024-01-01"}]
            })))
            .mount(&server)
            .await;

        let client = backend(&server);
        assert!(client.health_check().await);
        let models = client.list_models().await.unwrap();
        assert_eq!(models[0].name, "qwen3:8b");
        assert_eq!(models[0].size_human(), "5.0 GB");
    }
}
