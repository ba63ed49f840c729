//! Google Gemini `generateContent` backend (no streaming)

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::config::HttpSettings;
use crate::error::BackendError;
use crate::http::{self, RetryConfig};
use crate::message::{ChatMessage, ChatRequest, ChatResponse, Role, ToolCall, Usage};
use crate::model::ChatBackend;

const PROVIDER: &str = "gemini";

#[derive(Debug, Clone)]
pub struct GeminiBackend {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    retry: RetryConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

/// Gemini wants function responses wrapped in an object
fn response_payload(content: &str) -> Value {
    match serde_json::from_str::<Value>(content) {
        Ok(value @ Value::Object(_)) => value,
        _ => json!({ "result": content }),
    }
}

fn contents(messages: &[ChatMessage]) -> Vec<Value> {
    let mut contents: Vec<Value> = Vec::new();
    let mut pending_responses: Vec<Value> = Vec::new();

    let flush = |pending: &mut Vec<Value>, contents: &mut Vec<Value>| {
        if !pending.is_empty() {
            contents.push(json!({ "role": "user", "parts": std::mem::take(pending) }));
        }
    };

    for message in messages {
        match message.role {
            Role::System => {}
            Role::Tool => pending_responses.push(json!({
                "functionResponse": {
                    "name": message.name.clone().unwrap_or_default(),
                    "response": response_payload(&message.content),
                }
            })),
            Role::User => {
                flush(&mut pending_responses, &mut contents);
                contents.push(json!({ "role": "user", "parts": [{ "text": message.content }] }));
            }
            Role::Assistant => {
                flush(&mut pending_responses, &mut contents);
                let mut parts = Vec::new();
                if !message.content.is_empty() {
                    parts.push(json!({ "text": message.content }));
                }
                for call in &message.tool_calls {
                    parts.push(json!({ "functionCall": { "name": call.name, "args": call.arguments } }));
                }
                if !parts.is_empty() {
                    contents.push(json!({ "role": "model", "parts": parts }));
                }
            }
        }
    }
    flush(&mut pending_responses, &mut contents);
    contents
}

fn request_body(request: &ChatRequest) -> Value {
    let mut body = json!({ "contents": contents(&request.messages) });

    if let Some(system) = request.system_prompt() {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }

    if !request.tools.is_empty() {
        let declarations: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })
            })
            .collect();
        body["tools"] = json!([{ "functionDeclarations": declarations }]);
    }

    body
}

fn parse_response(payload: GenerateResponse) -> Result<ChatResponse> {
    let candidate = payload
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::decode(PROVIDER, "response has no candidates"))?;

    let mut response = ChatResponse {
        usage: payload.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
        }),
        ..Default::default()
    };

    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(text) = part.text {
            response.content.push_str(&text);
        }
        if let Some(call) = part.function_call {
            response.tool_calls.push(ToolCall {
                id: uuid::Uuid::new_v4().to_string(),
                name: call.name,
                arguments: call.args,
            });
        }
    }

    Ok(response)
}

impl GeminiBackend {
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
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    fn provider(&self) -> &str {
        PROVIDER
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );
        let body = request_body(request);

        let resp = http::send_with_retry(PROVIDER, &self.retry, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .await?;

        let payload: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::decode(PROVIDER, e))?;
        let response = parse_response(payload)?;
        debug!(
            content_len = response.content.len(),
            tool_calls = response.tool_calls.len(),
            "Gemini response received"
        );
        Ok(response)
    }
}
