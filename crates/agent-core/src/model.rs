//! Model handles and the backend trait they wrap

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;

use crate::message::{ChatChunk, ChatRequest, ChatResponse};

/// Stream of response chunks; the last item has `done == true`
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatChunk>> + Send>>;

/// A chat-completion provider
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Short provider label used in logs ("openai", "ollama", ...)
    fn provider(&self) -> &str;

    /// Send a request and wait for the complete response
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Send a request and stream the response.
    ///
    /// Backends without streaming support fall back to one chunk.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream> {
        let response = self.chat(request).await?;
        let chunk = ChatChunk {
            content: response.content,
            tool_calls: response.tool_calls,
            done: true,
            usage: response.usage,
        };
        Ok(Box::pin(futures::stream::once(async move { Ok(chunk) })))
    }
}

/// A configured connection to one model on one backend
#[derive(Clone)]
pub struct Model {
    name: String,
    backend: Arc<dyn ChatBackend>,
}

impl Model {
    pub fn new(name: impl Into<String>, backend: impl ChatBackend + 'static) -> Self {
        Self::from_arc(name, Arc::new(backend))
    }

    /// Wrap a shared backend (lets callers keep a typed handle to it)
    pub fn from_arc(name: impl Into<String>, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }

    /// Model identifier as passed to the provider
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &str {
        self.backend.provider()
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.backend.chat(request).await
    }

    pub async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream> {
        self.backend.chat_stream(request).await
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("provider", &self.provider())
            .finish()
    }
}
