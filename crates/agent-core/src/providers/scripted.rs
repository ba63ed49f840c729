//! Deterministic backend driven by a closure, for tests and offline runs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream;

use crate::message::{ChatChunk, ChatRequest, ChatResponse};
use crate::model::{ChatBackend, ChatStream, Model};

type Responder = dyn Fn(&ChatRequest) -> Result<ChatResponse> + Send + Sync;

/// A backend whose replies are computed from the request
#[derive(Clone)]
pub struct ScriptedBackend {
    responder: Arc<Responder>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ChatRequest) -> ChatResponse + Send + Sync + 'static,
    {
        Self::fallible(move |request| Ok(responder(request)))
    }

    pub fn fallible<F>(responder: F) -> Self
    where
        F: Fn(&ChatRequest) -> Result<ChatResponse> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always answer with the same text
    pub fn reply(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_| ChatResponse::text(text.clone()))
    }

    /// Number of requests served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn into_model(self, name: impl Into<String>) -> Model {
        Model::new(name, self)
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn provider(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.responder)(request)
    }

    /// Streams the reply one word at a time; tool calls arrive on the last chunk
    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream> {
        let response = self.chat(request).await?;

        let mut chunks: Vec<Result<ChatChunk>> = response
            .content
            .split_inclusive(' ')
            .map(|word| {
                Ok(ChatChunk {
                    content: word.to_string(),
                    ..Default::default()
                })
            })
            .collect();
        chunks.push(Ok(ChatChunk {
            tool_calls: response.tool_calls,
            done: true,
            usage: response.usage,
            ..Default::default()
        }));

        Ok(Box::pin(stream::iter(chunks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ChatMessage;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_stream_splits_words() {
        let backend = ScriptedBackend::reply("Paris is lovely");
        let request = ChatRequest::new("m", vec![ChatMessage::user("hi")]);

        let chunks: Vec<ChatChunk> = backend
            .chat_stream(&request)
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].content, "Paris ");
        assert!(chunks[3].done);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_fallible_propagates_error() {
        let backend = ScriptedBackend::fallible(|_| anyhow::bail!("offline"));
        let request = ChatRequest::new("m", vec![]);
        let err = backend.chat(&request).await.unwrap_err();
        assert_eq!(err.to_string(), "offline");
    }
}
