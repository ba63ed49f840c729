//! Shared HTTP plumbing for the chat backends

use std::time::Duration;

use anyhow::{Context, Result};
use async_stream::try_stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::error::BackendError;

/// Retry policy for transient provider failures (429, 5xx, connection errors)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Delay before the first retry; grows linearly with each attempt
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryConfig {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff * (attempt + 1)
    }
}

/// Build a client with the given request timeout
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}

fn is_transient(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Send a request, retrying transient failures.
///
/// `make` is invoked once per attempt since a `RequestBuilder` cannot be reused.
pub(crate) async fn send_with_retry<F>(
    provider: &str,
    retry: &RetryConfig,
    mut make: F,
) -> Result<reqwest::Response>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let can_retry = attempt < retry.max_retries;

        match make().send().await {
            Ok(resp) if resp.status().is_success() => return Ok(resp),
            Ok(resp) if is_transient(resp.status()) && can_retry => {
                warn!(
                    provider,
                    status = resp.status().as_u16(),
                    attempt,
                    "Transient provider error, retrying"
                );
            }
            Ok(resp) => {
                let status = resp.status();
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(BackendError::RateLimited {
                        provider: provider.to_string(),
                    }
                    .into());
                }
                let body = resp.text().await.unwrap_or_default();
                return Err(BackendError::Status {
                    provider: provider.to_string(),
                    status: status.as_u16(),
                    body,
                }
                .into());
            }
            Err(e) if can_retry => {
                warn!(provider, error = %e, attempt, "Request failed, retrying");
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to connect to {}", provider));
            }
        }

        tokio::time::sleep(retry.delay(attempt)).await;
        attempt += 1;
    }
}

/// Split a byte stream into text lines (NDJSON and SSE framing)
pub(crate) fn lines<S>(bytes: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.context("Stream read failed")?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&line).trim_end_matches(['\r', '\n']).to_string();
                if !text.is_empty() {
                    yield text;
                }
            }
        }

        if !buffer.is_empty() {
            let text = String::from_utf8_lossy(&buffer).trim().to_string();
            if !text.is_empty() {
                debug!(len = text.len(), "Flushing unterminated trailing line");
                yield text;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static {
        let items: Vec<reqwest::Result<Bytes>> =
            parts.iter().copied().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect();
        stream::iter(items)
    }

    #[tokio::test]
    async fn test_lines_reassembles_split_chunks() {
        let collected: Vec<String> = lines(chunks(&["{\"a\":", "1}\n{\"b\"", ":2}\r\n\n", "tail"]))
            .map(|l| l.unwrap())
            .collect()
            .await;

        assert_eq!(collected, vec!["{\"a\":1}", "{\"b\":2}", "tail"]);
    }

    #[test]
    fn test_retry_delay_grows_linearly() {
        let retry = RetryConfig {
            max_retries: 3,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(retry.delay(0), Duration::from_millis(100));
        assert_eq!(retry.delay(2), Duration::from_millis(300));
    }
}
