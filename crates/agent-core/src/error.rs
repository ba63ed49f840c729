//! Typed backend failures
//!
//! Everything else in the crate travels as `anyhow::Error`; these variants exist
//! so callers can tell a throttled provider from a broken one.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Provider kept answering 429 after all retries
    #[error("{provider} rate limit exceeded")]
    RateLimited { provider: String },

    /// Non-success HTTP status
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    /// Response body did not match the expected shape
    #[error("failed to decode {provider} response: {message}")]
    Decode { provider: String, message: String },
}

impl BackendError {
    pub fn decode(provider: &str, message: impl ToString) -> Self {
        BackendError::Decode {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }
}
