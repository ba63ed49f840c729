//! Chat backend implementations

pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod scripted;

pub use gemini::GeminiBackend;
pub use ollama::{LocalModel, OllamaBackend};
pub use openai::OpenAiBackend;
pub use scripted::ScriptedBackend;
