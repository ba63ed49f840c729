//! agent-core: agent runtime used by the benchmark harness and demos
//!
//! Provides:
//! - Chat backends (OpenAI-compatible, Ollama, Gemini, scripted) behind `Model`
//! - `Agent` with tools, sub-agents, memory and documents
//! - `AgentRun` event streams with approval gating
//! - Configuration loading (bench.toml, .env, credentials)

pub mod agent;
pub mod config;
pub mod document;
pub mod error;
mod http;
pub mod memory;
pub mod message;
pub mod model;
pub mod providers;
pub mod run;
mod runtime;
pub mod session;
pub mod tool;
pub mod trace;

pub use agent::Agent;
pub use config::{Credentials, Settings};
pub use document::Document;
pub use error::BackendError;
pub use http::RetryConfig;
pub use memory::Memory;
pub use message::{ChatChunk, ChatMessage, ChatRequest, ChatResponse, Role, ToolCall, ToolDefinition};
pub use model::{ChatBackend, ChatStream, Model};
pub use providers::{GeminiBackend, OllamaBackend, OpenAiBackend, ScriptedBackend};
pub use run::{AgentRun, ApprovalEvent, ContentEvent, ErrorEvent, EvalEvent, RunEvent, ToolEvent};
pub use session::Session;
pub use tool::{AgentTool, ParameterProperty, ParameterSchema, ToolResult};
pub use trace::{Trace, TraceEntry, TraceKind};
