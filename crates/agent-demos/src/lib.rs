//! Shared setup for the demo binaries

pub mod tools;

use std::future::Future;

use agent_core::config::load_dotenv;
use agent_core::{Credentials, GeminiBackend, Model, OllamaBackend, OpenAiBackend, Settings};
use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

fn install_subscriber(default_level: &str) {
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(default_level)
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Load `.env`, then install a `warn` (or `debug`) subscriber unless RUST_LOG is set.
///
/// Call before any runtime exists.
pub fn init(verbose: bool) {
    load_dotenv();
    install_subscriber(if verbose { "debug" } else { "warn" });
}

/// Like [`init`], with the default level taken from `ENV`; returns that level
pub fn init_from_env() -> &'static str {
    load_dotenv();
    let level = env_log_level(std::env::var("ENV").ok().as_deref());
    install_subscriber(level);
    level
}

/// `production`/`prod` log warnings, `development`/`dev` everything, otherwise info
pub fn env_log_level(env: Option<&str>) -> &'static str {
    match env {
        Some("production") | Some("prod") => "warn",
        Some("development") | Some("dev") => "debug",
        _ => "info",
    }
}

/// Run `future` on a fresh multi-threaded runtime
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;
    Ok(runtime.block_on(future))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Gemini,
    Ollama,
}

impl Provider {
    /// `gpt*` goes to OpenAI, `gemini*` to Gemini, everything else to Ollama
    pub fn for_model(name: &str) -> Self {
        if name.starts_with("gpt") {
            Provider::OpenAi
        } else if name.starts_with("gemini") {
            Provider::Gemini
        } else {
            Provider::Ollama
        }
    }
}

/// Model handle for `name`, failing when the provider's API key is missing
pub fn connect(name: &str) -> Result<Model> {
    let settings = Settings::load()?;
    let credentials = Credentials::from_env();

    let model = match Provider::for_model(name) {
        Provider::OpenAi => {
            let Some(key) = credentials.openai_api_key else {
                anyhow::bail!(
                    "OPENAI_API_KEY environment variable not set\n\
Please set your OpenAI API key: export OPENAI_API_KEY=your_api_key_here"
                );
            };
            Model::new(name, OpenAiBackend::new(&settings.openai.base_url, &key, &settings.http)?)
        }
        Provider::Gemini => {
            let Some(key) = credentials.google_api_key else {
                anyhow::bail!("GOOGLE_API_KEY environment variable not set");
            };
            Model::new(name, GeminiBackend::new(&settings.gemini.base_url, &key, &settings.http)?)
        }
        Provider::Ollama => Model::new(name, OllamaBackend::new(&settings.ollama.url, &settings.http)?),
    };
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_for_model() {
        assert_eq!(Provider::for_model("gpt-4o-mini"), Provider::OpenAi);
        assert_eq!(Provider::for_model("gemini-2.0-flash"), Provider::Gemini);
        assert_eq!(Provider::for_model("qwen3:1.7b"), Provider::Ollama);
    }

    #[test]
    fn test_env_log_level() {
        assert_eq!(env_log_level(Some("prod")), "warn");
        assert_eq!(env_log_level(Some("production")), "warn");
        assert_eq!(env_log_level(Some("dev")), "debug");
        assert_eq!(env_log_level(Some("staging")), "info");
        assert_eq!(env_log_level(None), "info");
    }

    #[test]
    fn test_block_on_outside_a_runtime() {
        let answer = block_on(async {
            tokio::task::spawn(async { 6 * 7 }).await.unwrap()
        })
        .unwrap();
        assert_eq!(answer, 42);
    }
}
