//! Configuration management for bench.toml and credentials

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::http::RetryConfig;

pub const CONFIG_FILE: &str = "bench.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ollama: OllamaSettings,
    pub openai: OpenAiSettings,
    pub gemini: GeminiSettings,
    pub http: HttpSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub url: String,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:11434".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub base_url: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    pub base_url: String,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

impl Settings {
    /// Load bench.toml if one exists, otherwise defaults; env overrides applied
    pub fn load() -> Result<Self> {
        let mut settings = match Self::find_config_path() {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        settings.apply_env();
        Ok(settings)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let settings =
            toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(settings)
    }

    /// Find bench.toml by searching current directory and parents
    pub fn find_config_path() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::find_config_from(current)
    }

    fn find_config_from(mut current: PathBuf) -> Option<PathBuf> {
        for _ in 0..10 {
            let candidate = current.join(CONFIG_FILE);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                break;
            }
        }
        None
    }

    /// `OLLAMA_HOST` overrides the configured Ollama URL
    pub fn apply_env(&mut self) {
        if let Some(host) = non_empty_var("OLLAMA_HOST") {
            self.ollama.url = normalize_host(&host);
        }
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Provider API keys, read from the environment only
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub google_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            google_api_key: non_empty_var("GOOGLE_API_KEY"),
        }
    }
}

/// Load `.env` from the working directory or its parent.
///
/// Returns the file that was loaded, if any.
pub fn load_dotenv() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    let candidates = [cwd.join(".env"), cwd.join("..").join(".env")];

    for path in candidates {
        if path.is_file() {
            match load_env_file(&path) {
                Ok(count) => {
                    debug!(path = %path.display(), count, "Loaded environment file");
                    return Some(path);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to load environment file");
                }
            }
        }
    }
    None
}

/// Set variables from a dotenv file; existing variables are left alone.
///
/// Returns how many variables were set.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut count = 0;
    for (key, value) in content.lines().filter_map(parse_env_line) {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(&key, value);
            count += 1;
        }
    }
    Ok(count)
}

fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let value = value.trim();
    let value = if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        &value[1..value.len() - 1]
    } else {
        value
    };

    Some((key.to_string(), value.to_string()))
}
