//! Static registries of test cases and model backends

use agent_core::{Credentials, GeminiBackend, Model, OllamaBackend, OpenAiBackend, Settings};
use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;
use tracing::error;

use crate::cases;
use crate::record::CaseOutcome;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No matching tests found for: {requested}")]
    NoMatchingTests {
        requested: String,
        available: Vec<String>,
    },

    #[error("Duplicate test case name: {0}")]
    DuplicateTestCase(String),
}

/// Exercises one capability against a model
pub type CaseFn = fn(Model) -> BoxFuture<'static, CaseOutcome>;

/// Narrative evaluation: (primary model, scoring model)
pub type EvalFn = fn(Model, Model) -> BoxFuture<'static, ()>;

#[derive(Clone, Copy)]
pub struct TestCase {
    pub name: &'static str,
    pub run: CaseFn,
    pub eval: Option<EvalFn>,
}

impl TestCase {
    pub const fn new(name: &'static str, run: CaseFn) -> Self {
        Self {
            name,
            run,
            eval: None,
        }
    }

    pub const fn with_eval(mut self, eval: EvalFn) -> Self {
        self.eval = Some(eval);
        self
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("eval", &self.eval.is_some())
            .finish()
    }
}

/// Ordered test cases with case-insensitively unique names
#[derive(Debug, Clone)]
pub struct TestCaseRegistry {
    cases: Vec<TestCase>,
}

impl TestCaseRegistry {
    pub fn new(cases: Vec<TestCase>) -> Result<Self, RegistryError> {
        for (i, case) in cases.iter().enumerate() {
            if cases[..i].iter().any(|c| c.name.eq_ignore_ascii_case(case.name)) {
                return Err(RegistryError::DuplicateTestCase(case.name.to_string()));
            }
        }
        Ok(Self { cases })
    }

    /// The capability checks shipped with the benchmark
    pub fn builtin() -> Self {
        Self::new(builtin_cases()).expect("built-in test case names are unique")
    }

    pub fn list_all(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn names(&self) -> Vec<String> {
        self.cases.iter().map(|c| c.name.to_string()).collect()
    }

    /// Cases whose name matches any requested name, in registry order.
    ///
    /// Blank entries are ignored; no names at all selects every case.
    pub fn filter<S: AsRef<str>>(&self, requested: &[S]) -> Result<Vec<TestCase>, RegistryError> {
        let wanted: Vec<&str> = requested
            .iter()
            .map(|s| s.as_ref().trim())
            .filter(|s| !s.is_empty())
            .collect();

        if wanted.is_empty() {
            return Ok(self.cases.clone());
        }

        let filtered: Vec<TestCase> = self
            .cases
            .iter()
            .filter(|c| wanted.iter().any(|w| c.name.eq_ignore_ascii_case(w)))
            .copied()
            .collect();

        if filtered.is_empty() {
            return Err(RegistryError::NoMatchingTests {
                requested: wanted.join(","),
                available: self.names(),
            });
        }
        Ok(filtered)
    }
}

fn builtin_cases() -> Vec<TestCase> {
    vec![
        TestCase::new("SimpleAgent", |m| cases::simple_agent::run(m).boxed()),
        TestCase::new("ToolIntegration", |m| cases::tool_integration::run(m).boxed()),
        TestCase::new("TeamCoordination", |m| cases::team_coordination::run(m).boxed()),
        TestCase::new("FileAttachments", |m| cases::file_attachments::run(m).boxed()),
        TestCase::new("MultiAgentChain", |m| cases::multi_agent_chain::run(m).boxed())
            .with_eval(|m, s| cases::multi_agent_chain::evaluate(m, s).boxed()),
        TestCase::new("MultiAgentVariations", |m| {
            cases::multi_agent_chain::run_variations(m).boxed()
        }),
        TestCase::new("ConcurrentRuns", |m| cases::concurrent_runs::run(m).boxed()),
        TestCase::new("Streaming", |m| cases::streaming::run(m).boxed()),
        TestCase::new("StreamingWithTools", |m| cases::streaming::run_with_tools(m).boxed()),
        TestCase::new("MemoryPersistence", |m| cases::memory_persistence::run(m).boxed()),
    ]
}

/// Everything a provider constructor may need
#[derive(Debug, Clone, Default)]
pub struct ProviderContext {
    pub settings: Settings,
    pub credentials: Credentials,
}

impl ProviderContext {
    pub fn from_env(settings: Settings) -> Self {
        Self {
            settings,
            credentials: Credentials::from_env(),
        }
    }
}

/// Builds a model handle, or `None` when credentials are missing
pub type ProviderFn = fn(&str, &ProviderContext) -> Option<Model>;

#[derive(Clone, Copy)]
pub struct ModelDescriptor {
    /// Exact model name or a prefix of it
    pub name: &'static str,
    pub provider: ProviderFn,
}

impl std::fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDescriptor").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    descriptors: Vec<ModelDescriptor>,
}

fn openai_provider(name: &str, ctx: &ProviderContext) -> Option<Model> {
    let Some(api_key) = ctx.credentials.openai_api_key.as_deref() else {
        error!("OPENAI_API_KEY is not set");
        return None;
    };
    match OpenAiBackend::new(&ctx.settings.openai.base_url, api_key, &ctx.settings.http) {
        Ok(backend) => Some(Model::new(name, backend)),
        Err(e) => {
            error!(error = %e, "Failed to create OpenAI backend");
            None
        }
    }
}

fn ollama_provider(name: &str, ctx: &ProviderContext) -> Option<Model> {
    match OllamaBackend::new(&ctx.settings.ollama.url, &ctx.settings.http) {
        Ok(backend) => Some(Model::new(name, backend)),
        Err(e) => {
            error!(error = %e, "Failed to create Ollama backend");
            None
        }
    }
}

fn gemini_provider(name: &str, ctx: &ProviderContext) -> Option<Model> {
    let Some(api_key) = ctx.credentials.google_api_key.as_deref() else {
        error!("GOOGLE_API_KEY is not set");
        return None;
    };
    match GeminiBackend::new(&ctx.settings.gemini.base_url, api_key, &ctx.settings.http) {
        Ok(backend) => Some(Model::new(name, backend)),
        Err(e) => {
            error!(error = %e, "Failed to create Gemini backend");
            None
        }
    }
}

impl ModelRegistry {
    pub fn new(descriptors: Vec<ModelDescriptor>) -> Self {
        Self { descriptors }
    }

    pub fn builtin() -> Self {
        let d = |name, provider| ModelDescriptor { name, provider };
        Self::new(vec![
            d("gpt-4o-mini", openai_provider as ProviderFn),
            d("gpt-4o", openai_provider),
            d("gpt", openai_provider),
            d("qwen", ollama_provider),
            d("llama3.2", ollama_provider),
            d("gemma", ollama_provider),
            d("deepseek", ollama_provider),
            d("gemini", gemini_provider),
        ])
    }

    pub fn descriptors(&self) -> &[ModelDescriptor] {
        &self.descriptors
    }

    /// Exact name match first, then the first descriptor that is a prefix
    pub fn lookup(&self, name: &str) -> Option<&ModelDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.name == name)
            .or_else(|| self.descriptors.iter().find(|d| name.starts_with(d.name)))
    }

    /// Unknown names and missing credentials both yield `None`
    pub fn resolve(&self, name: &str, ctx: &ProviderContext) -> Option<Model> {
        let descriptor = self.lookup(name)?;
        (descriptor.provider)(name, ctx)
    }
}
