//! Console listings and model resolution for the CLI

use agent_core::{Model, OllamaBackend, Settings};
use anyhow::Result;

use crate::registry::{ModelRegistry, ProviderContext, TestCaseRegistry};

// ANSI color codes
const GREEN: &str = "\x1b[92m";
const RED: &str = "\x1b[91m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

pub fn available_models(models: &ModelRegistry) -> String {
    let mut out = String::from("\nAvailable models:\n");
    for descriptor in models.descriptors() {
        out.push_str(&format!("  {}\n", descriptor.name));
    }
    out
}

/// One test per line, optionally marking those with a custom evaluation
pub fn available_tests(tests: &TestCaseRegistry, mark_eval: bool) -> String {
    let mut out = String::from("\nAvailable tests:\n");
    for case in tests.list_all() {
        let eval = if mark_eval && case.eval.is_some() {
            " (supports -eval)"
        } else {
            ""
        };
        out.push_str(&format!("  {}{}\n", case.name, eval));
    }
    out
}

pub fn usage(models: &ModelRegistry, tests: &TestCaseRegistry) -> String {
    let mut out =
        String::from("Usage: agent-bench [-test \"test1,test2\"] [-eval] <model_name> [model_name...]\n");
    out.push_str(&available_models(models));
    out.push_str(&available_tests(tests, true));
    out.push_str("\nExamples:\n");
    out.push_str("  agent-bench gpt-4o-mini gemma3:12b\n");
    out.push_str("  agent-bench -test \"SimpleAgent,ToolIntegration\" qwen gpt-4o\n");
    out.push_str("  agent-bench -eval -test \"MultiAgentChain\" gpt-4o-mini\n");
    out
}

/// Split positional arguments into model names: joined, then split on whitespace
pub fn model_names(args: &[String]) -> Vec<String> {
    args.join(" ").split_whitespace().map(String::from).collect()
}

/// Resolve every name, or return the first one that could not be resolved
pub fn resolve_models(
    names: &[String],
    registry: &ModelRegistry,
    ctx: &ProviderContext,
) -> std::result::Result<Vec<Model>, String> {
    names
        .iter()
        .map(|name| registry.resolve(name, ctx).ok_or_else(|| name.clone()))
        .collect()
}

/// `--list`: registries plus what the local Ollama server has pulled
pub async fn list(settings: &Settings, models: &ModelRegistry, tests: &TestCaseRegistry) -> Result<()> {
    print!("{}", available_models(models));
    print!("{}", available_tests(tests, true));

    println!("\n{}Local Ollama models{} {}({}){}", BOLD, RESET, DIM, settings.ollama.url, RESET);
    let ollama = OllamaBackend::new(&settings.ollama.url, &settings.http)?;
    if !ollama.health_check().await {
        println!("  {}✗{} Ollama is not reachable", RED, RESET);
        return Ok(());
    }

    match ollama.list_models().await {
        Ok(local) if local.is_empty() => println!("  No models pulled"),
        Ok(local) => {
            for m in local {
                println!("  {}✓{} {} ({})", GREEN, RESET, m.name, m.size_human());
            }
        }
        Err(e) => println!("  {}Error listing models: {:#}{}", RED, e, RESET),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelDescriptor;
    use agent_core::ScriptedBackend;

    #[test]
    fn test_model_names_split_on_whitespace() {
        let args = vec!["gpt-4o-mini qwen3:8b".to_string(), " gemma3:12b ".to_string()];
        assert_eq!(model_names(&args), vec!["gpt-4o-mini", "qwen3:8b", "gemma3:12b"]);
        assert!(model_names(&[]).is_empty());
    }

    #[test]
    fn test_usage_marks_eval_support() {
        let text = usage(&ModelRegistry::builtin(), &TestCaseRegistry::builtin());
        assert!(text.starts_with("Usage: agent-bench [-test \"test1,test2\"] [-eval]"));
        assert!(text.contains("\nAvailable models:\n  gpt-4o-mini\n"));
        assert!(text.contains("  MultiAgentChain (supports -eval)\n"));
        assert!(text.contains("  SimpleAgent\n"));
    }

    #[test]
    fn test_resolve_models_reports_first_unknown() {
        fn scripted(name: &str, _: &ProviderContext) -> Option<Model> {
            Some(ScriptedBackend::reply("ok").into_model(name))
        }
        let registry = ModelRegistry::new(vec![ModelDescriptor {
            name: "qwen",
            provider: scripted,
        }]);
        let ctx = ProviderContext::default();

        let names = vec!["qwen3:8b".to_string(), "qwen2.5".to_string()];
        let models = resolve_models(&names, &registry, &ctx).unwrap();
        assert_eq!(models.len(), 2);

        let names = vec!["qwen3:8b".to_string(), "mystery".to_string()];
        assert_eq!(resolve_models(&names, &registry, &ctx).err(), Some("mystery".to_string()));
    }
}
