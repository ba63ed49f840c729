//! agent-bench: capability benchmark for agent models
//!
//! Runs each selected test case against each model and writes a Markdown
//! comparison table.

mod cases;
mod commands;
mod eval_mode;
mod evals;
mod record;
mod registry;
mod report;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use agent_core::config::load_dotenv;
use agent_core::Settings;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::registry::{ModelRegistry, ProviderContext, RegistryError, TestCaseRegistry};
use crate::runner::Runner;

#[derive(Debug, Parser)]
#[command(name = "agent-bench")]
#[command(about = "Run capability checks against one or more models", version)]
struct Cli {
    /// Model names (exact or prefix of a known model)
    models: Vec<String>,

    /// Comma-separated list of tests to run (case-insensitive)
    #[arg(short, long, value_delimiter = ',')]
    test: Vec<String>,

    /// Run evaluation mode for tests that support it
    #[arg(long)]
    eval: bool,

    /// Where to write the comparison report
    #[arg(long, default_value = report::DEFAULT_REPORT_FILE)]
    report: PathBuf,

    /// Also write all results as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// List available models and tests, then exit
    #[arg(long)]
    list: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Accept the single-dash long forms (`-test`, `-test=...`, `-eval`)
fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg: String| {
            if arg == "-test" || arg == "-eval" || arg.starts_with("-test=") {
                format!("-{}", arg)
            } else {
                arg
            }
        })
        .collect()
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse_from(normalize_args(std::env::args()));

    // before the runtime spawns workers, and before tracing so RUST_LOG may come from .env
    let dotenv = load_dotenv();
    init_tracing(cli.verbose);
    if let Some(path) = dotenv {
        debug!(path = %path.display(), "Loaded environment file");
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?
        .block_on(run(cli))
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = Settings::load()?;
    let models = ModelRegistry::builtin();
    let tests = TestCaseRegistry::builtin();

    if cli.list {
        commands::list(&settings, &models, &tests).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let names = commands::model_names(&cli.models);
    if names.is_empty() {
        print!("{}", commands::usage(&models, &tests));
        return Ok(ExitCode::FAILURE);
    }

    let ctx = ProviderContext::from_env(settings);
    let resolved = match commands::resolve_models(&names, &models, &ctx) {
        Ok(resolved) => resolved,
        Err(name) => {
            println!("Model unknown or missing authentication: {}", name);
            print!("{}", commands::available_models(&models));
            return Ok(ExitCode::FAILURE);
        }
    };

    let selected = match tests.filter(&cli.test) {
        Ok(selected) => selected,
        Err(e @ RegistryError::NoMatchingTests { .. }) => {
            println!("{}", e);
            print!("{}", commands::available_tests(&tests, false));
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };
    info!(models = resolved.len(), tests = selected.len(), eval = cli.eval, "Starting benchmark");

    if cli.eval {
        eval_mode::run_evaluation_mode(&resolved, &selected).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let runner = Runner::new(resolved, selected)?;
    let matrix = runner.run().await;

    if let Some(path) = &cli.json {
        report::write_json(matrix.records(), path)
            .with_context(|| format!("Failed to write JSON results to {}", path.display()))?;
        println!("📄 JSON results written: {}", path.display());
    }
    report::generate_report(&matrix, &cli.report);

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(normalize_args(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_single_dash_test_flag() {
        let cli = parse(&["agent-bench", "-test", "SimpleAgent", "gpt-4o-mini"]);
        assert_eq!(cli.test, vec!["SimpleAgent"]);
        assert_eq!(cli.models, vec!["gpt-4o-mini"]);

        let cli = parse(&["agent-bench", "-test=SimpleAgent,Streaming", "qwen"]);
        assert_eq!(cli.test, vec!["SimpleAgent", "Streaming"]);
        assert_eq!(cli.models, vec!["qwen"]);
    }

    #[test]
    fn test_single_dash_eval_flag() {
        let cli = parse(&["agent-bench", "-eval", "-test", "MultiAgentChain", "gpt-4o-mini", "gpt-4o"]);
        assert!(cli.eval);
        assert_eq!(cli.test, vec!["MultiAgentChain"]);
        assert_eq!(cli.models, vec!["gpt-4o-mini", "gpt-4o"]);
    }

    #[test]
    fn test_double_dash_forms_still_work() {
        let cli = parse(&["agent-bench", "--eval", "--test", "a,b", "-t", "c", "m"]);
        assert!(cli.eval);
        assert_eq!(cli.test, vec!["a", "b", "c"]);
        assert_eq!(cli.models, vec!["m"]);
    }

    #[test]
    fn test_model_arguments_are_not_rewritten() {
        assert_eq!(normalize_args(["agent-bench", "-testing", "x"]), vec!["agent-bench", "-testing", "x"]);
    }
}
