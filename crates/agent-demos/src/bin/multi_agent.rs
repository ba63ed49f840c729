//! A project manager delegating to a researcher and a writer

use agent_core::Agent;
use agent_demos::{block_on, connect, init, DEFAULT_MODEL};
use anyhow::{Context, Result};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "multi-agent", about = "Coordinate specialist sub-agents")]
struct Cli {
    /// Topic for the article
    #[arg(long, default_value = "the benefits of renewable energy")]
    topic: String,

    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init(cli.verbose);
    block_on(run(cli))?
}

async fn run(cli: Cli) -> Result<()> {
    let model = connect(&cli.model)?;

    let researcher = Agent::new("Researcher")
        .with_model(model.clone())
        .with_description("Expert at researching topics and gathering information")
        .with_instructions(
            "You are a research specialist. When given a topic, provide comprehensive, \
             factual information with key points and insights.",
        );

    let writer = Agent::new("Writer")
        .with_model(model.clone())
        .with_description("Expert at writing clear, engaging content")
        .with_instructions(
            "You are a professional writer. Take research information and turn it into \
             well-structured, engaging content.",
        );

    let manager = Agent::new("ProjectManager")
        .with_model(model)
        .with_description("Coordinates research and writing tasks")
        .with_instructions(
            "You are a project manager. Delegate research tasks to the Researcher and writing \
             tasks to the Writer. Combine their outputs into a final deliverable.",
        )
        .with_agent(researcher)
        .with_agent(writer);

    println!("🤝 Multi-Agent Example");
    println!("======================\n");

    let task = format!(
        "Create a short article about {}. First research the topic, then write the article.",
        cli.topic
    );
    println!("Task: {}\n", task);

    let response = manager
        .execute(&task)
        .await
        .context("Error running project manager")?;
    println!("=== Final Article ===\n{}", response);
    Ok(())
}
