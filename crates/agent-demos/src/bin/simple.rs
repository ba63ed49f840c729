//! Four small agents run one after another: plain, tool, attachment, delegation

use agent_core::{Agent, Document};
use agent_demos::tools::greeting_tool;
use agent_demos::{block_on, connect, init, DEFAULT_MODEL};
use anyhow::{Context, Result};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "simple", about = "Showcase of basic agent configurations")]
struct Cli {
    /// Model for the tool, attachment and delegation agents
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Local model for the plain agent
    #[arg(long, default_value = "qwen3:1.7b")]
    local_model: String,

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
    let local = connect(&cli.local_model)?;

    println!("🤖 Agent Showcase");
    println!("=================");
    println!();

    let simple = Agent::new("SimpleAgent")
        .with_model(local)
        .with_description("A simple agent that responds to user messages")
        .with_instructions("You are a helpful assistant. Respond to user questions in a friendly and informative way.");

    println!("=== Running Simple Agent ===");
    let response = simple
        .execute("Hello! Can you tell me a fun fact about space?")
        .await
        .context("Error running simple agent")?;
    println!("Simple Agent Response: {}\n", response);

    let tool_agent = Agent::new("ToolAgent")
        .with_model(model.clone())
        .with_description("An agent that can greet people using tools")
        .with_instructions("You have access to a greeting tool. Use it to greet users by name.")
        .with_tool(greeting_tool());

    println!("=== Running Tool Agent ===");
    let response = tool_agent
        .execute("I am Nexxia")
        .await
        .context("Error running tool agent")?;
    println!("Tool Agent Response: {}\n", response);

    let attachment_agent = Agent::new("AttachmentAgent")
        .with_model(model.clone())
        .with_description("An agent that can analyze and work with file attachments")
        .with_instructions("You can analyze documents. Describe what you see and provide insights about the content.")
        .with_document(Document::in_memory(
            "sample.txt",
            "This is a sample text file with some information about artificial intelligence.",
        ));

    println!("=== Running Attachment Agent ===");
    let response = attachment_agent
        .execute("Please analyze this text file and tell me what it contains.")
        .await
        .context("Error running attachment agent")?;
    println!("Attachment Agent Response: {}\n", response);

    let research = Agent::new("ResearchAgent")
        .with_model(model.clone())
        .with_description("A specialized agent for researching topics")
        .with_instructions("You are a research specialist. Provide detailed information about topics you're asked about.");
    let multi_agent = Agent::new("MultiAgent")
        .with_model(model)
        .with_description("An agent that coordinates with other agents to complete complex tasks")
        .with_instructions("You can delegate tasks to other agents. Use the ResearchAgent for detailed research tasks.")
        .with_agent(research);

    println!("=== Running Multi Agent ===");
    let response = multi_agent
        .execute("I need information about quantum computing. Can you research this topic for me?")
        .await
        .context("Error running multi agent")?;
    println!("Multi Agent Response: {}\n", response);

    println!("✅ All agents completed successfully!");
    Ok(())
}
