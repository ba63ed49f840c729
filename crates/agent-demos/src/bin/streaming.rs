//! Print a streamed answer as it arrives

use std::io::Write;

use agent_core::{Agent, RunEvent, Trace};
use agent_demos::{block_on, connect, init, DEFAULT_MODEL};
use anyhow::Result;
use clap::Parser;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "streaming", about = "Stream an answer to a question")]
struct Cli {
    /// The question to ask
    #[arg(required = true)]
    question: Vec<String>,

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
    let trace = Trace::new();
    let agent = Agent::new("streamer")
        .with_model(connect(&cli.model)?)
        .with_description("You are a helpful AI assistant that provides clear and informative responses.")
        .with_instructions(
            "Provide detailed explanations and be helpful. When answering questions, be thorough but concise.",
        )
        .with_streaming(true)
        .with_trace(trace.clone());

    let question = cli.question.join(" ");
    println!("Question: {}", question);
    println!("Streaming response:");
    println!("==================");

    let mut run = agent.start(&question)?;
    let mut full_response = String::new();
    while let Some(event) = run.next().await {
        match event {
            RunEvent::Content(e) => {
                print!("{}", e.content);
                let _ = std::io::stdout().flush();
                full_response.push_str(&e.content);
            }
            RunEvent::Tool(e) => println!("\n[Tool called: {}]", e.tool_name),
            RunEvent::Approval(e) => {
                run.approve(&e.approval_id, true);
            }
            RunEvent::Error(e) => anyhow::bail!("Error during streaming: {}", e.message),
            RunEvent::Eval(_) => {}
        }
    }

    println!("\n==================");
    println!("Full response received ({} characters)", full_response.chars().count());
    debug!(steps = trace.len(), "Run trace");
    Ok(())
}
