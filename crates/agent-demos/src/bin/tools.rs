//! An assistant with calculator, weather and clock tools

use agent_core::Agent;
use agent_demos::tools::{calculator_tool, current_time_tool, weather_tool};
use agent_demos::{block_on, connect, init, DEFAULT_MODEL};
use anyhow::Result;
use clap::Parser;
use tracing::warn;

#[derive(Debug, Parser)]
#[command(name = "tools", about = "Agent using several function tools")]
struct Cli {
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(short, long)]
    verbose: bool,
}

const QUESTIONS: [&str; 4] = [
    "What is 15 * 23?",
    "What's the weather like in Tokyo?",
    "What time is it in New York right now?",
    "Calculate the square root of 144, then tell me the weather in Paris in fahrenheit.",
];

fn main() -> Result<()> {
    let cli = Cli::parse();
    init(cli.verbose);
    block_on(run(cli))?
}

async fn run(cli: Cli) -> Result<()> {
    let agent = Agent::new("ToolAssistant")
        .with_model(connect(&cli.model)?)
        .with_description("An assistant with access to various tools")
        .with_instructions(
            "You are a helpful assistant with access to tools. Use the appropriate tool to \
             answer user questions accurately.",
        )
        .with_tool(calculator_tool())
        .with_tool(weather_tool())
        .with_tool(current_time_tool());

    println!("🔧 Tools Example");
    println!("================\n");

    for (i, question) in QUESTIONS.iter().enumerate() {
        println!("=== Example {} ===", i + 1);
        println!("User: {}", question);
        match agent.execute(question).await {
            Ok(response) => println!("Assistant: {}\n", response),
            Err(e) => warn!(example = i + 1, "Error: {:#}", e),
        }
    }
    Ok(())
}
