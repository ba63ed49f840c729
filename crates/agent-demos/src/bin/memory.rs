//! An assistant that remembers what it is told across runs in one session

use agent_core::{Agent, Memory, Session};
use agent_demos::{block_on, connect, init, DEFAULT_MODEL};
use anyhow::{Context, Result};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "memory", about = "Agent with persistent session memory")]
struct Cli {
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(short, long)]
    verbose: bool,
}

const CONVERSATION: [(&str, &str); 3] = [
    (
        "First Interaction",
        "Hi! My name is Alice and I love hiking and photography. I'm planning a trip to Colorado next month.",
    ),
    (
        "Second Interaction",
        "I also prefer morning meetings over afternoon ones, and I'm vegetarian.",
    ),
    (
        "Third Interaction",
        "Can you recommend some activities for my trip? Also, remind me what you know about my preferences.",
    ),
];

fn main() -> Result<()> {
    let cli = Cli::parse();
    init(cli.verbose);
    block_on(run(cli))?
}

async fn run(cli: Cli) -> Result<()> {
    let session = Session::new();
    let memory = Memory::new();

    let agent = Agent::new("PersonalAssistant")
        .with_model(connect(&cli.model)?)
        .with_description("A personal assistant with memory capabilities")
        .with_instructions(
            "You are a helpful personal assistant. Remember important information about the user \
             and use it in future conversations. Save key facts with the save_memory tool.",
        )
        .with_session(session.clone())
        .with_memory(memory.clone());

    println!("🧠 Memory Agent Example");
    println!("=======================");
    println!("Session: {}\n", session.id());

    for (title, message) in CONVERSATION {
        println!("=== {} ===", title);
        println!("User: {}", message);
        let response = agent
            .execute(message)
            .await
            .with_context(|| format!("Error in {}", title.to_lowercase()))?;
        println!("Assistant: {}\n", response);
    }

    println!("=== Stored Memories ===");
    if memory.is_empty() {
        println!("(none saved)");
    } else {
        for note in memory.content().lines() {
            println!("- {}", note);
        }
    }
    println!("\nRuns in session: {}", session.run_ids().len());
    Ok(())
}
