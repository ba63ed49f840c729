//! Human-in-the-loop approval of tool calls

use agent_core::{Agent, AgentRun, ApprovalEvent, Model, RunEvent};
use agent_demos::tools::{
    delete_file_tool, query_database_tool, send_email_tool, transfer_money_tool, transfer_note,
};
use agent_demos::{block_on, connect, init, DEFAULT_MODEL};
use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::warn;

#[derive(Debug, Parser)]
#[command(name = "approval", about = "Approval workflows for sensitive tool calls")]
struct Cli {
    /// Approve every request without prompting
    #[arg(long)]
    auto: bool,

    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(short, long)]
    verbose: bool,
}

type Input = Lines<BufReader<Stdin>>;

async fn prompt(input: &mut Input, question: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;
    Ok(input.next_line().await?.unwrap_or_default().trim().to_lowercase())
}

async fn ask_approval(input: &mut Input, request: &ApprovalEvent) -> Result<bool> {
    let rule = "=".repeat(70);
    println!("\n{}", rule);
    println!("APPROVAL REQUIRED");
    println!("{}", rule);
    println!("Tool: {}", request.tool_name);
    println!("Approval ID: {}", request.approval_id);
    if request.tool_name == "transfer_money" {
        println!("Validation: {}", transfer_note(&request.arguments));
    }

    if let Some(args) = request.arguments.as_object() {
        println!("\nParameters:");
        for (key, value) in args {
            println!("  {}: {}", key, value);
        }
    }
    println!("{}", rule);

    let answer = prompt(input, "Approve this action? (y/n): ").await?;
    let approved = answer == "y" || answer == "yes";
    if approved {
        println!("✓ Action APPROVED");
    } else {
        println!("✗ Action REJECTED");
    }
    println!("{}\n", rule);
    Ok(approved)
}

/// Print events; approvals are asked on stdin, or granted when `input` is None
async fn drive(mut run: AgentRun, mut input: Option<&mut Input>) -> Result<String> {
    let mut full_response = String::new();
    while let Some(event) = run.next().await {
        match event {
            RunEvent::Content(e) => {
                print!("{}", e.content);
                full_response.push_str(&e.content);
            }
            RunEvent::Approval(e) => {
                let approved = match input.as_deref_mut() {
                    Some(input) => ask_approval(input, &e).await?,
                    None => {
                        println!("\n[AUTO-APPROVED: {}]", e.tool_name);
                        true
                    }
                };
                run.approve(&e.approval_id, approved);
            }
            RunEvent::Tool(e) if e.tool_name == "query_database" => {
                println!("\n[Database query executed - no approval needed]");
            }
            RunEvent::Tool(e) => println!("\n[Tool executed: {}]", e.tool_name),
            RunEvent::Error(e) => warn!(agent = %e.agent, "Error: {}", e.message),
            RunEvent::Eval(_) => {}
        }
    }
    Ok(full_response)
}

struct Example {
    title: &'static str,
    intro: &'static str,
    agent: fn(Model) -> Agent,
    prompt: &'static str,
}

fn email_agent(model: Model) -> Agent {
    Agent::new("EmailAgent")
        .with_model(model)
        .with_description("An agent that can send emails with approval")
        .with_instructions("You can send emails using the send_email tool. Always use the tool when asked to send an email.")
        .with_tool(send_email_tool())
        .with_streaming(true)
}

fn file_agent(model: Model) -> Agent {
    Agent::new("FileAgent")
        .with_model(model)
        .with_description("An agent that can manage files with approval")
        .with_instructions("You can delete files using the delete_file tool. Always provide a clear reason for deletion.")
        .with_tool(delete_file_tool())
        .with_streaming(true)
}

fn banking_agent(model: Model) -> Agent {
    Agent::new("BankingAgent")
        .with_model(model)
        .with_description("An agent that can perform financial transactions with approval")
        .with_instructions("You can transfer money using the transfer_money tool. Always verify the amounts and accounts.")
        .with_tool(transfer_money_tool())
        .with_streaming(true)
}

fn mixed_agent(model: Model) -> Agent {
    Agent::new("MixedAgent")
        .with_model(model)
        .with_description("An agent with both approved and non-approved tools")
        .with_instructions("You have access to database queries (no approval) and money transfers (requires approval). Use them as needed.")
        .with_tool(query_database_tool())
        .with_tool(transfer_money_tool())
        .with_streaming(true)
}

const EXAMPLES: [Example; 4] = [
    Example {
        title: "Example 1: Simple Email Approval",
        intro: "This example shows a basic approval workflow for sending an email.",
        agent: email_agent,
        prompt: "Send an email to john@example.com with subject 'Project Update' and body 'The project is on track and will be completed by end of week.'",
    },
    Example {
        title: "Example 2: File Deletion Approval",
        intro: "This example shows approval for destructive operations.",
        agent: file_agent,
        prompt: "Delete the file /tmp/old-logs.txt because it contains outdated information from last year.",
    },
    Example {
        title: "Example 3: Financial Transaction with Validation",
        intro: "This example shows approval with custom validation logic.",
        agent: banking_agent,
        prompt: "Transfer $5,000 from account 123-456-789 to account 987-654-321 with memo 'Monthly payment'",
    },
    Example {
        title: "Example 4: Mixed Tools with Selective Approval",
        intro: "This example shows combining tools that require approval with those that don't.",
        agent: mixed_agent,
        prompt: "First, query the database for account 123-456-789 balance. Then transfer $250 to account 999-888-777.",
    },
];

async fn run_example(example: &Example, model: &Model, input: &mut Input) -> Result<()> {
    println!("\n=== {} ===", example.title);
    println!("{}\n", example.intro);

    let agent = (example.agent)(model.clone());
    let response = drive(agent.start(example.prompt)?, Some(input)).await?;
    println!("\n\nFinal Response: {}", response);
    Ok(())
}

async fn run_automated(model: &Model) -> Result<()> {
    println!("\n=== Automated Example: Auto-Approve for Testing ===");
    println!("This example shows how to automatically approve requests for testing purposes.\n");

    let agent = Agent::new("AutoApproveAgent")
        .with_model(model.clone())
        .with_description("An agent that auto-approves all actions")
        .with_instructions("Send emails and perform operations as requested.")
        .with_tool(send_email_tool())
        .with_tool(transfer_money_tool())
        .with_streaming(true);

    drive(agent.start("Send an email to team@example.com about the meeting tomorrow.")?, None).await?;
    println!();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init(cli.verbose);
    block_on(run(cli))?
}

async fn run(cli: Cli) -> Result<()> {
    let model = connect(&cli.model)?;

    println!("Human-in-the-Loop Approval Examples");
    println!("====================================");
    println!();
    println!("This example demonstrates various approval workflows for sensitive operations.");
    println!();

    if cli.auto {
        return run_automated(&model).await;
    }

    println!("Available Examples:");
    for (i, example) in EXAMPLES.iter().enumerate() {
        let title = example.title.split_once(": ").map_or(example.title, |(_, t)| t);
        println!("{}. {}", i + 1, title);
    }
    println!("5. Run All Examples");
    println!("6. Automated Example (auto-approve)");
    println!();

    let mut input: Input = BufReader::new(tokio::io::stdin()).lines();
    let choice = prompt(&mut input, "Select an example (1-6): ").await?;

    match choice.as_str() {
        "5" => {
            for example in &EXAMPLES {
                run_example(example, &model, &mut input).await?;
            }
        }
        "6" => run_automated(&model).await?,
        other => {
            let index = match other.parse::<usize>() {
                Ok(n @ 1..=4) => n - 1,
                _ => {
                    println!("Invalid choice. Running Example 1 by default.");
                    0
                }
            };
            run_example(&EXAMPLES[index], &model, &mut input).await?;
        }
    }

    println!("\n✅ Example completed successfully!");
    Ok(())
}
