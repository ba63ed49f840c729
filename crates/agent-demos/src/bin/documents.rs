//! Embedded documents, multi-document analysis and on-demand retrieval

use std::path::PathBuf;

use agent_core::{Agent, Document, Model};
use agent_demos::{block_on, connect, init, DEFAULT_MODEL};
use anyhow::{Context, Result};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "documents", about = "Agents working with attached documents")]
struct Cli {
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(short, long)]
    verbose: bool,
}

const CONTRACT: &str = "SERVICE AGREEMENT

This agreement is made between Acme Corp (Provider) and Beta LLC (Client).

1. Services: Provider will deliver cloud hosting services.
2. Term: 12 months starting January 1, 2025.
3. Payment: $5,000 per month, due on the 1st of each month.
4. Termination: Either party may terminate with 30 days written notice.
5. Liability: Provider's liability is limited to fees paid in the prior 3 months.";

const RECEIPT: &str = "RECEIPT #4821
Store: Green Grocer
Date: 2025-03-14

Organic apples   2 kg   $8.40
Oat milk         1 L    $3.20
Sourdough bread  1      $5.50
Coffee beans     500 g  $12.90

Subtotal: $30.00
Tax (8%): $2.40
Total:    $32.40";

const TECH_SPEC: &str = "TECHNICAL SPECIFICATION: Widget API v2

Endpoints:
- GET /widgets returns a paginated list (max 100 per page)
- POST /widgets creates a widget; requires name and color
- DELETE /widgets/{id} removes a widget

Rate limits: 1000 requests per hour per API key.
Authentication: Bearer token in the Authorization header.";

const USER_GUIDE: &str = "USER GUIDE: Widget Manager

Getting started:
1. Sign in with your company account.
2. Open the Widgets tab to see all widgets.
3. Click New Widget and choose a name and color.

Tips:
- Use filters to find widgets by color.
- Deleted widgets cannot be restored.";

const Q1_REPORT: &str = "Q1 SALES REPORT
Revenue: $1.2M
New customers: 340
Top region: North America (45%)
Churn: 4.1%";

const Q2_REPORT: &str = "Q2 SALES REPORT
Revenue: $1.5M
New customers: 410
Top region: Europe (38%)
Churn: 3.2%";

fn main() -> Result<()> {
    let cli = Cli::parse();
    init(cli.verbose);
    block_on(run(cli))?
}

async fn ask(agent: &Agent, title: &str, question: &str) -> Result<()> {
    println!("=== {} ===", title);
    println!("Question: {}", question);
    let response = agent
        .execute(question)
        .await
        .with_context(|| format!("Error in {}", title))?;
    println!("Response: {}\n", response);
    Ok(())
}

fn analyst(name: &str, model: &Model, instructions: &str) -> Agent {
    Agent::new(name)
        .with_model(model.clone())
        .with_description("An agent that analyzes documents")
        .with_instructions(instructions)
}

/// Write a notes file for the from-disk example and return its path
fn write_meeting_notes() -> Result<PathBuf> {
    let dir = std::env::temp_dir().join("agent-demos");
    std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join("meeting-notes.md");
    std::fs::write(
        &path,
        "# Team Sync\n\n- Launch moved to April 2\n- Dana owns the migration plan\n- Next sync: Thursday 10:00\n",
    )
    .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

async fn run(cli: Cli) -> Result<()> {
    let model = connect(&cli.model)?;

    println!("📄 Documents Example");
    println!("====================\n");

    let contract_agent = analyst(
        "ContractAnalyst",
        &model,
        "You are a legal analyst. Summarize contracts and point out important terms.",
    )
    .with_document(Document::in_memory("contract.txt", CONTRACT));
    ask(
        &contract_agent,
        "Example 1: Contract Analysis",
        "What are the key terms of this contract, and how can it be terminated?",
    )
    .await?;

    let receipt_agent = analyst(
        "ReceiptReader",
        &model,
        "You extract structured data from receipts. Be precise with numbers.",
    )
    .with_document(Document::in_memory("receipt.txt", RECEIPT));
    ask(
        &receipt_agent,
        "Example 2: Receipt Extraction",
        "List the purchased items with prices, and confirm the total.",
    )
    .await?;

    // referenced, not embedded: the agent fetches them with retrieve_document
    let support_agent = analyst(
        "SupportAgent",
        &model,
        "You answer product questions. Retrieve only the documents you need.",
    )
    .with_document_reference(Document::in_memory("widget-api-spec.txt", TECH_SPEC))
    .with_document_reference(Document::in_memory("user-guide.txt", USER_GUIDE));
    ask(
        &support_agent,
        "Example 3: On-Demand Document References",
        "What is the API rate limit, and how does a user create a widget in the UI?",
    )
    .await?;

    let comparison_agent = analyst(
        "SalesAnalyst",
        &model,
        "You compare business reports and highlight trends.",
    )
    .with_document(Document::in_memory("q1-report.txt", Q1_REPORT))
    .with_document(Document::in_memory("q2-report.txt", Q2_REPORT));
    ask(
        &comparison_agent,
        "Example 4: Multi-Document Analysis",
        "Compare Q1 and Q2. What improved and what should we watch?",
    )
    .await?;

    let notes = Document::from_path(write_meeting_notes()?)?;
    let notes_agent = analyst(
        "NotesAgent",
        &model,
        "You turn meeting notes into action items.",
    )
    .with_document(notes);
    ask(
        &notes_agent,
        "Example 5: Document Loaded From Disk",
        "What are the action items and who owns them?",
    )
    .await?;

    println!("=== Takeaways ===");
    println!("- with_document embeds the full text in every prompt");
    println!("- with_document_reference lists the document and lets the agent fetch it when needed");
    println!("- Document::from_path loads a file and names it after the file name");
    Ok(())
}
