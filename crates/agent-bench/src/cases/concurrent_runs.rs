use agent_core::{Agent, AgentRun, Model, Trace};
use tracing::debug;

use super::tools::{company_name_tool, COMPANY_NAME};
use super::truncate;
use crate::record::{CaseOutcome, RecordBuilder};

pub const NAME: &str = "ConcurrentRuns";

const PROMPTS: [(&str, &str); 3] = [
    (
        "tool call request",
        "What is the name of the company with the number 150? Use tools.",
    ),
    (
        "simple question",
        "What is the capital of France? respond with the name of the city only",
    ),
    ("another simple question", "What is 2 + 2? respond with the answer only"),
];

/// Starts every run before waiting on any of them
pub async fn run(model: Model) -> CaseOutcome {
    let builder = RecordBuilder::start(NAME, &model);

    let agent = Agent::new("concurrent")
        .with_model(model)
        .with_description("You are a helpful assistant that can perform various tasks.")
        .with_instructions("use tools when requested.")
        .with_tool(company_name_tool())
        .with_trace(Trace::new());

    let mut runs: Vec<AgentRun> = Vec::with_capacity(PROMPTS.len());
    for (label, prompt) in PROMPTS {
        match agent.start(prompt) {
            Ok(run) => {
                debug!(run_id = run.id(), label, "Started run");
                runs.push(run);
            }
            Err(e) => {
                let record = builder.fail("", format!("Failed to start run: {:#}", e));
                return CaseOutcome::err(record, e);
            }
        }
    }

    let mut responses = Vec::with_capacity(runs.len());
    for run in runs {
        match run.wait(None).await {
            Ok(response) => responses.push(response),
            Err(e) => {
                let record = builder.fail("", format!("Wait for run failed: {:#}", e));
                return CaseOutcome::err(record, e);
            }
        }
    }

    if responses.len() != PROMPTS.len() {
        return CaseOutcome::ok(builder.fail("", "Should have responses for all runs"));
    }

    let tool_call_found = responses.iter().any(|r| r.contains(COMPANY_NAME));
    if !tool_call_found {
        return CaseOutcome::ok(builder.fail("", "Should have found a response with tool call result"));
    }

    for response in &responses {
        if response.contains("Error:") {
            return CaseOutcome::ok(builder.fail("", "Run should not contain error"));
        }
        if response.is_empty() {
            return CaseOutcome::ok(builder.fail("", "Run should have non-empty response"));
        }
    }

    let all_responses = responses.join(" | ");
    let record = builder
        .ok(&all_responses)
        .with_metadata("num_runs", PROMPTS.len())
        .with_metadata("tool_call_found", tool_call_found)
        .with_metadata("response_preview", truncate(&all_responses, 150));
    CaseOutcome::ok(record)
}
