use agent_core::{Agent, Model, Trace};

use super::truncate;
use crate::record::{CaseOutcome, RecordBuilder};

pub const NAME: &str = "SimpleAgent";

/// One question, one answer, no tools
pub async fn run(model: Model) -> CaseOutcome {
    let builder = RecordBuilder::start(NAME, &model);

    let agent = Agent::new("simple")
        .with_model(model)
        .with_description("A basic conversational agent that provides clear and helpful responses")
        .with_instructions(
            "Answer questions clearly and concisely. For geography questions, provide accurate information.",
        )
        .with_trace(Trace::new());

    let response = match agent.execute("What is the capital of Australia?").await {
        Ok(response) => response,
        Err(e) => return builder.error("", e),
    };

    if !response.to_lowercase().contains("canberra") {
        let err = anyhow::anyhow!("expected response to contain 'Canberra', got: {}", response);
        return builder.error(&response, err);
    }

    let record = builder
        .ok(&response)
        .with_metadata("expected_content", "canberra")
        .with_metadata("response_preview", truncate(&response, 100));
    CaseOutcome::ok(record)
}
