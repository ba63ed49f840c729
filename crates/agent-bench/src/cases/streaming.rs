use agent_core::{Agent, Model, Trace};

use super::tools::{company_name_tool, COMPANY_NAME};
use super::{collect, truncate, validate_response};
use crate::record::{CaseOutcome, RecordBuilder};

pub const NAME: &str = "Streaming";
pub const WITH_TOOLS_NAME: &str = "StreamingWithTools";

fn streaming_agent(model: Model) -> Agent {
    Agent::new("streamer")
        .with_model(model)
        .with_description("You are a helpful assistant that provides clear and concise answers.")
        .with_instructions("Always explain your reasoning and provide examples when possible.")
        .with_streaming(true)
        .with_trace(Trace::new())
}

/// Streams a run and checks the joined chunks for `expected`
async fn check_stream(
    test_case: &'static str,
    model: Model,
    agent: Agent,
    prompt: &str,
    expected: &str,
) -> CaseOutcome {
    let builder = RecordBuilder::start(test_case, &model);

    let collected = match agent.start(prompt) {
        Ok(run) => collect(run).await,
        Err(e) => Err(e),
    };
    let collected = match collected {
        Ok(collected) => collected,
        Err(e) => return builder.error("", e),
    };

    let content = collected.content();
    if let Err(e) = validate_response(&content, expected) {
        return builder.error(&content, e);
    }

    if collected.chunks.len() < 2 {
        return CaseOutcome::ok(builder.fail(&content, "Should have received streaming chunks"));
    }

    let record = builder
        .ok(&content)
        .with_metadata("chunk_count", collected.chunks.len())
        .with_metadata("expected_content", expected)
        .with_metadata("response_preview", truncate(&content, 100));
    CaseOutcome::ok(record)
}

pub async fn run(model: Model) -> CaseOutcome {
    let agent = streaming_agent(model.clone());
    check_stream(
        NAME,
        model,
        agent,
        "What is the capital of France and give me a brief summary of the city",
        "paris",
    )
    .await
}

pub async fn run_with_tools(model: Model) -> CaseOutcome {
    let agent = streaming_agent(model.clone()).with_tool(company_name_tool());
    check_stream(
        WITH_TOOLS_NAME,
        model,
        agent,
        "tell me the name of the company with the number 150. Use tools.",
        COMPANY_NAME,
    )
    .await
}
