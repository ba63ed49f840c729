use agent_core::{Agent, Model, Trace};

use super::tools::{company_name_tool, COMPANY_NAME};
use super::{collect, truncate, validate_response};
use crate::record::{CaseOutcome, RecordBuilder};

pub const NAME: &str = "ToolIntegration";

pub async fn run(model: Model) -> CaseOutcome {
    let builder = RecordBuilder::start(NAME, &model);

    let agent = Agent::new("test-agent")
        .with_model(model)
        .with_description("You are a helpful assistant that provides clear and concise answers.")
        .with_instructions(
            "Always explain your reasoning and provide examples when possible. Use tools when requested.",
        )
        .with_tool(company_name_tool())
        .with_trace(Trace::new());

    let collected = match agent.start("tell me the name of the company with the number 150. Use tools.") {
        Ok(run) => collect(run).await,
        Err(e) => Err(e),
    };
    let collected = match collected {
        Ok(collected) => collected,
        Err(e) => return builder.error("", e),
    };

    let response = collected.content();
    if let Err(e) = validate_response(&response, COMPANY_NAME) {
        return builder.error(&response, e);
    }

    let record = builder
        .ok(&response)
        .with_metadata("expected_content", COMPANY_NAME)
        .with_metadata("tool_calls", &collected.tool_calls)
        .with_metadata("response_preview", truncate(&response, 100));
    CaseOutcome::ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{ChatResponse, ScriptedBackend};
    use serde_json::json;

    #[tokio::test]
    async fn test_uses_tool_result() {
        let model = ScriptedBackend::new(|request| match request.pending_tool_results().first() {
            Some(result) => ChatResponse::text(format!("The company is {}.", result.content)),
            None => ChatResponse::tool_call("lookup_company_name", json!({"company_number": "150"})),
        })
        .into_model("m");

        let outcome = run(model).await;
        assert!(!outcome.is_failure(), "{:?}", outcome.record);
        assert_eq!(outcome.record.metadata()["tool_calls"], json!(["lookup_company_name"]));
    }

    #[tokio::test]
    async fn test_fails_without_tool() {
        let model = ScriptedBackend::reply("I do not know that company.").into_model("m");
        let outcome = run(model).await;

        assert!(outcome.is_failure());
        assert!(outcome.record.error_message().contains("'Nexxia'"));
    }
}
