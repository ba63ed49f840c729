use agent_core::{Agent, Memory, Model, Session, Trace};

use super::tools::{create_company_tool, create_invoice_tool, lookup_company_id_tool};
use super::{collect, truncate, validate_response};
use crate::record::{CaseOutcome, RecordBuilder};

pub const NAME: &str = "TeamCoordination";

const EXPECTED_ELEMENTS: [&str; 6] = ["COMPANY_ID:", "NAME:", "INVOICE_ID:", "AMOUNT:", "Nexxia", "100"];

/// Coordinator delegating to lookup, company creation and invoicing sub-agents
pub fn coordinator(model: Model) -> Agent {
    let lookup = Agent::new("lookup")
        .with_model(model.clone())
        .with_description(
            "Lookup company details by name. Return either 'COMPANY_ID: <id>; NAME: <name>' or 'NOT_FOUND' only.",
        )
        .with_instructions("Use tools to perform the lookup and return the canonical format only.")
        .with_tool(lookup_company_id_tool());

    let company_creator = Agent::new("company_creator")
        .with_model(model.clone())
        .with_description("Create a new company by name and return 'COMPANY_ID: <id>; NAME: <name>' only.")
        .with_instructions("Use tools to create the company and return the canonical format only.")
        .with_tool(create_company_tool());

    let invoice_creator = Agent::new("invoice_creator")
        .with_model(model.clone())
        .with_description(
            "Create an invoice for a given company_id and amount. Return 'INVOICE_ID: <id>; AMOUNT: <amount>' only.",
        )
        .with_instructions("Use tools to create the invoice and return the canonical format only.")
        .with_tool(create_invoice_tool());

    Agent::new("coordinator")
        .with_model(model)
        .with_description(
            "Coordinate a workflow to ensure an invoice exists for the requested company name and amount. \
Steps: 1) Call 'lookup' subagent with the company name. 2) If NOT_FOUND, call 'company_creator' to create it. \
3) Call 'invoice_creator' with the resolved company_id and the requested amount. \
Finally, return exactly: 'COMPANY_ID: <id>; NAME: <name>; INVOICE_ID: <invoice>; AMOUNT: <amount>'.",
        )
        .with_instructions(
            "Call exactly one tool at a time and wait for the response before the next call. \
Use the save_memory tool to persist important context between tool calls, especially after getting company information and getting invoice information. \
Do not add commentary.",
        )
        .with_agent(lookup)
        .with_agent(company_creator)
        .with_agent(invoice_creator)
        .with_trace(Trace::new())
        .with_memory(Memory::new())
}

pub async fn run(model: Model) -> CaseOutcome {
    let builder = RecordBuilder::start(NAME, &model);

    let agent = coordinator(model).with_session(Session::new());
    let prompt = "Create an invoice for company 'Nexxia' for the amount 100. Return the final canonical line only.";

    let collected = match agent.start(prompt) {
        Ok(run) => collect(run).await,
        Err(e) => Err(e),
    };
    let collected = match collected {
        Ok(collected) => collected,
        Err(e) => return builder.error("", e),
    };

    let response = collected.content();
    for element in EXPECTED_ELEMENTS {
        if !response.contains(element) {
            let err = validate_response(&response, element)
                .err()
                .unwrap_or_else(|| anyhow::anyhow!("expected response to contain '{}' (exact case)", element));
            return builder.error(&response, err);
        }
    }

    if !collected.tool_calls.iter().any(|t| t == "lookup") {
        return CaseOutcome::ok(builder.fail(&response, "Expected lookup subagent to be called"));
    }

    let record = builder
        .ok(&response)
        .with_metadata("tool_calls", &collected.tool_calls)
        .with_metadata("expected_elements", EXPECTED_ELEMENTS)
        .with_metadata("response_preview", truncate(&response, 100));
    CaseOutcome::ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{ChatRequest, ChatResponse, ScriptedBackend};
    use serde_json::json;

    /// Follows the workflow: each agent calls its tool once, then echoes the result
    fn workflow(request: &ChatRequest) -> ChatResponse {
        let system = request.system_prompt().unwrap_or_default();
        let results = request.pending_tool_results();

        if system.contains("Coordinate a workflow") {
            let done: Vec<&str> = request
                .messages
                .iter()
                .filter_map(|m| m.name.as_deref())
                .collect();
            return if !done.contains(&"lookup") {
                ChatResponse::tool_call("lookup", json!({"input": "Nexxia"}))
            } else if !done.contains(&"save_memory") {
                ChatResponse::tool_call("save_memory", json!({"content": "COMPANY_ID: COMP-001"}))
            } else if !done.contains(&"invoice_creator") {
                ChatResponse::tool_call("invoice_creator", json!({"input": "COMP-001 100"}))
            } else {
                ChatResponse::text("COMPANY_ID: COMP-001; NAME: Nexxia; INVOICE_ID: INV-1001; AMOUNT: 100")
            };
        }

        if let Some(result) = results.first() {
            return ChatResponse::text(result.content.clone());
        }
        if system.contains("Lookup company details") {
            ChatResponse::tool_call("lookup_company_id", json!({"name": "Nexxia"}))
        } else {
            ChatResponse::tool_call("create_invoice", json!({"company_id": "COMP-001", "amount": 100}))
        }
    }

    #[tokio::test]
    async fn test_coordinated_invoice() {
        let outcome = run(ScriptedBackend::new(workflow).into_model("m")).await;

        assert!(!outcome.is_failure(), "{:?}", outcome.record);
        let tools = &outcome.record.metadata()["tool_calls"];
        assert_eq!(tools[0], "lookup_company_id");
        assert_eq!(tools[1], "lookup");
        assert!(tools.as_array().unwrap().contains(&json!("save_memory")));
    }

    #[tokio::test]
    async fn test_missing_element_fails() {
        let model = ScriptedBackend::reply("COMPANY_ID: COMP-001; NAME: Nexxia").into_model("m");
        let outcome = run(model).await;

        assert!(outcome.error.is_some());
        assert!(outcome.record.error_message().contains("INVOICE_ID:"));
    }

    #[tokio::test]
    async fn test_requires_lookup_call() {
        let model = ScriptedBackend::reply(
            "COMPANY_ID: COMP-001; NAME: Nexxia; INVOICE_ID: INV-1001; AMOUNT: 100",
        )
        .into_model("m");
        let outcome = run(model).await;

        assert!(outcome.error.is_none());
        assert_eq!(outcome.record.error_message(), "Expected lookup subagent to be called");
    }
}
