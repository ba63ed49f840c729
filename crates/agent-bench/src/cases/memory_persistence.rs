use agent_core::memory::SAVE_MEMORY_TOOL;
use agent_core::{Agent, Memory, Model, Session, Trace};

use super::tools::{company_name_tool, supplier_name_tool};
use super::{collect, truncate, validate_response};
use crate::record::{CaseOutcome, RecordBuilder};

pub const NAME: &str = "MemoryPersistence";

const COMPANY_AGENT: &str = "lookup_company";
const SUPPLIER_AGENT: &str = "lookup_company_supplier";

/// Coordinator that saves each sub-agent result and answers with its memory
pub fn coordinator(model: Model) -> Agent {
    let lookup_company = Agent::new(COMPANY_AGENT)
        .with_model(model.clone())
        .with_description(
            "This agent allows you to look up a company name by company number. \
Please provide the request as 'lookup the company name for xxx'",
        )
        .with_instructions("Use tools to look up the company name. Return exactly 'COMPANY: <name>' and nothing else.")
        .with_tool(company_name_tool());

    let lookup_supplier = Agent::new(SUPPLIER_AGENT)
        .with_model(model.clone())
        .with_description(
            "This agent allows you to look up a supplier name by supplier number. \
The request should be in the format 'lookup the supplier name for xxx'",
        )
        .with_instructions("Use tools to look up the supplier name. Return exactly 'SUPPLIER: <name>' and nothing else.")
        .with_tool(supplier_name_tool());

    Agent::new("coordinator")
        .with_model(model)
        .with_description("You are a coordinator that executes a plan and saves the results to memory.")
        .with_instructions(
            "1) First analyse the plan and identify tasks. \
2) Execute the plan by executing each task in the order specified. \
3) Keep track of the tasks you have already executed to avoid repeating the same task. Save the tasks you have executed to memory. \
4) When saving memory, include the current memory content and append the new result so both are present. \
5) Return only the memory content (no commentary). \
Do not make up information. You must use the tools to get the information.",
        )
        .with_agent(lookup_company)
        .with_agent(lookup_supplier)
        .with_trace(Trace::new())
        .with_memory(Memory::new())
}

const PLAN: &str = "Execute the following plan: \
1) Call 'lookup_company' with input 'Look up company 150'. \
2) Save the result to memory using save_memory. \
3) Call 'lookup_company_supplier' with input 'Look up supplier 200'. \
4) Save the result to memory again, including previous memory content. \
5) When you have the company and the supplier details, then respond with exactly the full content of the run memory (no extra text).";

pub async fn run(model: Model) -> CaseOutcome {
    let builder = RecordBuilder::start(NAME, &model);

    let agent = coordinator(model).with_session(Session::new());
    let collected = match agent.start(PLAN) {
        Ok(run) => collect(run).await,
        Err(e) => Err(e),
    };
    let collected = match collected {
        Ok(collected) => collected,
        Err(e) => return builder.error("", e),
    };

    let content = collected.content();
    if let Err(e) = validate_response(&content, "nexxia") {
        let record = builder.fail(&content, "Memory should include company result (Nexxia)");
        return CaseOutcome::err(record, e);
    }
    if let Err(e) = validate_response(&content, "phoenix") {
        let record = builder.fail(&content, "Memory should include supplier result (Phoenix)");
        return CaseOutcome::err(record, e);
    }

    let tool_order = &collected.tool_calls;
    let Some(company_index) = tool_order.iter().position(|t| t == COMPANY_AGENT) else {
        return CaseOutcome::ok(builder.fail(&content, "lookup_company subagent should be called"));
    };
    let Some(supplier_index) = tool_order.iter().position(|t| t == SUPPLIER_AGENT) else {
        return CaseOutcome::ok(builder.fail(
            &content,
            "lookup_company_supplier subagent should be called",
        ));
    };

    let save_count = tool_order.iter().filter(|t| *t == SAVE_MEMORY_TOOL).count();
    if save_count < 2 {
        return CaseOutcome::ok(builder.fail(&content, "save_memory should be called at least twice"));
    }

    let record = builder
        .ok(&content)
        .with_metadata("tool_order", tool_order)
        .with_metadata("save_count", save_count)
        .with_metadata("company_index", company_index)
        .with_metadata("supplier_index", supplier_index)
        .with_metadata("response_preview", truncate(&content, 150));
    CaseOutcome::ok(record)
}
