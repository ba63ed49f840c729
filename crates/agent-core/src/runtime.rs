//! The agent loop: call the model, dispatch tool calls, repeat

use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::BoxFuture;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::agent::Agent;
use crate::document::RETRIEVE_DOCUMENT_TOOL;
use crate::memory::SAVE_MEMORY_TOOL;
use crate::message::{ChatMessage, ChatRequest, ChatResponse, ToolCall};
use crate::model::Model;
use crate::run::{ContentEvent, ErrorEvent, EvalEvent, RunContext, RunEvent, ToolEvent};
use crate::tool::string_arg;
use crate::trace::TraceKind;

/// Entry point of a spawned run
pub(crate) async fn drive(agent: Agent, prompt: String, ctx: RunContext) -> Result<String> {
    let result = run_agent(&agent, &prompt, &ctx).await;
    if let Err(e) = &result {
        warn!(agent = %agent.name, run_id = %ctx.run_id, error = %e, "Run failed");
        ctx.emit(RunEvent::Error(ErrorEvent {
            agent: agent.name.clone(),
            message: format!("{:#}", e),
        }));
    }
    result
}

fn record(agent: &Agent, kind: TraceKind, detail: impl Into<String>) {
    if let Some(trace) = &agent.trace {
        trace.record(&agent.name, kind, detail);
    }
}

fn run_agent<'a>(
    agent: &'a Agent,
    prompt: &'a str,
    ctx: &'a RunContext,
) -> BoxFuture<'a, Result<String>> {
    Box::pin(agent_loop(agent, prompt, ctx))
}

#[instrument(skip_all, fields(agent = %agent.name, depth = ctx.depth))]
async fn agent_loop(agent: &Agent, prompt: &str, ctx: &RunContext) -> Result<String> {
    let model = agent
        .model
        .clone()
        .with_context(|| format!("Agent '{}' has no model configured", agent.name))?;

    let user_prompt = agent.user_prompt(prompt);
    record(agent, TraceKind::Prompt, user_prompt.as_str());

    let mut messages = vec![
        ChatMessage::system(agent.system_prompt()),
        ChatMessage::user(user_prompt),
    ];
    let tool_defs = agent.tool_definitions();

    for iteration in 0..agent.max_iterations {
        if let Some(session) = agent.session.as_ref().filter(|s| s.is_cancelled()) {
            anyhow::bail!("Session {} was cancelled", session.id());
        }
        debug!(iteration, messages = messages.len(), "Starting iteration");

        // memory may have changed since the last call
        messages[0] = ChatMessage::system(agent.system_prompt());
        let request = ChatRequest::new(model.name(), messages.clone()).with_tools(tool_defs.clone());

        let started_at = Utc::now();
        let started = Instant::now();
        let mut attempt = 0;
        let outcome = loop {
            match complete(agent, &model, &request, ctx).await {
                Err(e) if attempt < agent.retries => {
                    attempt += 1;
                    warn!(attempt, retries = agent.retries, error = %e, "Model call failed, retrying");
                    record(agent, TraceKind::Error, format!("attempt {}: {:#}", attempt, e));
                }
                other => break other,
            }
        };

        let mut response = match outcome {
            Ok(response) => response,
            Err(e) => {
                record(agent, TraceKind::Error, format!("{:#}", e));
                if agent.enable_evaluation {
                    ctx.emit(RunEvent::Eval(EvalEvent {
                        agent: agent.name.clone(),
                        sequence: iteration + 1,
                        started_at,
                        duration: started.elapsed(),
                        messages: request.messages,
                        content: String::new(),
                        tool_calls: Vec::new(),
                        error: Some(format!("{:#}", e)),
                        is_final: false,
                    }));
                }
                return Err(e.context(format!("Model call failed for agent '{}'", agent.name)));
            }
        };

        if response.tool_calls.is_empty() {
            if let Some(parsed) = parse_json_tool_calls(&response.content) {
                let known: Vec<ToolCall> = parsed
                    .into_iter()
                    .filter(|c| tool_defs.iter().any(|d| d.name == c.name))
                    .collect();
                if !known.is_empty() {
                    debug!(count = known.len(), "Parsed tool calls from content JSON");
                    response.tool_calls = known;
                }
            }
        }

        let is_final = response.tool_calls.is_empty();
        if agent.enable_evaluation {
            ctx.emit(RunEvent::Eval(EvalEvent {
                agent: agent.name.clone(),
                sequence: iteration + 1,
                started_at,
                duration: started.elapsed(),
                messages: request.messages,
                content: response.content.clone(),
                tool_calls: response.tool_calls.clone(),
                error: None,
                is_final,
            }));
        }

        if is_final {
            info!(iterations = iteration + 1, "Agent completed task");
            record(agent, TraceKind::Response, response.content.as_str());
            return Ok(response.content);
        }

        messages.push(ChatMessage::assistant_with_tools(
            response.content,
            response.tool_calls.clone(),
        ));

        for call in &response.tool_calls {
            record(agent, TraceKind::ToolCall, format!("{} {}", call.name, call.arguments));
            let (result, is_error) = dispatch(agent, &model, call, ctx).await;
            record(agent, TraceKind::ToolResult, result.as_str());

            ctx.emit(RunEvent::Tool(ToolEvent {
                agent: agent.name.clone(),
                call_id: call.id.clone(),
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
                result: result.clone(),
                is_error,
            }));
            messages.push(ChatMessage::tool_result(call, result));
        }
    }

    warn!(max_iterations = agent.max_iterations, "Agent reached maximum iterations");
    anyhow::bail!(
        "Agent '{}' reached maximum iterations ({})",
        agent.name,
        agent.max_iterations
    )
}

/// One model call; streamed chunks of the top-level agent become content events
async fn complete(
    agent: &Agent,
    model: &Model,
    request: &ChatRequest,
    ctx: &RunContext,
) -> Result<ChatResponse> {
    let top_level = ctx.depth == 0;

    if !agent.stream {
        let response = model.chat(request).await?;
        if top_level && !response.content.is_empty() {
            ctx.emit(RunEvent::Content(ContentEvent {
                agent: agent.name.clone(),
                content: response.content.clone(),
            }));
        }
        return Ok(response);
    }

    let mut stream = model.chat_stream(request).await?;
    let mut response = ChatResponse::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Stream error")?;
        if !chunk.content.is_empty() {
            if top_level {
                ctx.emit(RunEvent::Content(ContentEvent {
                    agent: agent.name.clone(),
                    content: chunk.content.clone(),
                }));
            }
            response.content.push_str(&chunk.content);
        }
        response.tool_calls.extend(chunk.tool_calls);
        if chunk.usage.is_some() {
            response.usage = chunk.usage;
        }
        if chunk.done {
            break;
        }
    }

    Ok(response)
}

/// Run one tool call; returns the text for the model and whether it failed
async fn dispatch(agent: &Agent, model: &Model, call: &ToolCall, ctx: &RunContext) -> (String, bool) {
    if call.name == SAVE_MEMORY_TOOL {
        if let Some(memory) = &agent.memory {
            return match string_arg(&call.arguments, "content") {
                Some(note) => {
                    memory.save(&note);
                    ("Saved to memory".to_string(), false)
                }
                None => ("Error: save_memory requires a 'content' argument".to_string(), true),
            };
        }
    }

    if call.name == RETRIEVE_DOCUMENT_TOOL && !agent.document_references.is_empty() {
        let name = string_arg(&call.arguments, "name").unwrap_or_default();
        return match agent.document_references.iter().find(|d| d.name == name) {
            Some(doc) => (doc.render(), false),
            None => (format!("Error: document '{}' not found", name), true),
        };
    }

    if let Some(tool) = agent.tools.iter().find(|t| t.name == call.name) {
        if tool.require_approval && !ctx.request_approval(&agent.name, call).await {
            info!(tool = %tool.name, "Tool call denied");
            return (format!("Tool call '{}' was denied by the user", tool.name), true);
        }
        let result = tool.call(&call.arguments);
        return (result.content, result.is_error);
    }

    if let Some(sub) = agent.agents.iter().find(|a| a.name == call.name) {
        let input = string_arg(&call.arguments, "input")
            .unwrap_or_else(|| call.arguments.to_string());

        let mut child = sub.clone();
        if child.model.is_none() {
            child.model = Some(model.clone());
        }
        if child.trace.is_none() {
            child.trace = agent.trace.clone();
        }
        if child.session.is_none() {
            child.session = agent.session.clone();
        }

        debug!(sub_agent = %child.name, "Delegating to sub-agent");
        return match run_agent(&child, &input, &ctx.child()).await {
            Ok(output) => (output, false),
            Err(e) => (format!("Error: {:#}", e), true),
        };
    }

    warn!(tool = %call.name, "Model called an unknown tool");
    (format!("Tool not found: {}", call.name), true)
}

#[derive(Deserialize)]
struct ToolCallJson {
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl ToolCallJson {
    fn into_call(self) -> Option<ToolCall> {
        if self.name.is_empty() {
            return None;
        }
        Some(ToolCall {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name,
            arguments: self.arguments,
        })
    }
}

/// Tool calls written as JSON in the content (models without native tool calling)
///
/// Accepts a single `{"name", "arguments"}` object, an array of them, either one
/// inside a fenced code block, or objects embedded in surrounding prose.
fn parse_json_tool_calls(content: &str) -> Option<Vec<ToolCall>> {
    let content = content.trim();
    if content.is_empty() {
        return None;
    }

    let json_content = extract_json_from_markdown(content).unwrap_or(content);

    if let Ok(single) = serde_json::from_str::<ToolCallJson>(json_content) {
        return single.into_call().map(|c| vec![c]);
    }

    if let Ok(many) = serde_json::from_str::<Vec<ToolCallJson>>(json_content) {
        let calls: Vec<ToolCall> = many.into_iter().filter_map(ToolCallJson::into_call).collect();
        return (!calls.is_empty()).then_some(calls);
    }

    let calls = extract_json_objects(content);
    (!calls.is_empty()).then_some(calls)
}

fn extract_json_from_markdown(content: &str) -> Option<&str> {
    for fence in ["```json\n", "```JSON\n", "```\n"] {
        if let Some(start) = content.find(fence) {
            let body = start + fence.len();
            if let Some(end) = content[body..].find("```") {
                return Some(content[body..body + end].trim());
            }
        }
    }
    None
}

fn extract_json_objects(content: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    let mut depth = 0usize;
    let mut start = None;

    for (i, c) in content.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        if let Some(call) = serde_json::from_str::<ToolCallJson>(&content[s..=i])
                            .ok()
                            .and_then(ToolCallJson::into_call)
                        {
                            calls.push(call);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Memory;
    use crate::message::Role;
    use crate::providers::ScriptedBackend;
    use crate::session::Session;
    use crate::tool::{AgentTool, ParameterProperty, ParameterSchema, ToolResult};
    use crate::trace::Trace;
    use serde_json::json;

    fn company_tool() -> AgentTool {
        AgentTool::new(
            "lookup_company_name",
            "Look up a company name by number",
            ParameterSchema::new()
                .with_required("company_number", ParameterProperty::string("Company number")),
            |_| Ok(ToolResult::success("Nexxia")),
        )
    }

    /// Calls the company tool once, then answers with whatever it returned
    fn tool_then_answer() -> ScriptedBackend {
        ScriptedBackend::new(|request| match request.pending_tool_results().first() {
            Some(result) => ChatResponse::text(format!("The company is {}", result.content)),
            None => ChatResponse::tool_call("lookup_company_name", json!({"company_number": "150"})),
        })
    }

    #[tokio::test]
    async fn test_execute_plain_answer() {
        let agent = Agent::new("simple")
            .with_model(ScriptedBackend::reply("Canberra is the capital.").into_model("m"));
        assert_eq!(agent.execute("capital?").await.unwrap(), "Canberra is the capital.");
    }

    #[tokio::test]
    async fn test_tool_round_trip_emits_events() {
        let agent = Agent::new("tools")
            .with_model(tool_then_answer().into_model("m"))
            .with_tool(company_tool())
            .with_evaluation(true);

        let mut run = agent.start("Who is company 150?").unwrap();
        let mut tool_events = Vec::new();
        let mut content = String::new();
        let mut evals = 0;
        while let Some(event) = run.next().await {
            match event {
                RunEvent::Tool(t) => tool_events.push(t),
                RunEvent::Content(c) => content.push_str(&c.content),
                RunEvent::Eval(_) => evals += 1,
                _ => {}
            }
        }

        assert_eq!(tool_events.len(), 1);
        assert_eq!(tool_events[0].result, "Nexxia");
        assert!(!tool_events[0].is_error);
        assert_eq!(content, "The company is Nexxia");
        assert_eq!(evals, 2);
        assert_eq!(run.wait(None).await.unwrap(), "The company is Nexxia");
    }

    #[tokio::test]
    async fn test_streaming_emits_chunks() {
        let agent = Agent::new("streamer")
            .with_model(ScriptedBackend::reply("Paris is the capital of France").into_model("m"))
            .with_streaming(true);

        let mut run = agent.start("capital of France?").unwrap();
        let mut chunks = 0;
        while let Some(event) = run.next().await {
            if let RunEvent::Content(_) = event {
                chunks += 1;
            }
        }
        assert_eq!(chunks, 6);
    }

    #[tokio::test]
    async fn test_sub_agent_inherits_model_and_reports_tools() {
        let backend = ScriptedBackend::new(|request| {
            let system = request.system_prompt().unwrap_or_default();
            let pending = request.pending_tool_results();
            if system.starts_with("Company expert") {
                match pending.first() {
                    Some(r) => ChatResponse::text(format!("COMPANY: {}", r.content)),
                    None => ChatResponse::tool_call(
                        "lookup_company_name",
                        json!({"company_number": "150"}),
                    ),
                }
            } else {
                match pending.first() {
                    Some(r) => ChatResponse::text(format!("Final: {}", r.content)),
                    None => ChatResponse::tool_call("expert1", json!({"input": "company 150"})),
                }
            }
        });

        let trace = Trace::new();
        let coordinator = Agent::new("coordinator")
            .with_model(backend.clone().into_model("m"))
            .with_trace(trace.clone())
            .with_agent(
                Agent::new("expert1")
                    .with_description("Company expert")
                    .with_tool(company_tool()),
            );

        let mut run = coordinator.start("Who is 150?").unwrap();
        let mut tools = Vec::new();
        while let Some(event) = run.next().await {
            if let RunEvent::Tool(t) = event {
                tools.push((t.agent, t.tool_name));
            }
        }

        assert_eq!(
            tools,
            vec![
                ("expert1".to_string(), "lookup_company_name".to_string()),
                ("coordinator".to_string(), "expert1".to_string()),
            ]
        );
        assert_eq!(run.wait(None).await.unwrap(), "Final: COMPANY: Nexxia");
        assert_eq!(backend.calls(), 4);
        assert_eq!(trace.count(TraceKind::ToolCall), 2);
    }

    #[tokio::test]
    async fn test_save_memory_updates_prompt() {
        let memory = Memory::new();
        let backend = ScriptedBackend::new(|request| {
            if request.pending_tool_results().is_empty() {
                ChatResponse::tool_call(SAVE_MEMORY_TOOL, json!({"content": "COMPANY: Nexxia"}))
            } else {
                let system = request.system_prompt().unwrap_or_default();
                ChatResponse::text(if system.contains("COMPANY: Nexxia") {
                    "remembered"
                } else {
                    "forgot"
                })
            }
        });
        let agent = Agent::new("memo")
            .with_model(backend.into_model("m"))
            .with_memory(memory.clone());

        assert_eq!(agent.execute("remember").await.unwrap(), "remembered");
        assert_eq!(memory.content(), "COMPANY: Nexxia");
    }

    #[tokio::test]
    async fn test_denied_approval_is_reported_to_model() {
        let backend = ScriptedBackend::new(|request| match request.pending_tool_results().first() {
            Some(result) => ChatResponse::text(result.content.clone()),
            None => ChatResponse::tool_call("delete_file", json!({"path": "a.txt"})),
        });
        let tool = AgentTool::new("delete_file", "Delete a file", ParameterSchema::new(), |_| {
            Ok(ToolResult::success("deleted"))
        })
        .with_approval();
        let agent = Agent::new("careful")
            .with_model(backend.into_model("m"))
            .with_tool(tool);

        let mut run = agent.start("delete a.txt").unwrap();
        let mut last_tool = None;
        while let Some(event) = run.next().await {
            match event {
                RunEvent::Approval(req) => {
                    assert!(run.approve(&req.approval_id, false));
                }
                RunEvent::Tool(t) => last_tool = Some(t),
                _ => {}
            }
        }

        let tool_event = last_tool.unwrap();
        assert!(tool_event.is_error);
        assert!(tool_event.result.contains("denied"));
    }

    #[tokio::test]
    async fn test_max_iterations_is_an_error() {
        let backend = ScriptedBackend::new(|_| {
            ChatResponse::tool_call("lookup_company_name", json!({"company_number": "1"}))
        });
        let agent = Agent::new("looping")
            .with_model(backend.into_model("m"))
            .with_tool(company_tool())
            .with_max_iterations(3);

        let mut run = agent.start("loop").unwrap();
        let mut saw_error = false;
        while let Some(event) = run.next().await {
            if let RunEvent::Error(e) = event {
                saw_error = e.message.contains("maximum iterations (3)");
            }
        }
        assert!(saw_error);
        assert!(run.wait(None).await.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_session_stops_run() {
        let session = Session::new();
        session.cancel();
        let agent = Agent::new("a")
            .with_model(ScriptedBackend::reply("hi").into_model("m"))
            .with_session(session.clone());

        let err = agent.execute("hello").await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
        assert_eq!(session.run_ids().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_model_call_is_retried() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let failures = Arc::new(AtomicUsize::new(0));
        let seen = failures.clone();
        let backend = ScriptedBackend::fallible(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                anyhow::bail!("temporary network error");
            }
            Ok(ChatResponse::text("recovered"))
        });

        let trace = Trace::new();
        let agent = Agent::new("resilient")
            .with_model(backend.clone().into_model("m"))
            .with_trace(trace.clone())
            .with_retries(2);
        assert_eq!(agent.execute("go").await.unwrap(), "recovered");
        assert_eq!(backend.calls(), 3);
        assert_eq!(trace.count(TraceKind::Error), 2);

        failures.store(0, Ordering::SeqCst);
        let impatient = Agent::new("impatient")
            .with_model(backend.into_model("m"))
            .with_retries(1);
        let err = impatient.execute("go").await.unwrap_err();
        assert!(format!("{:#}", err).contains("temporary network error"));
    }

    #[tokio::test]
    async fn test_referenced_document_is_retrieved_on_demand() {
        use crate::document::Document;

        let backend = ScriptedBackend::new(|request| match request.pending_tool_results().first() {
            Some(result) => ChatResponse::text(result.content.clone()),
            None if request.last_user_message().unwrap_or_default().contains("missing") => {
                ChatResponse::tool_call(RETRIEVE_DOCUMENT_TOOL, json!({"name": "nope.txt"}))
            }
            None => ChatResponse::tool_call(RETRIEVE_DOCUMENT_TOOL, json!({"name": "pricing.txt"})),
        });
        let agent = Agent::new("docs")
            .with_model(backend.into_model("m"))
            .with_document_reference(Document::in_memory("pricing.txt", "Pro Tier: 1000 requests/hour"));

        let answer = agent.execute("rate limits?").await.unwrap();
        assert!(answer.contains("<document name=\"pricing.txt\""));
        assert!(answer.contains("Pro Tier: 1000 requests/hour"));

        assert_eq!(
            agent.execute("the missing one").await.unwrap(),
            "Error: document 'nope.txt' not found"
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported() {
        let backend = ScriptedBackend::new(|request| {
            let last = request.messages.last().map(|m| m.role);
            if last == Some(Role::Tool) {
                ChatResponse::text(request.messages.last().map(|m| m.content.clone()).unwrap_or_default())
            } else {
                ChatResponse::tool_call("missing", json!({}))
            }
        });
        let agent = Agent::new("a").with_model(backend.into_model("m"));
        assert_eq!(agent.execute("x").await.unwrap(), "Tool not found: missing");
    }

    #[test]
    fn test_parse_json_tool_call_raw() {
        let content = r#"{"name": "lookup_company_name", "arguments": {"company_number": "150"}}"#;
        let calls = parse_json_tool_calls(content).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "lookup_company_name");
    }

    #[test]
    fn test_parse_json_tool_call_markdown() {
        let content = "```json\n{\"name\": \"create_invoice\", \"arguments\": {\"amount\": 100}}\n```";
        let calls = parse_json_tool_calls(content).unwrap();
        assert_eq!(calls[0].arguments, json!({"amount": 100}));
    }

    #[test]
    fn test_parse_json_tool_call_with_text() {
        let content = "Let me check.\n{\"name\": \"expert1\", \"arguments\": {\"input\": \"150\"}}\nDone.";
        let calls = parse_json_tool_calls(content).unwrap();
        assert_eq!(calls[0].name, "expert1");
    }

    #[test]
    fn test_parse_json_tool_call_array() {
        let content = r#"[{"name": "a", "arguments": {}}, {"name": "b", "arguments": {}}]"#;
        assert_eq!(parse_json_tool_calls(content).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_json_tool_call_no_match() {
        assert!(parse_json_tool_calls("Just a regular answer.").is_none());
        assert!(parse_json_tool_calls("unbalanced } brace {").is_none());
    }
}
