//! Agent definition and its builder

use anyhow::Result;
use serde_json::json;
use tracing::info;

use crate::document::{self, Document, RETRIEVE_DOCUMENT_TOOL};
use crate::memory::Memory;
use crate::message::ToolDefinition;
use crate::model::Model;
use crate::run::AgentRun;
use crate::runtime;
use crate::session::Session;
use crate::tool::AgentTool;
use crate::trace::Trace;

pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// An LLM-backed agent with tools, sub-agents and optional memory
#[derive(Debug, Clone)]
pub struct Agent {
    pub name: String,
    pub description: String,
    pub instructions: String,
    /// Sub-agents without a model inherit their caller's
    pub model: Option<Model>,
    pub tools: Vec<AgentTool>,
    /// Exposed to the model as tools taking a single `input` argument
    pub agents: Vec<Agent>,
    pub documents: Vec<Document>,
    /// Listed in the system prompt and fetched through `retrieve_document`
    pub document_references: Vec<Document>,
    pub memory: Option<Memory>,
    pub session: Option<Session>,
    pub trace: Option<Trace>,
    /// Emit one content event per streamed chunk instead of one per response
    pub stream: bool,
    pub enable_evaluation: bool,
    pub max_iterations: usize,
    /// Extra attempts for a failed model call
    pub retries: usize,
}

impl Agent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instructions: String::new(),
            model: None,
            tools: Vec::new(),
            agents: Vec::new(),
            documents: Vec::new(),
            document_references: Vec::new(),
            memory: None,
            session: None,
            trace: None,
            stream: false,
            enable_evaluation: false,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            retries: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_tool(mut self, tool: AgentTool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.documents.push(document);
        self
    }

    pub fn with_document_reference(mut self, document: Document) -> Self {
        self.document_references.push(document);
        self
    }

    pub fn with_memory(mut self, memory: Memory) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_evaluation(mut self, enabled: bool) -> Self {
        self.enable_evaluation = enabled;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Run to completion and return the final response
    pub async fn execute(&self, prompt: &str) -> Result<String> {
        self.start(prompt)?.wait(None).await
    }

    /// Start a run on a background task
    pub fn start(&self, prompt: &str) -> Result<AgentRun> {
        if self.model.is_none() {
            anyhow::bail!("Agent '{}' has no model configured", self.name);
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        if let Some(session) = &self.session {
            session.register_run(&run_id);
        }
        info!(agent = %self.name, run_id = %run_id, "Starting run");

        let agent = self.clone();
        let prompt = prompt.to_string();
        Ok(AgentRun::spawn(run_id, move |ctx| runtime::drive(agent, prompt, ctx)))
    }

    /// System prompt for the next model call (memory is re-read each time)
    pub fn system_prompt(&self) -> String {
        let mut sections: Vec<String> = Vec::new();

        if !self.description.is_empty() {
            sections.push(self.description.clone());
        }
        if !self.instructions.is_empty() {
            sections.push(self.instructions.clone());
        }
        if let Some(memory) = self.memory.as_ref().filter(|m| !m.is_empty()) {
            sections.push(format!("## Memory\n{}", memory.content()));
        }
        if !self.document_references.is_empty() {
            let list = self
                .document_references
                .iter()
                .map(document::reference_line)
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!(
                "## Documents\nUse {} to read any of these when needed:\n{}",
                RETRIEVE_DOCUMENT_TOOL, list
            ));
        }

        let tools = self.tool_definitions();
        if !tools.is_empty() {
            let list = tools
                .iter()
                .map(|t| format!("- {}: {}", t.name, t.description))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!("## Available Tools\n{}", list));
        }

        sections.join("\n\n")
    }

    /// User prompt with attached documents
    pub fn user_prompt(&self, prompt: &str) -> String {
        let mut text = prompt.to_string();
        for doc in &self.documents {
            text.push_str("\n\n");
            text.push_str(&doc.render());
        }
        text
    }

    /// Tools advertised to the model: agent tools, sub-agents, retrieve_document, save_memory
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.iter().map(AgentTool::definition).collect();

        defs.extend(self.agents.iter().map(|sub| ToolDefinition {
            name: sub.name.clone(),
            description: if sub.description.is_empty() {
                format!("Delegate a task to the {} agent", sub.name)
            } else {
                sub.description.clone()
            },
            parameters: json!({
                "type": "object",
                "properties": {
                    "input": {
                        "type": "string",
                        "description": "The task or question for this agent"
                    }
                },
                "required": ["input"]
            }),
        }));

        if !self.document_references.is_empty() {
            defs.push(document::retrieve_tool_definition());
        }
        if self.memory.is_some() {
            defs.push(Memory::tool_definition());
        }
        defs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SAVE_MEMORY_TOOL;
    use crate::tool::{ParameterSchema, ToolResult};

    fn lookup_tool() -> AgentTool {
        AgentTool::new("lookup", "Look something up", ParameterSchema::new(), |_| {
            Ok(ToolResult::success("found"))
        })
    }

    #[test]
    fn test_tool_definitions_order() {
        let agent = Agent::new("coordinator")
            .with_tool(lookup_tool())
            .with_agent(Agent::new("expert1").with_description("Company expert"))
            .with_memory(Memory::new());

        let names: Vec<String> = agent.tool_definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["lookup", "expert1", SAVE_MEMORY_TOOL]);
        assert_eq!(
            agent.tool_definitions()[1].parameters["required"],
            json!(["input"])
        );
    }

    #[test]
    fn test_system_prompt_includes_memory() {
        let memory = Memory::new();
        let agent = Agent::new("a")
            .with_description("You are a coordinator.")
            .with_instructions("Be brief.")
            .with_memory(memory.clone());

        assert!(!agent.system_prompt().contains("## Memory"));

        memory.save("COMPANY: Nexxia");
        let prompt = agent.system_prompt();
        assert!(prompt.starts_with("You are a coordinator.\n\nBe brief."));
        assert!(prompt.contains("## Memory\nCOMPANY: Nexxia"));
        assert!(prompt.contains("- save_memory:"));
    }

    #[test]
    fn test_user_prompt_attaches_documents() {
        let agent = Agent::new("a").with_document(Document::in_memory("sample.txt", "data"));
        let prompt = agent.user_prompt("Summarize");
        assert!(prompt.starts_with("Summarize\n\n<document name=\"sample.txt\""));
    }

    #[test]
    fn test_document_references_are_listed_not_embedded() {
        let agent = Agent::new("docs")
            .with_document_reference(Document::in_memory("guide.txt", "Free Plan: 10GB"))
            .with_memory(Memory::new());

        assert_eq!(agent.user_prompt("pricing?"), "pricing?");
        let prompt = agent.system_prompt();
        assert!(prompt.contains("## Documents\nUse retrieve_document"));
        assert!(prompt.contains("- guide.txt (text/plain, 15 bytes)"));
        assert!(!prompt.contains("10GB"));

        let names: Vec<String> = agent.tool_definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec![RETRIEVE_DOCUMENT_TOOL, SAVE_MEMORY_TOOL]);
    }

    #[test]
    fn test_start_requires_model() {
        let err = Agent::new("lonely").start("hi").unwrap_err();
        assert!(err.to_string().contains("no model"));
    }
}
