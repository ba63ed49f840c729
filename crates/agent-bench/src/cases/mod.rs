//! Built-in capability checks
//!
//! Each check builds its agents, sends a canned prompt and turns what comes
//! back into a `CaseOutcome`.

pub mod concurrent_runs;
pub mod file_attachments;
pub mod memory_persistence;
pub mod multi_agent_chain;
pub mod simple_agent;
pub mod streaming;
pub mod team_coordination;
pub mod tool_integration;
pub mod tools;

use agent_core::{AgentRun, RunEvent};
use anyhow::Result;

/// Case-insensitive containment check
pub fn validate_response(response: &str, expected: &str) -> Result<()> {
    if !response.to_lowercase().contains(&expected.to_lowercase()) {
        anyhow::bail!(
            "expected response to contain '{}', got: {}",
            expected,
            truncate(response, 200)
        );
    }
    Ok(())
}

/// First `max_chars` characters, with "..." when cut
pub fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Everything observed while draining a run
#[derive(Debug, Default)]
pub struct Collected {
    pub chunks: Vec<String>,
    /// Tool names in call order, sub-agent calls included
    pub tool_calls: Vec<String>,
}

impl Collected {
    pub fn content(&self) -> String {
        self.chunks.concat()
    }
}

/// Read events until the run ends, approving every request.
///
/// An error event ends the drain with that error.
pub async fn collect(mut run: AgentRun) -> Result<Collected> {
    let mut collected = Collected::default();
    while let Some(event) = run.next().await {
        match event {
            RunEvent::Content(e) => collected.chunks.push(e.content),
            RunEvent::Tool(e) => collected.tool_calls.push(e.tool_name),
            RunEvent::Approval(e) => {
                run.approve(&e.approval_id, true);
            }
            RunEvent::Error(e) => anyhow::bail!(e.message),
            RunEvent::Eval(_) => {}
        }
    }
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{Agent, ScriptedBackend};

    #[test]
    fn test_validate_response_ignores_case() {
        assert!(validate_response("The capital is CANBERRA.", "canberra").is_ok());

        let err = validate_response("Sydney", "Canberra").unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected response to contain 'Canberra', got: Sydney"
        );
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("✅✅✅✅", 2), "✅✅...");
    }

    #[tokio::test]
    async fn test_collect_surfaces_run_errors() {
        let model = ScriptedBackend::fallible(|_| anyhow::bail!("connection refused")).into_model("m");
        let run = Agent::new("a").with_model(model).start("hi").unwrap();

        let err = collect(run).await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }
}
