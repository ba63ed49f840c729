//! Handles to in-flight agent runs and the events they produce

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::message::{ChatMessage, ToolCall};

/// Text produced by the top-level agent (one event per chunk when streaming)
#[derive(Debug, Clone)]
pub struct ContentEvent {
    pub agent: String,
    pub content: String,
}

/// A completed tool, sub-agent or memory call
#[derive(Debug, Clone)]
pub struct ToolEvent {
    pub agent: String,
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
    pub result: String,
    pub is_error: bool,
}

/// A tool call waiting for `AgentRun::approve`
#[derive(Debug, Clone)]
pub struct ApprovalEvent {
    pub approval_id: String,
    pub agent: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// One model call, emitted when evaluation is enabled on the agent
#[derive(Debug, Clone)]
pub struct EvalEvent {
    pub agent: String,
    /// 1-based index of the call within the agent's loop
    pub sequence: usize,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    /// Messages sent to the model
    pub messages: Vec<ChatMessage>,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub error: Option<String>,
    /// The model answered without calling tools
    pub is_final: bool,
}

#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub agent: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum RunEvent {
    Content(ContentEvent),
    Tool(ToolEvent),
    Approval(ApprovalEvent),
    Eval(EvalEvent),
    Error(ErrorEvent),
}

pub(crate) type ApprovalMap = Arc<Mutex<HashMap<String, oneshot::Sender<bool>>>>;

fn resolve_approval(approvals: &ApprovalMap, approval_id: &str, approved: bool) -> bool {
    let sender = approvals.lock().remove(approval_id);
    match sender {
        Some(tx) => tx.send(approved).is_ok(),
        None => false,
    }
}

/// Sending half shared by the run task and the sub-agents it invokes
#[derive(Clone)]
pub(crate) struct RunContext {
    pub run_id: String,
    events: mpsc::UnboundedSender<RunEvent>,
    approvals: ApprovalMap,
    /// 0 for the agent the run was started on
    pub depth: usize,
}

impl RunContext {
    /// Returns false once nobody is listening
    pub fn emit(&self, event: RunEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn child(&self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self.clone()
        }
    }

    /// Raise an approval request and wait for the decision.
    ///
    /// Denied when the run handle has been dropped.
    pub async fn request_approval(&self, agent: &str, call: &ToolCall) -> bool {
        let approval_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.approvals.lock().insert(approval_id.clone(), tx);

        let sent = self.emit(RunEvent::Approval(ApprovalEvent {
            approval_id: approval_id.clone(),
            agent: agent.to_string(),
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
        }));
        if !sent {
            resolve_approval(&self.approvals, &approval_id, false);
            return false;
        }

        debug!(run_id = %self.run_id, approval_id = %approval_id, tool = %call.name, "Waiting for approval");
        rx.await.unwrap_or(false)
    }
}

/// Handle to a run executing on a background task
pub struct AgentRun {
    id: String,
    events: mpsc::UnboundedReceiver<RunEvent>,
    approvals: ApprovalMap,
    handle: JoinHandle<Result<String>>,
}

impl AgentRun {
    /// Spawn `task` with a fresh event channel
    pub(crate) fn spawn<F, Fut>(id: String, task: F) -> Self
    where
        F: FnOnce(RunContext) -> Fut,
        Fut: std::future::Future<Output = Result<String>> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let approvals: ApprovalMap = Arc::default();
        let ctx = RunContext {
            run_id: id.clone(),
            events: tx,
            approvals: approvals.clone(),
            depth: 0,
        };
        let handle = tokio::spawn(task(ctx));

        Self {
            id,
            events: rx,
            approvals,
            handle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next event; `None` once the run has finished and all events were read
    pub async fn next(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    /// Answer an approval request. Returns false for unknown or stale ids.
    pub fn approve(&self, approval_id: &str, approved: bool) -> bool {
        resolve_approval(&self.approvals, approval_id, approved)
    }

    /// Wait for the final response, denying any approval still requested.
    ///
    /// Unread events are discarded. On timeout the run is aborted.
    pub async fn wait(mut self, timeout: Option<Duration>) -> Result<String> {
        let id = self.id.clone();
        let abort = self.handle.abort_handle();

        let finish = async {
            while let Some(event) = self.events.recv().await {
                if let RunEvent::Approval(request) = event {
                    warn!(tool = %request.tool_name, "Denying approval request left pending at wait");
                    resolve_approval(&self.approvals, &request.approval_id, false);
                }
            }
            match (&mut self.handle).await {
                Ok(result) => result,
                Err(e) => Err(anyhow::Error::new(e).context("Agent task failed")),
            }
        };

        match timeout {
            None => finish.await,
            Some(limit) => match tokio::time::timeout(limit, finish).await {
                Ok(result) => result,
                Err(_) => {
                    abort.abort();
                    anyhow::bail!("Run {} timed out after {:.1}s", id, limit.as_secs_f64())
                }
            },
        }
    }
}

impl std::fmt::Debug for AgentRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRun").field("id", &self.id).finish()
    }
}
