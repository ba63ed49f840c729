//! In-memory record of what a run did

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    Prompt,
    Response,
    ToolCall,
    ToolResult,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    pub kind: TraceKind,
    pub detail: String,
}

/// Thread-safe trace; clones append to the same log
#[derive(Debug, Clone)]
pub struct Trace {
    id: String,
    entries: Arc<Mutex<Vec<TraceEntry>>>,
}

impl Default for Trace {
    fn default() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Trace named after the session it follows
    pub fn for_session(session: &Session) -> Self {
        Self::with_id(session.id())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `$TMPDIR/agent-traces`
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join("agent-traces")
    }

    /// `trace-<id>.txt` inside `dir`
    pub fn file_path(&self, dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(format!("trace-{}.txt", self.id))
    }

    pub fn record(&self, agent: &str, kind: TraceKind, detail: impl Into<String>) {
        let detail = detail.into();
        debug!(agent, kind = ?kind, detail = %detail, "trace");
        self.entries.lock().push(TraceEntry {
            timestamp: Utc::now(),
            agent: agent.to_string(),
            kind,
            detail,
        });
    }

    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries.lock().clone()
    }

    pub fn count(&self, kind: TraceKind) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One line per step: time, agent, kind, detail (newlines escaped)
    pub fn render(&self) -> String {
        let mut out = format!("Trace {}\n", self.id);
        for entry in self.entries.lock().iter() {
            let _ = writeln!(
                out,
                "{} [{}] {:?}: {}",
                entry.timestamp.format("%H:%M:%S%.3f"),
                entry.agent,
                entry.kind,
                entry.detail.replace('\n', "\\n")
            );
        }
        out
    }

    /// Write the rendered trace to `trace-<id>.txt` in `dir`, creating it if needed
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create trace directory {}", dir.display()))?;
        let path = self.file_path(dir);
        std::fs::write(&path, self.render())
            .with_context(|| format!("Failed to write trace to {}", path.display()))?;
        info!(path = %path.display(), steps = self.len(), "Trace saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_count() {
        let trace = Trace::new();
        let shared = trace.clone();
        trace.record("coordinator", TraceKind::Prompt, "hi");
        shared.record("coordinator", TraceKind::ToolCall, "lookup_company_name");
        shared.record("expert1", TraceKind::ToolCall, "lookup_company_name");

        assert_eq!(trace.len(), 3);
        assert_eq!(trace.count(TraceKind::ToolCall), 2);
        assert_eq!(trace.entries()[2].agent, "expert1");
    }

    #[test]
    fn test_save_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::with_id("abc123");
        let trace = Trace::for_session(&session);
        trace.record("TracedAgent", TraceKind::Prompt, "Explain\nquantum computing");
        trace.record("TracedAgent", TraceKind::Response, "Qubits.");

        let path = trace.save(dir.path().join("traces")).unwrap();
        assert_eq!(path, dir.path().join("traces").join("trace-abc123.txt"));

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Trace abc123");
        assert!(lines[1].ends_with("[TracedAgent] Prompt: Explain\\nquantum computing"));
        assert!(lines[2].ends_with("[TracedAgent] Response: Qubits."));
    }

    #[test]
    fn test_concurrent_records() {
        let trace = Trace::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let trace = trace.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        trace.record(&format!("agent{}", i), TraceKind::ToolCall, "call");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(trace.count(TraceKind::ToolCall), 100);
        assert_ne!(Trace::new().id(), trace.id());
    }
}
