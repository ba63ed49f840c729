//! Sessions group runs and let callers cancel them together

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    cancelled: Arc<AtomicBool>,
    runs: Arc<Mutex<Vec<String>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            cancelled: Arc::new(AtomicBool::new(false)),
            runs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Stop every run in this session at its next iteration
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn register_run(&self, run_id: &str) {
        self.runs.lock().push(run_id.to_string());
    }

    /// Ids of runs started in this session, oldest first
    pub fn run_ids(&self) -> Vec<String> {
        self.runs.lock().clone()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
