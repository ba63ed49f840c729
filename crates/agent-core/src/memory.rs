//! Agent memory: a text buffer rendered into the system prompt

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use serde_json::json;

use crate::message::ToolDefinition;

/// Name of the built-in tool that appends to memory
pub const SAVE_MEMORY_TOOL: &str = "save_memory";

/// Shared, append-only notes. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    content: Arc<Mutex<String>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        self.content.lock()
    }

    /// Append a note on its own line
    pub fn save(&self, note: &str) {
        let note = note.trim();
        if note.is_empty() {
            return;
        }
        let mut content = self.lock();
        if !content.is_empty() {
            content.push('\n');
        }
        content.push_str(note);
    }

    pub fn content(&self) -> String {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Definition of the `save_memory` tool
    pub fn tool_definition() -> ToolDefinition {
        ToolDefinition {
            name: SAVE_MEMORY_TOOL.to_string(),
            description: "Save important information to memory so it is available in later steps."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "content": {
                        "type": "string",
                        "description": "The information to remember"
                    }
                },
                "required": ["content"]
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_appends_lines() {
        let memory = Memory::new();
        memory.save("COMPANY: Nexxia");
        memory.save("  ");
        memory.save("SUPPLIER: Phoenix");

        assert_eq!(memory.content(), "COMPANY: Nexxia\nSUPPLIER: Phoenix");
    }

    #[test]
    fn test_clones_share_buffer() {
        let memory = Memory::new();
        let other = memory.clone();
        other.save("shared");
        assert!(!memory.is_empty());

        memory.clear();
        assert!(other.is_empty());
    }
}
