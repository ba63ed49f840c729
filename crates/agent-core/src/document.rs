//! File attachments, embedded in the prompt or retrieved on demand

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use crate::message::ToolDefinition;

/// Built-in tool that fetches a referenced document by name
pub const RETRIEVE_DOCUMENT_TOOL: &str = "retrieve_document";

/// A named blob attached to an agent's prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Document {
    pub fn in_memory(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let mime_type = mime_type_for(&name).to_string();
        Self {
            name,
            mime_type,
            data: data.into(),
        }
    }

    /// Read a file; the document is named after the file name
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::in_memory(name, data))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Attachment block appended to the user prompt
    pub fn render(&self) -> String {
        format!(
            "<document name=\"{}\" type=\"{}\">\n{}\n</document>",
            self.name,
            self.mime_type,
            self.text().trim_end()
        )
    }
}

/// Catalogue line shown in the system prompt for a referenced document
pub(crate) fn reference_line(doc: &Document) -> String {
    format!("- {} ({}, {} bytes)", doc.name, doc.mime_type, doc.data.len())
}

pub(crate) fn retrieve_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: RETRIEVE_DOCUMENT_TOOL.to_string(),
        description: "Retrieve the full content of one of the referenced documents".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Document name as listed under Documents"
                }
            },
            "required": ["name"]
        }),
    }
}

fn mime_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("txt") | Some("log") => "text/plain",
        Some("md") => "text/markdown",
        Some("json") => "application/json",
        Some("csv") => "text/csv",
        Some("html") | Some("htm") => "text/html",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_block() {
        let doc = Document::in_memory("sample.txt", "hello\n");
        assert_eq!(doc.mime_type, "text/plain");
        assert_eq!(
            doc.render(),
            "<document name=\"sample.txt\" type=\"text/plain\">\nhello\n</document>"
        );
    }

    #[test]
    fn test_from_path_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Notes").unwrap();

        let doc = Document::from_path(&path).unwrap();
        assert_eq!(doc.name, "notes.md");
        assert_eq!(doc.mime_type, "text/markdown");
        assert_eq!(doc.text(), "# Notes");
        assert!(Document::from_path(dir.path().join("missing.txt")).is_err());
    }

    #[test]
    fn test_unknown_extension() {
        assert_eq!(Document::in_memory("blob", vec![0u8]).mime_type, "application/octet-stream");
        assert_eq!(Document::in_memory("DATA.JSON", "{}").mime_type, "application/json");
    }
}
