//! Function tools an agent can expose to its model

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::ToolDefinition;

/// Output of a tool handler, fed back to the model as a tool message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Schema for a tool parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterProperty {
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl ParameterProperty {
    fn typed(param_type: &str, description: impl Into<String>) -> Self {
        Self {
            param_type: param_type.to_string(),
            description: description.into(),
            enum_values: None,
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::typed("string", description)
    }

    pub fn number(description: impl Into<String>) -> Self {
        Self::typed("number", description)
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::typed("boolean", description)
    }

    pub fn with_enum(mut self, values: Vec<String>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// JSON schema of a tool's argument object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: BTreeMap<String, ParameterProperty>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, prop: ParameterProperty) -> Self {
        self.properties.insert(name.into(), prop);
        self
    }

    pub fn with_required(mut self, name: impl Into<String>, prop: ParameterProperty) -> Self {
        let name = name.into();
        self.properties.insert(name.clone(), prop);
        self.required.push(name);
        self
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self::new()
    }
}

type Handler = dyn Fn(&Value) -> Result<ToolResult> + Send + Sync;

/// A named function the model may call
#[derive(Clone)]
pub struct AgentTool {
    pub name: String,
    pub description: String,
    pub input_schema: ParameterSchema,
    /// Calls wait for an approval decision before running
    pub require_approval: bool,
    handler: Arc<Handler>,
}

impl AgentTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: ParameterSchema,
        handler: F,
    ) -> Self
    where
        F: Fn(&Value) -> Result<ToolResult> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            require_approval: false,
            handler: Arc::new(handler),
        }
    }

    pub fn with_approval(mut self) -> Self {
        self.require_approval = true;
        self
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema.to_value(),
        }
    }

    /// Run the handler; handler errors become error results for the model
    pub fn call(&self, arguments: &Value) -> ToolResult {
        match (self.handler)(arguments) {
            Ok(result) => result,
            Err(e) => ToolResult::error(format!("Error: {}", e)),
        }
    }
}

impl fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentTool")
            .field("name", &self.name)
            .field("require_approval", &self.require_approval)
            .finish()
    }
}

/// Read a string argument, accepting numbers as well
pub fn string_arg(arguments: &Value, key: &str) -> Option<String> {
    match arguments.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_tool() -> AgentTool {
        AgentTool::new(
            "echo",
            "Echo the input",
            ParameterSchema::new().with_required("text", ParameterProperty::string("Text to echo")),
            |args| match string_arg(args, "text") {
                Some(text) => Ok(ToolResult::success(text)),
                None => anyhow::bail!("missing text"),
            },
        )
    }

    #[test]
    fn test_definition_schema() {
        let def = echo_tool().definition();
        assert_eq!(def.name, "echo");
        assert_eq!(def.parameters["type"], json!("object"));
        assert_eq!(def.parameters["properties"]["text"]["type"], json!("string"));
        assert_eq!(def.parameters["required"], json!(["text"]));
        assert!(def.parameters["properties"]["text"].get("enum").is_none());
    }

    #[test]
    fn test_handler_error_becomes_error_result() {
        let tool = echo_tool();
        assert_eq!(tool.call(&json!({"text": "hi"})), ToolResult::success("hi"));

        let failed = tool.call(&json!({}));
        assert!(failed.is_error);
        assert_eq!(failed.content, "Error: missing text");
    }

    #[test]
    fn test_string_arg_accepts_numbers() {
        let args = json!({"amount": 100, "name": "Nexxia", "flag": true});
        assert_eq!(string_arg(&args, "amount").as_deref(), Some("100"));
        assert_eq!(string_arg(&args, "name").as_deref(), Some("Nexxia"));
        assert_eq!(string_arg(&args, "flag"), None);
    }
}
