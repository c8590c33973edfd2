//! The `Tool` trait and its result/context types.
//!
//! Toolhost tools return their full outcome as JSON embedded in text content,
//! the shape MCP clients expect. A failed *operation* (bad instance id, dead
//! process) is still a successful tool call whose payload carries an `error`
//! field; [`ToolResult::is_error`] is advisory metadata layered on top, never
//! a substitute for the body.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

/// A tool callable through `tools/call`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name of the tool within a server.
    fn name(&self) -> &str;

    /// One-line description shown to the orchestrating model.
    fn description(&self) -> Option<&str> {
        None
    }

    /// JSON schema for the tool's input.
    fn input_schema(&self) -> Value;

    /// Executes the tool.
    ///
    /// Implementations fold operation-level failures into the returned
    /// payload; a `ToolError` here means the plumbing itself failed (for
    /// example, undeserializable input).
    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError>;
}

/// Metadata for one registered tool, as reported by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,

    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Input schema.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    /// Content items returned to the client.
    pub content: Vec<ToolContent>,

    /// Advisory error flag.
    #[serde(skip_serializing_if = "Option::is_none", rename = "isError")]
    pub is_error: Option<bool>,
}

impl ToolResult {
    /// Success result carrying a JSON payload serialized into text content.
    pub fn json(value: &impl Serialize) -> Result<Self, ToolError> {
        let text = serde_json::to_string(value).map_err(ToolError::InvalidInput)?;
        Ok(Self {
            content: vec![ToolContent::text(text)],
            is_error: None,
        })
    }

    /// Like [`ToolResult::json`] but flagged as an error result.
    ///
    /// Used when the operation failed outright (for example the process never
    /// spawned) while the reply still has to be a well-formed payload.
    pub fn json_error(value: &impl Serialize) -> Result<Self, ToolError> {
        let mut result = Self::json(value)?;
        result.is_error = Some(true);
        Ok(result)
    }

    /// Success result with plain text content.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
            is_error: None,
        }
    }

    /// Whether the advisory error flag is set.
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

/// One content item in a tool result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text.
        text: String,
    },
}

impl ToolContent {
    /// Creates text content.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Returns the text of a text item.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
        }
    }
}

/// Per-call context handed to tools.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    request_id: Option<Value>,
}

impl ToolContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context carrying the JSON-RPC request id.
    pub fn with_request_id(request_id: Value) -> Self {
        Self {
            request_id: Some(request_id),
        }
    }

    /// The JSON-RPC request id, when dispatched from a server loop.
    pub fn request_id(&self) -> Option<&Value> {
        self.request_id.as_ref()
    }
}
