//! The `text_editor` MCP tool.
//!
//! The input is a flat command envelope rather than a tagged union: field
//! requirements depend on `command`, and a missing field has to surface as a
//! readable `{success: false, message}` payload rather than a
//! deserialization failure.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use toolhost_mcp::{Tool, ToolContext, ToolError, ToolResult};

use crate::editor::{parse_path, EditOk, Editor, ViewRange};
use crate::error::EditorError;

#[derive(Debug, Deserialize, JsonSchema)]
struct TextEditorInput {
    /// One of `view`, `create`, `str_replace`, `insert`, `undo_edit`.
    command: String,
    /// Absolute path to the file or directory.
    path: String,
    /// Why this edit is happening; recorded in the log only.
    #[serde(default)]
    description: Option<String>,
    /// For `create`: the full content to write.
    #[serde(default)]
    file_text: Option<String>,
    /// For `view`: `[start, end]`, 1-based inclusive; `-1` end means EOF.
    #[serde(default)]
    view_range: Option<[i64; 2]>,
    /// For `str_replace`: the exact text to find (must match once).
    #[serde(default)]
    old_str: Option<String>,
    /// For `str_replace` and `insert`: the replacement/inserted text.
    #[serde(default)]
    new_str: Option<String>,
    /// For `insert`: 1-based line to insert after; 0 inserts at the top.
    #[serde(default)]
    insert_line: Option<usize>,
}

#[derive(Debug, Serialize)]
struct TextEditorReply {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

/// Views, creates, and edits files with undo history across calls.
#[derive(Debug, Clone, Default)]
pub struct TextEditorTool {
    editor: Editor,
}

impl TextEditorTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_editor(editor: Editor) -> Self {
        Self { editor }
    }

    async fn run(&self, input: TextEditorInput) -> Result<EditOk, EditorError> {
        let path = parse_path(&input.path)?;
        match input.command.as_str() {
            "view" => {
                let range = input
                    .view_range
                    .map(|[start, end]| ViewRange { start, end });
                self.editor.view(&path, range).await
            }
            "create" => {
                let file_text = input
                    .file_text
                    .ok_or(EditorError::MissingParameter("file_text"))?;
                self.editor.create(&path, &file_text).await
            }
            "str_replace" => {
                let old_str = input
                    .old_str
                    .ok_or(EditorError::MissingParameter("old_str"))?;
                let new_str = input.new_str.unwrap_or_default();
                self.editor.str_replace(&path, &old_str, &new_str).await
            }
            "insert" => {
                let insert_line = input
                    .insert_line
                    .ok_or(EditorError::MissingParameter("insert_line"))?;
                let new_str = input
                    .new_str
                    .ok_or(EditorError::MissingParameter("new_str"))?;
                self.editor.insert(&path, insert_line, &new_str).await
            }
            "undo_edit" => self.editor.undo_edit(&path).await,
            other => Err(EditorError::UnknownCommand(other.to_string())),
        }
    }
}

#[async_trait]
impl Tool for TextEditorTool {
    fn name(&self) -> &str {
        "text_editor"
    }

    fn description(&self) -> Option<&str> {
        Some("View, create, and edit files with persistent state across command calls.")
    }

    fn input_schema(&self) -> Value {
        schemars::schema_for!(TextEditorInput).to_value()
    }

    async fn execute(&self, input: Value, _context: &ToolContext) -> Result<ToolResult, ToolError> {
        let input: TextEditorInput = serde_json::from_value(input)?;
        if let Some(description) = input.description.as_deref() {
            tracing::debug!(command = %input.command, description, "editor command");
        }

        let reply = match self.run(input).await {
            Ok(ok) => TextEditorReply {
                success: true,
                message: ok.message,
                content: ok.content,
            },
            Err(e) => TextEditorReply {
                success: false,
                message: e.to_string(),
                content: None,
            },
        };
        ToolResult::json(&reply)
    }
}
