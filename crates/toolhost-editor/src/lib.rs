//! File viewing and editing with per-file undo history.
//!
//! The `text_editor` tool drives an [`Editor`] whose mutating commands
//! record each file's pre-image before writing; `undo_edit` walks that stack
//! back one step at a time. History is in-memory and process-local.

pub mod editor;
pub mod error;
pub mod history;
pub mod tools;

pub use editor::{Editor, ViewRange, MAX_VIEW_BYTES};
pub use error::EditorError;
pub use history::EditHistory;
pub use tools::TextEditorTool;
