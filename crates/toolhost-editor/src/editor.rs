//! The editor operations behind the `text_editor` tool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::EditorError;
use crate::history::EditHistory;

/// Cap on content returned by `view`; larger files are clipped.
pub const MAX_VIEW_BYTES: usize = 10 * 1024;

const CLIP_MARKER: &str = "<response clipped>";

/// Successful outcome of one editor command.
#[derive(Debug, PartialEq)]
pub struct EditOk {
    pub message: String,
    pub content: Option<String>,
}

impl EditOk {
    fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            content: None,
        }
    }

    fn with_content(message: impl Into<String>, content: String) -> Self {
        Self {
            message: message.into(),
            content: Some(content),
        }
    }
}

/// Line range for `view`: 1-based inclusive start and end, `-1` end meaning
/// end of file.
#[derive(Debug, Clone, Copy)]
pub struct ViewRange {
    pub start: i64,
    pub end: i64,
}

/// File editor with shared undo history. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Editor {
    history: Arc<Mutex<EditHistory>>,
}

impl Editor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows a file (numbered lines, optionally ranged) or a directory
    /// listing.
    pub async fn view(
        &self,
        path: &Path,
        range: Option<ViewRange>,
    ) -> Result<EditOk, EditorError> {
        require_absolute(path)?;
        let metadata = fs::metadata(path)
            .await
            .map_err(|_| EditorError::NotFound(path.to_path_buf()))?;

        if metadata.is_dir() {
            return self.view_directory(path).await;
        }

        let text = fs::read_to_string(path).await?;
        let lines: Vec<&str> = text.split('\n').collect();
        let total = lines.len();

        let (start, end) = match range {
            Some(range) => {
                let start = if range.start < 1 { 1 } else { range.start as usize };
                let end = if range.end < 0 || range.end as usize > total {
                    total
                } else {
                    range.end as usize
                };
                (start, end)
            }
            None => (1, total),
        };

        let mut numbered = lines
            .iter()
            .enumerate()
            .skip(start.saturating_sub(1))
            .take(end.saturating_sub(start.saturating_sub(1)))
            .map(|(i, line)| format!("{}: {line}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");

        if numbered.len() > MAX_VIEW_BYTES {
            let mut cut = MAX_VIEW_BYTES;
            while !numbered.is_char_boundary(cut) {
                cut -= 1;
            }
            numbered.truncate(cut);
            numbered.push('\n');
            numbered.push_str(CLIP_MARKER);
            return Ok(EditOk::with_content("File content (truncated):", numbered));
        }
        Ok(EditOk::with_content("File content:", numbered))
    }

    async fn view_directory(&self, path: &Path) -> Result<EditOk, EditorError> {
        let mut entries = fs::read_dir(path).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();
        Ok(EditOk::with_content(
            format!("Directory listing for {}:", path.display()),
            names.join("\n"),
        ))
    }

    /// Creates or overwrites a file. An overwrite records the pre-image, so
    /// it is undoable like any other edit.
    pub async fn create(&self, path: &Path, file_text: &str) -> Result<EditOk, EditorError> {
        require_absolute(path)?;
        let existing = fs::read_to_string(path).await.ok();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, file_text).await?;

        let message = match existing {
            Some(pre_image) => {
                self.history.lock().await.push(path, pre_image);
                format!("File overwritten: {}", path.display())
            }
            None => format!("File created: {}", path.display()),
        };
        info!(path = %path.display(), "file written");
        Ok(EditOk::message(message))
    }

    /// Replaces a string that occurs exactly once in the file.
    pub async fn str_replace(
        &self,
        path: &Path,
        old_str: &str,
        new_str: &str,
    ) -> Result<EditOk, EditorError> {
        require_absolute(path)?;
        let text = fs::read_to_string(path)
            .await
            .map_err(|_| EditorError::FileNotFound(path.to_path_buf()))?;

        match text.matches(old_str).count() {
            0 => return Err(EditorError::OldStrNotFound),
            1 => {}
            n => return Err(EditorError::OldStrNotUnique(n)),
        }

        let updated = text.replacen(old_str, new_str, 1);
        self.history.lock().await.push(path, text);
        fs::write(path, updated).await?;
        Ok(EditOk::message("Successfully replaced text at exactly one location"))
    }

    /// Inserts text after the given 1-based line; line 0 inserts at the top.
    pub async fn insert(
        &self,
        path: &Path,
        insert_line: usize,
        new_str: &str,
    ) -> Result<EditOk, EditorError> {
        require_absolute(path)?;
        let text = fs::read_to_string(path)
            .await
            .map_err(|_| EditorError::FileNotFound(path.to_path_buf()))?;

        let mut lines: Vec<&str> = text.split('\n').collect();
        if insert_line > lines.len() {
            return Err(EditorError::InvalidLineNumber {
                line: insert_line,
                lines: lines.len(),
            });
        }

        lines.insert(insert_line, new_str);
        let updated = lines.join("\n");
        self.history.lock().await.push(path, text);
        fs::write(path, updated).await?;
        Ok(EditOk::message(format!(
            "Successfully inserted text after line {insert_line}"
        )))
    }

    /// Reverts the most recent recorded edit to a file.
    pub async fn undo_edit(&self, path: &Path) -> Result<EditOk, EditorError> {
        require_absolute(path)?;
        let pre_image = self
            .history
            .lock()
            .await
            .pop(path)
            .ok_or_else(|| EditorError::NoHistory(path.to_path_buf()))?;
        fs::write(path, pre_image).await?;
        Ok(EditOk::message(format!(
            "Successfully reverted last edit to {}",
            path.display()
        )))
    }
}

fn require_absolute(path: &Path) -> Result<(), EditorError> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(EditorError::PathNotAbsolute)
    }
}

/// Parses a wire path, rejecting relative ones.
pub fn parse_path(raw: &str) -> Result<PathBuf, EditorError> {
    let path = PathBuf::from(raw);
    require_absolute(&path)?;
    Ok(path)
}
