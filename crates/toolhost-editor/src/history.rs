//! Per-file undo history.
//!
//! Every mutating command pushes the file's pre-image before writing, so
//! `undo_edit` is a stack pop per path. History lives in memory only and is
//! lost when the server exits, the same lifetime as the instance trackers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Stack of pre-images per file path.
#[derive(Debug, Default)]
pub struct EditHistory {
    states: HashMap<PathBuf, Vec<String>>,
}

impl EditHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the content a file had before a mutation.
    pub fn push(&mut self, path: &Path, pre_image: String) {
        debug!(path = %path.display(), "recorded pre-image");
        self.states.entry(path.to_path_buf()).or_default().push(pre_image);
    }

    /// Takes the most recent pre-image for a path, if any edit was recorded.
    pub fn pop(&mut self, path: &Path) -> Option<String> {
        let stack = self.states.get_mut(path)?;
        let pre_image = stack.pop();
        if stack.is_empty() {
            self.states.remove(path);
        }
        pre_image
    }

    /// Number of recorded pre-images for a path.
    pub fn depth(&self, path: &Path) -> usize {
        self.states.get(path).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_returns_pre_images_newest_first() {
        let mut history = EditHistory::new();
        let path = Path::new("/tmp/file.txt");
        history.push(path, "v1".to_string());
        history.push(path, "v2".to_string());

        assert_eq!(history.depth(path), 2);
        assert_eq!(history.pop(path).as_deref(), Some("v2"));
        assert_eq!(history.pop(path).as_deref(), Some("v1"));
        assert_eq!(history.pop(path), None);
        assert_eq!(history.depth(path), 0);
    }

    #[test]
    fn histories_are_independent_per_path() {
        let mut history = EditHistory::new();
        history.push(Path::new("/a"), "a1".to_string());
        history.push(Path::new("/b"), "b1".to_string());

        assert_eq!(history.pop(Path::new("/a")).as_deref(), Some("a1"));
        assert_eq!(history.pop(Path::new("/b")).as_deref(), Some("b1"));
    }
}
