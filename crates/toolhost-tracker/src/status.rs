//! The status taxonomy shared by every tracked instance.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a tracked instance.
///
/// `Running` is the only non-terminal state. Transitions are monotonic: once
/// an instance reaches a terminal status it never changes again, even if a
/// later event (such as the real OS exit of an already-terminated process)
/// reports something different.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The instance is still doing work.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with a failure.
    Error,
    /// Stopped by an explicit termination (signal or operator request).
    Terminated,
}

impl RunStatus {
    /// True for `Completed`, `Error`, and `Terminated`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
            RunStatus::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Status filter accepted by the listing tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    /// No filtering.
    #[default]
    All,
    /// Only running instances.
    Running,
    /// Only completed instances.
    Completed,
    /// Only errored instances.
    Error,
    /// Only terminated instances.
    Terminated,
}

impl StatusFilter {
    /// Whether an instance with the given status passes the filter.
    pub fn matches(self, status: RunStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Running => status == RunStatus::Running,
            StatusFilter::Completed => status == RunStatus::Completed,
            StatusFilter::Error => status == RunStatus::Error,
            StatusFilter::Terminated => status == RunStatus::Terminated,
        }
    }
}
