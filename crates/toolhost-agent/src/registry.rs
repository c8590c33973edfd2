//! Shared registry of agent instances.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use toolhost_tracker::{InstanceTracker, RunStatus, StatusFilter};
use tracing::info;
use uuid::Uuid;

use crate::entry::AgentEntry;
use crate::error::AgentError;

/// Parameters for registering a new agent.
#[derive(Debug, Clone)]
pub struct AgentBrief {
    pub description: String,
    pub goal: String,
    pub project_context: String,
    pub working_dir: PathBuf,
    pub relevant_files: Option<String>,
}

impl AgentBrief {
    /// Assembles the prompt handed to the runner, one labeled line per
    /// provided field.
    pub fn prompt(&self) -> String {
        let mut lines = vec![
            format!("Description: {}", self.description),
            format!("Goal: {}", self.goal),
            format!("Project Context: {}", self.project_context),
            format!("Working Directory: {}", self.working_dir.display()),
        ];
        if let Some(files) = &self.relevant_files {
            lines.push(format!("Relevant Files:\n  {files}"));
        }
        lines.join("\n")
    }
}

/// Outcome reported by an agent runner.
#[derive(Debug, Clone)]
pub enum AgentOutcome {
    Completed { result: String },
    Failed { error: String },
}

/// Shared registry of agents. Cheap to clone; every clone refers to the same
/// table.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    inner: Arc<Mutex<InstanceTracker<AgentEntry>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new agent in `running` status.
    pub async fn register(&self, brief: &AgentBrief) -> Uuid {
        let prompt = brief.prompt();
        let mut tracker = self.inner.lock().await;
        let id = tracker.register_with(|id| {
            AgentEntry::new(
                id,
                brief.description.clone(),
                brief.goal.clone(),
                prompt.clone(),
                brief.working_dir.clone(),
            )
        });
        info!(%id, goal = %brief.goal, "registered agent");
        id
    }

    /// Snapshot of one agent.
    pub async fn snapshot(&self, id: Uuid) -> Result<AgentEntry, AgentError> {
        let tracker = self.inner.lock().await;
        tracker
            .get(id)
            .cloned()
            .ok_or(AgentError::UnknownInstance(id))
    }

    /// Snapshots of all agents in start order, narrowed by status.
    pub async fn list(&self, filter: StatusFilter) -> Vec<AgentEntry> {
        let tracker = self.inner.lock().await;
        tracker.list(filter).into_iter().cloned().collect()
    }

    /// Appends progress output from the runner. Ignored once terminal, so a
    /// straggling runner cannot touch a terminated agent.
    pub async fn append_output(&self, id: Uuid, chunk: &str) {
        let mut tracker = self.inner.lock().await;
        if let Some(entry) = tracker.get_mut(id) {
            if entry.status == RunStatus::Running {
                entry.output.push_str(chunk);
            }
        }
    }

    /// Queues a guidance line for the runner to pick up.
    pub async fn add_guidance(&self, id: Uuid, guidance: &str) -> Result<(), AgentError> {
        let mut tracker = self.inner.lock().await;
        let entry = tracker.get_mut(id).ok_or(AgentError::UnknownInstance(id))?;
        entry.guidance.push(guidance.to_string());
        Ok(())
    }

    /// Applies the runner's terminal outcome.
    ///
    /// A no-op when the agent was already terminated: the abort wins over a
    /// runner that finishes anyway, same rule as a killed shell process.
    pub async fn finish(&self, id: Uuid, outcome: AgentOutcome) -> bool {
        let mut tracker = self.inner.lock().await;
        match outcome {
            AgentOutcome::Completed { result } => {
                tracker.update_status(id, RunStatus::Completed, |entry| {
                    entry.result = Some(result);
                })
            }
            AgentOutcome::Failed { error } => {
                tracker.update_status(id, RunStatus::Error, |entry| {
                    entry.error = Some(error);
                })
            }
        }
    }

    /// Terminates an agent at the caller's request.
    ///
    /// Returns the entry's state after the attempt; terminating an already
    /// terminal agent changes nothing.
    pub async fn terminate(&self, id: Uuid) -> Result<AgentEntry, AgentError> {
        let mut tracker = self.inner.lock().await;
        tracker.update_status(id, RunStatus::Terminated, |entry| {
            entry.aborted = true;
        });
        tracker
            .get(id)
            .cloned()
            .ok_or(AgentError::UnknownInstance(id))
    }

    /// Sweeps terminal agents older than the threshold. Returns the number
    /// removed.
    pub async fn cleanup(&self, older_than: Duration) -> usize {
        let mut tracker = self.inner.lock().await;
        tracker.cleanup(older_than).len()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
