//! The per-agent tracker entry.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use toolhost_tracker::{RunStatus, Tracked};
use uuid::Uuid;

/// One tracked logical agent.
///
/// Same lifecycle shape as a shell process entry: registered `running`,
/// moved exactly once to a terminal status, swept by age once terminal.
#[derive(Debug, Clone)]
pub struct AgentEntry {
    pub id: Uuid,
    /// Short purpose line shown by `listAgents`.
    pub description: String,
    /// The objective the agent works toward.
    pub goal: String,
    /// The fully assembled brief handed to the runner.
    pub prompt: String,
    pub working_dir: PathBuf,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,

    /// Progress output accumulated by the runner.
    pub output: String,
    /// Final result, set on completion.
    pub result: Option<String>,
    /// Failure detail, set on error.
    pub error: Option<String>,
    /// True when a terminate request ended the agent.
    pub aborted: bool,
    /// Guidance lines injected through `agentMessage`, oldest first.
    pub guidance: Vec<String>,
}

impl AgentEntry {
    pub fn new(
        id: Uuid,
        description: String,
        goal: String,
        prompt: String,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            id,
            description,
            goal,
            prompt,
            working_dir,
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            output: String::new(),
            result: None,
            error: None,
            aborted: false,
            guidance: Vec::new(),
        }
    }

    /// The text `agentMessage` reports: the result once there is one,
    /// otherwise the progress output so far.
    pub fn visible_output(&self) -> &str {
        match &self.result {
            Some(result) => result,
            None => &self.output,
        }
    }
}

impl Tracked for AgentEntry {
    fn status(&self) -> RunStatus {
        self.status
    }

    fn set_status(&mut self, status: RunStatus) {
        self.status = status;
    }

    fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    fn set_ended_at(&mut self, at: DateTime<Utc>) {
        self.ended_at = Some(at);
    }
}
