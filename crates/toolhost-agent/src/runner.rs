//! The execution seam for agents.
//!
//! The tools in this crate track lifecycle; what an agent actually *does* is
//! behind [`AgentRunner`] so a host can plug in a real orchestrator. The
//! default runner acknowledges the brief after a short delay, which is
//! enough to exercise every lifecycle path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::registry::{AgentBrief, AgentOutcome, AgentRegistry};

/// Executes one agent to its terminal outcome.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Runs the agent. Progress may be streamed through
    /// [`AgentRegistry::append_output`]; the returned outcome is applied by
    /// the caller.
    async fn run(&self, id: Uuid, brief: AgentBrief, registry: AgentRegistry) -> AgentOutcome;
}

/// Placeholder runner: reports success after a fixed delay.
#[derive(Debug, Clone)]
pub struct StubRunner {
    delay: Duration,
}

impl StubRunner {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for StubRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl AgentRunner for StubRunner {
    async fn run(&self, id: Uuid, brief: AgentBrief, registry: AgentRegistry) -> AgentOutcome {
        debug!(%id, goal = %brief.goal, "stub runner started");
        registry.append_output(id, "Working on the task\n").await;
        tokio::time::sleep(self.delay).await;
        AgentOutcome::Completed {
            result: "Task completed successfully".to_string(),
        }
    }
}

/// Registers the agent and drives the runner in a background task.
///
/// The task applies the runner's outcome through [`AgentRegistry::finish`],
/// where an earlier termination wins over a late result.
pub async fn spawn_agent(
    registry: &AgentRegistry,
    runner: Arc<dyn AgentRunner>,
    brief: AgentBrief,
) -> Uuid {
    let id = registry.register(&brief).await;
    let registry_for_task = registry.clone();
    tokio::spawn(async move {
        let outcome = runner
            .run(id, brief, registry_for_task.clone())
            .await;
        registry_for_task.finish(id, outcome).await;
    });
    id
}
