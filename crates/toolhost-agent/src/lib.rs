//! Sub-agent orchestration tools.
//!
//! Agents follow the same lifecycle as background shell processes: register
//! as `running`, reach exactly one terminal status, get swept by age once
//! finished. What an agent actually executes sits behind the [`AgentRunner`]
//! seam; clarification questions reach the operator through [`UserPrompter`].
//! This crate owns the tracking and the `agentStart` / `agentMessage` /
//! `agentDone` / `agentQuery` / `listAgents` tool surface.

pub mod entry;
pub mod error;
pub mod prompter;
pub mod registry;
pub mod runner;
pub mod tools;

pub use entry::AgentEntry;
pub use error::AgentError;
pub use prompter::{TtyPrompter, UserPrompter};
pub use registry::{AgentBrief, AgentOutcome, AgentRegistry};
pub use runner::{spawn_agent, AgentRunner, StubRunner};
pub use tools::{
    AgentDoneTool, AgentMessageTool, AgentQueryTool, AgentStartTool, ListAgentsTool,
};
