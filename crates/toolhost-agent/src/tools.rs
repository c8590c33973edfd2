//! The MCP tools exposed by this crate: `agentStart`, `agentMessage`,
//! `agentDone`, `agentQuery`, and `listAgents`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use toolhost_mcp::{Tool, ToolContext, ToolError, ToolResult};
use toolhost_tracker::{RunStatus, StatusFilter};
use uuid::Uuid;

use crate::entry::AgentEntry;
use crate::prompter::UserPrompter;
use crate::registry::{AgentBrief, AgentRegistry};
use crate::runner::{spawn_agent, AgentRunner};

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct AgentStartInput {
    /// Brief description of the agent's purpose (max 80 chars).
    description: String,
    /// The main objective the agent needs to achieve.
    goal: String,
    /// Context about the problem or environment.
    project_context: String,
    /// Directory the agent should operate in. Defaults to the server's.
    #[serde(default)]
    working_directory: Option<PathBuf>,
    /// Files relevant to the task; may include `*`/`**` wildcards.
    #[serde(default)]
    relevant_files_directories: Option<String>,
}

/// Starts a logical agent working toward a goal.
#[derive(Clone)]
pub struct AgentStartTool {
    registry: AgentRegistry,
    runner: Arc<dyn AgentRunner>,
}

impl AgentStartTool {
    pub fn new(registry: AgentRegistry, runner: Arc<dyn AgentRunner>) -> Self {
        Self { registry, runner }
    }
}

#[async_trait]
impl Tool for AgentStartTool {
    fn name(&self) -> &str {
        "agentStart"
    }

    fn description(&self) -> Option<&str> {
        Some(
            "Starts a sub-agent working toward a goal. Returns an instance id for \
             polling and guidance through agentMessage.",
        )
    }

    fn input_schema(&self) -> Value {
        schemars::schema_for!(AgentStartInput).to_value()
    }

    async fn execute(&self, input: Value, _context: &ToolContext) -> Result<ToolResult, ToolError> {
        let input: AgentStartInput = serde_json::from_value(input)?;
        let working_dir = match input.working_directory {
            Some(dir) => dir,
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };
        let brief = AgentBrief {
            description: input.description,
            goal: input.goal,
            project_context: input.project_context,
            working_dir,
            relevant_files: input.relevant_files_directories,
        };

        let id = spawn_agent(&self.registry, Arc::clone(&self.runner), brief).await;
        ToolResult::json(&json!({
            "instanceId": id,
            "status": RunStatus::Running,
        }))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct AgentMessageInput {
    /// Id returned by `agentStart`.
    instance_id: Uuid,
    /// The reason for this interaction (max 80 chars).
    #[serde(default)]
    description: Option<String>,
    /// Guidance or instructions to queue for the agent.
    #[serde(default)]
    guidance: Option<String>,
    /// Terminate the agent instead of polling it.
    #[serde(default)]
    terminate: bool,
}

#[derive(Debug, Serialize)]
struct AgentMessageReply {
    output: String,
    completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    terminated: Option<bool>,
}

impl AgentMessageReply {
    fn of(entry: &AgentEntry, fallback: &str) -> Self {
        let output = entry.visible_output();
        Self {
            output: if output.is_empty() {
                fallback.to_string()
            } else {
                output.to_string()
            },
            completed: entry.status.is_terminal(),
            error: entry.error.clone(),
            terminated: entry.aborted.then_some(true),
        }
    }
}

/// Polls, guides, or terminates a started agent.
#[derive(Debug, Clone)]
pub struct AgentMessageTool {
    registry: AgentRegistry,
}

impl AgentMessageTool {
    pub fn new(registry: AgentRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for AgentMessageTool {
    fn name(&self) -> &str {
        "agentMessage"
    }

    fn description(&self) -> Option<&str> {
        Some(
            "Interacts with a running agent: check progress, queue guidance, or \
             terminate it.",
        )
    }

    fn input_schema(&self) -> Value {
        schemars::schema_for!(AgentMessageInput).to_value()
    }

    async fn execute(&self, input: Value, _context: &ToolContext) -> Result<ToolResult, ToolError> {
        let input: AgentMessageInput = serde_json::from_value(input)?;
        let id = input.instance_id;
        if let Some(description) = input.description.as_deref() {
            tracing::debug!(instance_id = %id, description, "agent interaction");
        }

        let entry = match self.registry.snapshot(id).await {
            Ok(entry) => entry,
            Err(e) => {
                return ToolResult::json_error(&json!({
                    "output": "",
                    "completed": false,
                    "error": e.to_string(),
                }))
            }
        };

        // A previously terminated agent only ever reports that fact.
        if entry.aborted {
            return ToolResult::json(&AgentMessageReply::of(
                &entry,
                "Agent was previously terminated",
            ));
        }

        if input.terminate {
            let entry = match self.registry.terminate(id).await {
                Ok(entry) => entry,
                Err(e) => {
                    return ToolResult::json_error(&json!({
                        "output": "",
                        "completed": false,
                        "error": e.to_string(),
                    }))
                }
            };
            return ToolResult::json(&AgentMessageReply::of(
                &entry,
                "Agent terminated before completion",
            ));
        }

        if let Some(guidance) = input.guidance.as_deref() {
            if let Err(e) = self.registry.add_guidance(id, guidance).await {
                return ToolResult::json_error(&json!({
                    "output": "",
                    "completed": false,
                    "error": e.to_string(),
                }));
            }
        }

        // Re-snapshot so a completion that raced the guidance is reflected.
        match self.registry.snapshot(id).await {
            Ok(entry) => ToolResult::json(&AgentMessageReply::of(&entry, "No output yet")),
            Err(e) => ToolResult::json_error(&json!({
                "output": "",
                "completed": false,
                "error": e.to_string(),
            })),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AgentDoneInput {
    /// The final result to report.
    result: String,
}

/// Reports an agent's final result back to its caller.
///
/// Stateless: the tool exists so an agent-side toolchain has a well-known
/// terminal call; the hosting runner observes it and applies the lifecycle
/// transition.
#[derive(Debug, Clone, Default)]
pub struct AgentDoneTool;

impl AgentDoneTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for AgentDoneTool {
    fn name(&self) -> &str {
        "agentDone"
    }

    fn description(&self) -> Option<&str> {
        Some("Signals that the agent has finished, carrying its final result.")
    }

    fn input_schema(&self) -> Value {
        schemars::schema_for!(AgentDoneInput).to_value()
    }

    async fn execute(&self, input: Value, _context: &ToolContext) -> Result<ToolResult, ToolError> {
        let input: AgentDoneInput = serde_json::from_value(input)?;
        ToolResult::json(&json!({ "result": input.result }))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AgentQueryInput {
    /// The prompt message to display to the user.
    prompt: String,
}

/// Relays a clarifying question from an agent to the human operator.
#[derive(Clone)]
pub struct AgentQueryTool {
    prompter: Arc<dyn UserPrompter>,
}

impl AgentQueryTool {
    pub fn new(prompter: Arc<dyn UserPrompter>) -> Self {
        Self { prompter }
    }
}

#[async_trait]
impl Tool for AgentQueryTool {
    fn name(&self) -> &str {
        "agentQuery"
    }

    fn description(&self) -> Option<&str> {
        Some("Asks the human operator a clarifying question and returns their answer.")
    }

    fn input_schema(&self) -> Value {
        schemars::schema_for!(AgentQueryInput).to_value()
    }

    async fn execute(&self, input: Value, _context: &ToolContext) -> Result<ToolResult, ToolError> {
        let input: AgentQueryInput = serde_json::from_value(input)?;
        match self.prompter.ask(&input.prompt).await {
            Ok(answer) => ToolResult::json(&json!({ "userText": answer })),
            Err(e) => {
                tracing::error!(error = %e, "operator prompt failed");
                ToolResult::json_error(&json!({
                    "userText": "Error getting user input",
                    "error": e.to_string(),
                }))
            }
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ListAgentsInput {
    /// Narrow the listing to one lifecycle status.
    #[serde(default)]
    status: StatusFilter,
    /// Include working directory and termination detail per agent.
    #[serde(default)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentListing {
    id: Uuid,
    goal: String,
    status: RunStatus,
    start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    working_directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aborted: Option<bool>,
}

impl AgentListing {
    fn of(entry: AgentEntry, verbose: bool) -> Self {
        Self {
            id: entry.id,
            goal: entry.goal,
            status: entry.status,
            start_time: entry.started_at,
            end_time: entry.ended_at,
            result: entry.result,
            error: entry.error,
            description: verbose.then_some(entry.description),
            working_directory: verbose.then(|| entry.working_dir.display().to_string()),
            aborted: verbose.then_some(entry.aborted),
        }
    }
}

/// Lists tracked agents in start order.
#[derive(Debug, Clone)]
pub struct ListAgentsTool {
    registry: AgentRegistry,
}

impl ListAgentsTool {
    pub fn new(registry: AgentRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for ListAgentsTool {
    fn name(&self) -> &str {
        "listAgents"
    }

    fn description(&self) -> Option<&str> {
        Some("Lists agents started in this session, oldest first.")
    }

    fn input_schema(&self) -> Value {
        schemars::schema_for!(ListAgentsInput).to_value()
    }

    async fn execute(&self, input: Value, _context: &ToolContext) -> Result<ToolResult, ToolError> {
        let input: ListAgentsInput = serde_json::from_value(input)?;
        let agents: Vec<AgentListing> = self
            .registry
            .list(input.status)
            .await
            .into_iter()
            .map(|entry| AgentListing::of(entry, input.verbose))
            .collect();
        ToolResult::json(&json!({ "agents": agents }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompter::testing::CannedPrompter;
    use crate::runner::StubRunner;
    use std::time::Duration;

    fn payload(result: &ToolResult) -> Value {
        let text = result.content[0].as_text().unwrap();
        serde_json::from_str(text).unwrap()
    }

    fn start_tool(registry: &AgentRegistry, delay_ms: u64) -> AgentStartTool {
        AgentStartTool::new(
            registry.clone(),
            Arc::new(StubRunner::new(Duration::from_millis(delay_ms))),
        )
    }

    fn start_input() -> Value {
        json!({
            "description": "test agent",
            "goal": "prove the plumbing works",
            "projectContext": "unit test",
        })
    }

    #[tokio::test]
    async fn start_returns_running_instance() {
        let registry = AgentRegistry::new();
        let result = start_tool(&registry, 5_000)
            .execute(start_input(), &ToolContext::new())
            .await
            .unwrap();
        let body = payload(&result);
        assert_eq!(body["status"], "running");
        let id: Uuid = serde_json::from_value(body["instanceId"].clone()).unwrap();
        assert!(registry.snapshot(id).await.is_ok());
    }

    #[tokio::test]
    async fn message_polls_progress_then_completion() {
        let registry = AgentRegistry::new();
        let started = start_tool(&registry, 50)
            .execute(start_input(), &ToolContext::new())
            .await
            .unwrap();
        let id = payload(&started)["instanceId"].clone();
        let message = AgentMessageTool::new(registry);

        let polled = message
            .execute(json!({"instanceId": id}), &ToolContext::new())
            .await
            .unwrap();
        let body = payload(&polled);
        assert_eq!(body["completed"], false);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let polled = message
            .execute(json!({"instanceId": id}), &ToolContext::new())
            .await
            .unwrap();
        let body = payload(&polled);
        assert_eq!(body["completed"], true);
        assert_eq!(body["output"], "Task completed successfully");
    }

    #[tokio::test]
    async fn terminate_then_poll_reports_prior_termination() {
        let registry = AgentRegistry::new();
        let started = start_tool(&registry, 5_000)
            .execute(start_input(), &ToolContext::new())
            .await
            .unwrap();
        let id = payload(&started)["instanceId"].clone();
        let message = AgentMessageTool::new(registry);

        let terminated = message
            .execute(
                json!({"instanceId": id, "terminate": true}),
                &ToolContext::new(),
            )
            .await
            .unwrap();
        let body = payload(&terminated);
        assert_eq!(body["completed"], true);
        assert_eq!(body["terminated"], true);

        let again = message
            .execute(json!({"instanceId": id}), &ToolContext::new())
            .await
            .unwrap();
        let body = payload(&again);
        assert_eq!(body["terminated"], true);
        assert_eq!(body["output"], "Agent was previously terminated");
    }

    #[tokio::test]
    async fn unknown_agent_sets_error_flag() {
        let registry = AgentRegistry::new();
        let message = AgentMessageTool::new(registry);
        let result = message
            .execute(
                json!({"instanceId": Uuid::new_v4()}),
                &ToolContext::new(),
            )
            .await
            .unwrap();
        assert!(result.is_error());
        let body = payload(&result);
        assert!(body["error"].as_str().unwrap().contains("no agent found"));
    }

    #[tokio::test]
    async fn agent_done_echoes_result() {
        let result = AgentDoneTool::new()
            .execute(json!({"result": "all fixed"}), &ToolContext::new())
            .await
            .unwrap();
        assert_eq!(payload(&result)["result"], "all fixed");
    }

    #[tokio::test]
    async fn agent_query_relays_the_operator_answer() {
        let tool = AgentQueryTool::new(Arc::new(CannedPrompter::answering("use the v2 schema")));
        let result = tool
            .execute(json!({"prompt": "Which schema version?"}), &ToolContext::new())
            .await
            .unwrap();
        assert!(!result.is_error());
        assert_eq!(payload(&result)["userText"], "use the v2 schema");
    }

    #[tokio::test]
    async fn agent_query_folds_prompt_failure_into_the_payload() {
        let tool = AgentQueryTool::new(Arc::new(CannedPrompter::failing("no terminal")));
        let result = tool
            .execute(json!({"prompt": "anyone there?"}), &ToolContext::new())
            .await
            .unwrap();
        assert!(result.is_error());
        let body = payload(&result);
        assert_eq!(body["userText"], "Error getting user input");
        assert!(body["error"].as_str().unwrap().contains("no terminal"));
    }

    #[tokio::test]
    async fn list_agents_filters_and_verbose_fields() {
        let registry = AgentRegistry::new();
        let start = start_tool(&registry, 5_000);
        start
            .execute(start_input(), &ToolContext::new())
            .await
            .unwrap();

        let list = ListAgentsTool::new(registry);
        let terse = payload(
            &list
                .execute(json!({}), &ToolContext::new())
                .await
                .unwrap(),
        );
        let agents = terse["agents"].as_array().unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0]["status"], "running");
        assert!(agents[0].get("workingDirectory").is_none());

        let verbose = payload(
            &list
                .execute(json!({"verbose": true}), &ToolContext::new())
                .await
                .unwrap(),
        );
        let agents = verbose["agents"].as_array().unwrap();
        assert_eq!(agents[0]["description"], "test agent");
        assert!(agents[0]["workingDirectory"].is_string());

        let none = payload(
            &list
                .execute(json!({"status": "completed"}), &ToolContext::new())
                .await
                .unwrap(),
        );
        assert!(none["agents"].as_array().unwrap().is_empty());
    }
}
