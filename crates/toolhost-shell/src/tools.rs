//! The MCP tools exposed by this crate: `shellStart`, `shellMessage`, and
//! `listShells`.
//!
//! Operation-level failures (a stale instance id, a refused signal) are
//! folded into the JSON payload; a `ToolError` escapes only when the input
//! itself cannot be deserialized.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use toolhost_mcp::{Tool, ToolContext, ToolError, ToolResult};
use toolhost_tracker::{RunStatus, StatusFilter};
use uuid::Uuid;

use crate::arbiter::{self, StartOutcome, StartRequest, DEFAULT_TIMEOUT};
use crate::registry::{ProcessRegistry, ProcessSummary};
use crate::session::{self, MessageRequest};

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ShellStartInput {
    /// Shell command line, run under `sh -c`.
    command: String,
    /// What the command is for, shown by `listShells`.
    #[serde(default)]
    description: String,
    /// Milliseconds to wait for completion before switching to async mode.
    /// Zero returns async immediately.
    #[serde(default = "default_timeout_ms")]
    timeout: u64,
    /// Echo input sent to the process onto the host console.
    #[serde(default)]
    show_std_in: bool,
    /// Echo process output onto the host console as it arrives.
    #[serde(default)]
    show_stdout: bool,
    /// Working directory for the command. Defaults to the server's.
    #[serde(default)]
    working_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
enum ShellStartReply {
    #[serde(rename_all = "camelCase")]
    Sync {
        instance_id: Uuid,
        status: RunStatus,
        stdout: String,
        stderr: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Async {
        instance_id: Uuid,
        stdout: String,
        stderr: String,
    },
}

/// Starts a shell command, resolving sync or async depending on whether it
/// finishes before the deadline.
#[derive(Debug, Clone)]
pub struct ShellStartTool {
    registry: ProcessRegistry,
}

impl ShellStartTool {
    pub fn new(registry: ProcessRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for ShellStartTool {
    fn name(&self) -> &str {
        "shellStart"
    }

    fn description(&self) -> Option<&str> {
        Some(
            "Starts a shell command. Returns the full output if it finishes within \
             the timeout, otherwise an instance id for later interaction.",
        )
    }

    fn input_schema(&self) -> Value {
        schemars::schema_for!(ShellStartInput).to_value()
    }

    async fn execute(&self, input: Value, _context: &ToolContext) -> Result<ToolResult, ToolError> {
        let input: ShellStartInput = serde_json::from_value(input)?;
        let request = StartRequest {
            command: input.command,
            description: input.description,
            timeout: Duration::from_millis(input.timeout),
            show_stdin: input.show_std_in,
            show_stdout: input.show_stdout,
            working_dir: input.working_dir,
        };

        let reply = match arbiter::start(&self.registry, request).await {
            StartOutcome::Sync {
                id,
                status,
                stdout,
                stderr,
                exit_code,
                error,
            } => ShellStartReply::Sync {
                instance_id: id,
                status,
                stdout,
                stderr,
                exit_code,
                error,
            },
            StartOutcome::Async { id, stdout, stderr } => ShellStartReply::Async {
                instance_id: id,
                stdout,
                stderr,
            },
        };
        ToolResult::json(&reply)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ShellMessageInput {
    /// Id returned by `shellStart`.
    instance_id: Uuid,
    /// Why this interaction is happening; recorded in the log only.
    #[serde(default)]
    description: Option<String>,
    /// Line to write to the process stdin. A trailing newline is added when
    /// missing.
    #[serde(default)]
    stdin: Option<String>,
    /// POSIX signal name to deliver, with or without the `SIG` prefix.
    /// `KILL` and `TERM` mark the instance terminated immediately.
    #[serde(default)]
    signal: Option<String>,
    /// Override the stdin echo flag for this and later interactions.
    #[serde(default)]
    show_std_in: Option<bool>,
    /// Override the output echo flag for this and later interactions.
    #[serde(default)]
    show_stdout: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShellMessageReply {
    instance_id: Uuid,
    status: RunStatus,
    stdout: String,
    stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Interacts with a started shell: send stdin, deliver a signal, or poll for
/// buffered output and status.
#[derive(Debug, Clone)]
pub struct ShellMessageTool {
    registry: ProcessRegistry,
}

impl ShellMessageTool {
    pub fn new(registry: ProcessRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for ShellMessageTool {
    fn name(&self) -> &str {
        "shellMessage"
    }

    fn description(&self) -> Option<&str> {
        Some(
            "Interacts with a running shell instance: send stdin, deliver a signal, \
             or poll for new output and status.",
        )
    }

    fn input_schema(&self) -> Value {
        schemars::schema_for!(ShellMessageInput).to_value()
    }

    async fn execute(&self, input: Value, _context: &ToolContext) -> Result<ToolResult, ToolError> {
        let input: ShellMessageInput = serde_json::from_value(input)?;
        let id = input.instance_id;
        if let Some(description) = input.description.as_deref() {
            tracing::debug!(instance_id = %id, description, "shell interaction");
        }
        let request = MessageRequest {
            stdin: input.stdin,
            signal: input.signal,
            show_stdin: input.show_std_in,
            show_stdout: input.show_stdout,
        };

        match session::interact(&self.registry, id, request).await {
            Ok(outcome) => ToolResult::json(&ShellMessageReply {
                instance_id: id,
                status: outcome.status,
                stdout: outcome.stdout,
                stderr: outcome.stderr,
                exit_code: outcome.exit_code,
                error: outcome.error,
            }),
            Err(e) => ToolResult::json_error(&json!({ "error": e.to_string() })),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ListShellsInput {
    /// Narrow the listing to one lifecycle status.
    #[serde(default)]
    status: StatusFilter,
    /// Include echo flags, signal state, and failure detail per shell.
    #[serde(default)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShellListing {
    id: Uuid,
    command: String,
    description: String,
    status: RunStatus,
    start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    show_std_in: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    show_stdout: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signaled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ShellListing {
    fn of(summary: ProcessSummary, verbose: bool) -> Self {
        Self {
            id: summary.id,
            command: summary.command,
            description: summary.description,
            status: summary.status,
            start_time: summary.started_at,
            end_time: summary.ended_at,
            exit_code: summary.exit_code,
            show_std_in: verbose.then_some(summary.show_stdin),
            show_stdout: verbose.then_some(summary.show_stdout),
            signaled: verbose.then_some(summary.signaled),
            error: if verbose { summary.error } else { None },
        }
    }
}

/// Lists tracked shell instances in start order.
#[derive(Debug, Clone)]
pub struct ListShellsTool {
    registry: ProcessRegistry,
}

impl ListShellsTool {
    pub fn new(registry: ProcessRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for ListShellsTool {
    fn name(&self) -> &str {
        "listBackgroundTools"
    }

    fn description(&self) -> Option<&str> {
        Some("Lists shell instances started in this session, oldest first.")
    }

    fn input_schema(&self) -> Value {
        schemars::schema_for!(ListShellsInput).to_value()
    }

    async fn execute(&self, input: Value, _context: &ToolContext) -> Result<ToolResult, ToolError> {
        let input: ListShellsInput = serde_json::from_value(input)?;
        let shells: Vec<ShellListing> = self
            .registry
            .list(input.status)
            .await
            .into_iter()
            .map(|summary| ShellListing::of(summary, input.verbose))
            .collect();
        ToolResult::json(&json!({ "shells": shells }))
    }
}
