//! Toolhost server CLI.
//!
//! Runs the MCP server over stdio, exposing the shell, agent, and editor
//! tools. All tracked state is process-local; shutdown delivers SIGTERM to
//! every still-running shell process before exiting.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use toolhost_agent::{
    AgentDoneTool, AgentMessageTool, AgentQueryTool, AgentRegistry, AgentStartTool,
    ListAgentsTool, StubRunner, TtyPrompter,
};
use toolhost_editor::TextEditorTool;
use toolhost_mcp::{McpServer, ServerInfo, StdioTransport, ToolRegistry};
use toolhost_shell::{ListShellsTool, ProcessRegistry, ShellMessageTool, ShellStartTool};
use toolhost_tracker::DEFAULT_RETENTION;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often the background sweep purges old terminal instances.
const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Parser)]
#[command(name = "toolhost")]
#[command(about = "Host-side tool server for LLM orchestrators", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server on stdio
    Stdio,

    /// Show server information and registered tools
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the protocol.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Stdio => serve_stdio().await,
        Commands::Info => {
            println!("toolhost v{}", env!("CARGO_PKG_VERSION"));
            println!("\nRegistered tools:");
            let registry = build_tools(ProcessRegistry::new(), AgentRegistry::new()).await?;
            for tool in registry.list().await {
                println!("  - {}", tool.name);
            }
            Ok(())
        }
    }
}

async fn serve_stdio() -> Result<()> {
    let shells = ProcessRegistry::new();
    let agents = AgentRegistry::new();
    let tools = build_tools(shells.clone(), agents.clone()).await?;
    let server = McpServer::new(
        ServerInfo::new("toolhost", env!("CARGO_PKG_VERSION")),
        tools,
    );

    tokio::spawn(sweep_loop(shells.clone(), agents.clone()));

    let mut transport = StdioTransport::new();
    tokio::select! {
        result = server.run(&mut transport) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "server loop failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
        }
    }

    // Best-effort: stop whatever is still running before we exit.
    shells.terminate_all().await;
    Ok(())
}

async fn build_tools(shells: ProcessRegistry, agents: AgentRegistry) -> Result<ToolRegistry> {
    let registry = ToolRegistry::new();
    registry.register(ShellStartTool::new(shells.clone())).await?;
    registry
        .register(ShellMessageTool::new(shells.clone()))
        .await?;
    registry.register(ListShellsTool::new(shells)).await?;

    let runner = Arc::new(StubRunner::default());
    registry
        .register(AgentStartTool::new(agents.clone(), runner))
        .await?;
    registry
        .register(AgentMessageTool::new(agents.clone()))
        .await?;
    registry.register(AgentDoneTool::new()).await?;
    registry
        .register(AgentQueryTool::new(Arc::new(TtyPrompter::new())))
        .await?;
    registry.register(ListAgentsTool::new(agents)).await?;

    registry.register(TextEditorTool::new()).await?;
    Ok(registry)
}

/// Periodically purges terminal instances past the retention window.
async fn sweep_loop(shells: ProcessRegistry, agents: AgentRegistry) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    interval.tick().await;
    loop {
        interval.tick().await;
        let removed_shells = shells.cleanup(DEFAULT_RETENTION).await;
        let removed_agents = agents.cleanup(DEFAULT_RETENTION).await;
        if removed_shells + removed_agents > 0 {
            tracing::debug!(removed_shells, removed_agents, "swept old instances");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolhost_mcp::JsonRpcRequest;

    fn request(id: i64, method: &str, params: serde_json::Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(id)),
            method: method.to_string(),
            params: Some(params),
        }
    }

    #[tokio::test]
    async fn all_tools_are_registered() {
        let tools = build_tools(ProcessRegistry::new(), AgentRegistry::new())
            .await
            .unwrap();
        let names: Vec<String> = tools.list().await.into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "shellStart",
                "shellMessage",
                "listBackgroundTools",
                "agentStart",
                "agentMessage",
                "agentDone",
                "agentQuery",
                "listAgents",
                "text_editor",
            ]
        );
    }

    #[tokio::test]
    async fn shell_start_round_trips_through_the_server() {
        let tools = build_tools(ProcessRegistry::new(), AgentRegistry::new())
            .await
            .unwrap();
        let server = McpServer::new(ServerInfo::new("toolhost-test", "0.0.0"), tools);

        let response = server
            .handle(request(
                1,
                "tools/call",
                json!({
                    "name": "shellStart",
                    "arguments": {"command": "echo hi", "timeout": 5000},
                }),
            ))
            .await;

        let result = response.result.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        let body: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(body["mode"], "sync");
        assert_eq!(body["stdout"], "hi\n");
        assert_eq!(body["exitCode"], 0);
    }
}
