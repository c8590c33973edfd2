//! The dispatch loop: routes `initialize`, `tools/list`, and `tools/call`.

use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::error::{McpError, ToolError};
use crate::protocol::{CallToolParams, JsonRpcError, JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR};
use crate::registry::ToolRegistry;
use crate::tool::{ToolContext, ToolResult};
use crate::transport::Transport;

/// Name and version advertised during `initialize`.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,

    /// Server version.
    pub version: String,
}

impl ServerInfo {
    /// Creates server info.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// An MCP server: a tool registry plus a request loop over a transport.
#[derive(Clone)]
pub struct McpServer {
    info: ServerInfo,
    tools: ToolRegistry,
}

impl McpServer {
    /// Creates a server over the given registry.
    pub fn new(info: ServerInfo, tools: ToolRegistry) -> Self {
        Self { info, tools }
    }

    /// The tool registry backing this server.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Runs the request loop until the transport closes.
    pub async fn run<T: Transport>(&self, transport: &mut T) -> Result<(), McpError> {
        info!(name = %self.info.name, version = %self.info.version, "server ready");
        while let Some(request) = transport.recv().await {
            if request.is_notification() {
                debug!(method = %request.method, "ignoring notification");
                continue;
            }
            let response = self.handle(request).await;
            transport.send(response).await?;
        }
        transport.close().await?;
        Ok(())
    }

    /// Handles a single request and produces its response.
    pub async fn handle(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": "2025-03-26",
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": self.info.name,
                        "version": self.info.version,
                    },
                }),
            ),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => {
                let tools = self.tools.list().await;
                JsonRpcResponse::success(id, json!({ "tools": tools }))
            }
            "tools/call" => self.call_tool(id, request.params).await,
            other => JsonRpcResponse::method_not_found(id, other),
        }
    }

    async fn call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params
            .ok_or_else(|| "missing params".to_string())
            .and_then(|p| serde_json::from_value(p).map_err(|e| e.to_string()))
        {
            Ok(params) => params,
            Err(detail) => return JsonRpcResponse::invalid_params(id, detail),
        };

        let Some(tool) = self.tools.get(&params.name).await else {
            let err: JsonRpcError = JsonRpcError::new(
                crate::protocol::METHOD_NOT_FOUND,
                format!("tool not found: {}", params.name),
            );
            return JsonRpcResponse::error(id, err);
        };

        let context = match &id {
            Some(request_id) => ToolContext::with_request_id(request_id.clone()),
            None => ToolContext::new(),
        };

        debug!(tool = %params.name, "dispatching tool call");
        match tool.execute(params.arguments, &context).await {
            Ok(result) => JsonRpcResponse::success(id, result_to_value(result)),
            Err(ToolError::InvalidInput(e)) => JsonRpcResponse::invalid_params(id, e.to_string()),
            Err(err) => {
                error!(tool = %params.name, %err, "tool call failed");
                JsonRpcResponse::error(
                    id,
                    JsonRpcError::with_data(
                        INTERNAL_ERROR,
                        "tool call failed",
                        json!({ "details": err.to_string() }),
                    ),
                )
            }
        }
    }
}

fn result_to_value(result: ToolResult) -> Value {
    // ToolResult serializes cleanly; a failure here would be a programming
    // error, so fall back to an empty content list instead of panicking.
    serde_json::to_value(&result).unwrap_or_else(|_| json!({ "content": [] }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{Tool, ToolContent};
    use crate::transport::MockTransport;
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> Option<&str> {
            Some("echoes its input")
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {"message": {"type": "string"}}})
        }

        async fn execute(
            &self,
            input: Value,
            _context: &ToolContext,
        ) -> Result<ToolResult, ToolError> {
            let message = input["message"].as_str().unwrap_or_default();
            Ok(ToolResult::text(message))
        }
    }

    async fn server_with_echo() -> McpServer {
        let registry = ToolRegistry::new();
        registry.register(EchoTool).await.unwrap();
        McpServer::new(ServerInfo::new("test-server", "0.0.0"), registry)
    }

    fn request(method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: method.to_string(),
            params: Some(params),
        }
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let server = server_with_echo().await;
        let response = server.handle(request("initialize", json!({}))).await;
        let result = response.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "test-server");
    }

    #[tokio::test]
    async fn tools_list_includes_registered_tools() {
        let server = server_with_echo().await;
        let response = server.handle(request("tools/list", json!({}))).await;
        let tools = response.result.unwrap()["tools"].clone();
        assert_eq!(tools[0]["name"], "echo");
    }

    #[tokio::test]
    async fn tools_call_dispatches_to_tool() {
        let server = server_with_echo().await;
        let response = server
            .handle(request(
                "tools/call",
                json!({"name": "echo", "arguments": {"message": "hi"}}),
            ))
            .await;
        let result: ToolResult =
            serde_json::from_value(response.result.unwrap()).unwrap();
        assert_eq!(result.content[0], ToolContent::text("hi"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_rpc_error() {
        let server = server_with_echo().await;
        let response = server
            .handle(request("tools/call", json!({"name": "nope"})))
            .await;
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let server = server_with_echo().await;
        let response = server.handle(request("resources/list", json!({}))).await;
        assert_eq!(
            response.error.unwrap().code,
            crate::protocol::METHOD_NOT_FOUND
        );
    }

    #[tokio::test]
    async fn run_loop_answers_each_request() {
        let server = server_with_echo().await;
        let mut transport = MockTransport::new(vec![
            request("initialize", json!({})),
            request("tools/list", json!({})),
        ]);
        server.run(&mut transport).await.unwrap();
        assert_eq!(transport.sent.len(), 2);
    }
}
