//! Minimal MCP server plumbing for the toolhost suite.
//!
//! This crate carries just enough of the Model Context Protocol to run the
//! toolhost tools over stdio: a [`Tool`] trait, a [`ToolRegistry`], JSON-RPC
//! request/response types, and the [`McpServer`] dispatch loop. Transports
//! other than stdio, resources, and middleware are deliberately absent.
//!
//! # Examples
//!
//! ```no_run
//! use toolhost_mcp::{McpServer, ServerInfo, StdioTransport, ToolRegistry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = ToolRegistry::new();
//!     // registry.register(...) your tools here.
//!     let server = McpServer::new(ServerInfo::new("toolhost", "0.1.0"), registry);
//!     let mut transport = StdioTransport::new();
//!     server.run(&mut transport).await.unwrap();
//! }
//! ```

pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod tool;
pub mod transport;

pub use error::{McpError, Result, ToolError, TransportError};
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use registry::ToolRegistry;
pub use server::{McpServer, ServerInfo};
pub use tool::{Tool, ToolContent, ToolContext, ToolDefinition, ToolResult};
pub use transport::{StdioTransport, Transport};
