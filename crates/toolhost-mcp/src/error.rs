//! Error types for the MCP plumbing.
//!
//! Tool-level failures that belong to the *payload* (an unknown instance id,
//! a write to a dead process) never show up here: tools fold those into their
//! JSON response bodies. These types cover failures of the plumbing itself.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, McpError>;

/// Top-level error for server operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// Transport-layer failure (I/O, closed connection).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Tool registration or dispatch failure.
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// Protocol violation (malformed request, unsupported method).
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Errors raised by tool registration and dispatch.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool is not in the registry.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// A tool with the same name is already registered.
    #[error("tool already registered: {0}")]
    AlreadyRegistered(String),

    /// The tool input failed deserialization.
    #[error("invalid tool input: {0}")]
    InvalidInput(#[from] serde_json::Error),

    /// The tool ran but reported an unrecoverable internal failure.
    #[error("tool execution failed: {0}")]
    ExecutionFailed(String),

    /// Catch-all for unexpected failures inside a tool.
    #[error("internal tool error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Transport-layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O failure on the underlying channel.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport was already closed.
    #[error("connection closed")]
    Closed,

    /// A message could not be serialized for the wire.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_display() {
        let err = ToolError::NotFound("shellStart".to_string());
        assert_eq!(err.to_string(), "tool not found: shellStart");
    }

    #[test]
    fn transport_error_converts_to_mcp_error() {
        let err: McpError = TransportError::Closed.into();
        assert!(matches!(err, McpError::Transport(TransportError::Closed)));
    }

    #[test]
    fn io_error_chains_through() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe gone");
        let err: McpError = TransportError::from(io).into();
        assert!(err.to_string().contains("pipe gone"));
    }
}
