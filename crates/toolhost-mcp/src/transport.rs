//! Transports for the dispatch loop.
//!
//! The wire format is line-delimited JSON: one request per line in, one
//! response per line out. All logging goes to stderr so stdout stays a clean
//! protocol channel.

use async_trait::async_trait;
use tokio::io::{stdin, stdout, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin, Stdout};
use tracing::warn;

use crate::error::TransportError;
use crate::protocol::{JsonRpcRequest, JsonRpcResponse};

/// A bidirectional JSON-RPC channel.
#[async_trait]
pub trait Transport: Send {
    /// Receives the next request; `None` means the channel is closed.
    async fn recv(&mut self) -> Option<JsonRpcRequest>;

    /// Sends a response.
    async fn send(&mut self, response: JsonRpcResponse) -> Result<(), TransportError>;

    /// Closes the channel.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Stdio transport: requests on stdin, responses on stdout.
///
/// Malformed lines are logged and skipped; EOF closes the transport.
pub struct StdioTransport {
    stdin: BufReader<Stdin>,
    stdout: Stdout,
    closed: bool,
}

impl StdioTransport {
    /// Creates a transport over the process's stdin/stdout.
    pub fn new() -> Self {
        Self {
            stdin: BufReader::new(stdin()),
            stdout: stdout(),
            closed: false,
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn recv(&mut self) -> Option<JsonRpcRequest> {
        loop {
            if self.closed {
                return None;
            }

            let mut line = String::new();
            match self.stdin.read_line(&mut line).await {
                Ok(0) => {
                    self.closed = true;
                    return None;
                }
                Ok(_) => match serde_json::from_str::<JsonRpcRequest>(&line) {
                    Ok(request) => return Some(request),
                    Err(err) => {
                        warn!(line = line.trim(), %err, "skipping malformed request line");
                        continue;
                    }
                },
                Err(err) => {
                    warn!(%err, "i/o error reading stdin");
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    async fn send(&mut self, response: JsonRpcResponse) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let json = serde_json::to_string(&response)
            .map_err(|e| TransportError::InvalidMessage(e.to_string()))?;
        self.stdout.write_all(json.as_bytes()).await?;
        self.stdout.write_all(b"\n").await?;
        self.stdout.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        self.stdout.flush().await?;
        Ok(())
    }
}

/// In-memory transport for tests: feed requests in, collect responses out.
pub struct MockTransport {
    requests: std::collections::VecDeque<JsonRpcRequest>,
    /// Responses the server wrote, in order.
    pub sent: Vec<JsonRpcResponse>,
    closed: bool,
}

impl MockTransport {
    /// Creates a transport preloaded with the given requests.
    pub fn new(requests: Vec<JsonRpcRequest>) -> Self {
        Self {
            requests: requests.into(),
            sent: Vec::new(),
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn recv(&mut self) -> Option<JsonRpcRequest> {
        if self.closed {
            return None;
        }
        self.requests.pop_front()
    }

    async fn send(&mut self, response: JsonRpcResponse) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.sent.push(response);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(method: &str) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: method.to_string(),
            params: None,
        }
    }

    #[tokio::test]
    async fn mock_transport_round_trip() {
        let mut transport = MockTransport::new(vec![request("tools/list")]);
        let received = transport.recv().await.unwrap();
        assert_eq!(received.method, "tools/list");
        assert!(transport.recv().await.is_none());

        transport
            .send(JsonRpcResponse::success(Some(json!(1)), json!({})))
            .await
            .unwrap();
        assert_eq!(transport.sent.len(), 1);
    }

    #[tokio::test]
    async fn mock_transport_rejects_send_after_close() {
        let mut transport = MockTransport::new(vec![]);
        transport.close().await.unwrap();
        let result = transport
            .send(JsonRpcResponse::success(None, json!({})))
            .await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }
}
