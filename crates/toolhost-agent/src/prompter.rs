//! The clarification seam: how `agentQuery` reaches the human operator.
//!
//! The server's stdin and stdout carry the JSON-RPC stream, so a prompt can
//! never go through them. [`TtyPrompter`] talks to the controlling terminal
//! directly; hosts without one plug in their own [`UserPrompter`].

use std::io;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

/// Asks the human operator a question and returns their reply.
#[async_trait]
pub trait UserPrompter: Send + Sync {
    async fn ask(&self, prompt: &str) -> io::Result<String>;
}

/// Prompts on `/dev/tty`, keeping the protocol channel untouched.
#[derive(Debug, Clone, Default)]
pub struct TtyPrompter;

impl TtyPrompter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UserPrompter for TtyPrompter {
    async fn ask(&self, prompt: &str) -> io::Result<String> {
        debug!(prompt, "prompting operator on the terminal");
        let mut out = OpenOptions::new().write(true).open("/dev/tty").await?;
        out.write_all(format!("\n{prompt}\n> ").as_bytes()).await?;
        out.flush().await?;

        let mut line = String::new();
        BufReader::new(File::open("/dev/tty").await?)
            .read_line(&mut line)
            .await?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}
