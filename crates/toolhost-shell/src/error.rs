//! Shell subsystem errors.
//!
//! These cover the operations themselves. The tools in this crate fold most
//! of them into JSON payloads rather than surfacing them as protocol errors,
//! so a caller holding a stale instance id gets a readable `error` field
//! instead of a failed RPC.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by shell process operations.
#[derive(Debug, Error)]
pub enum ShellError {
    /// No tracked process has this id (never existed or already swept).
    #[error("unknown shell instance: {0}")]
    UnknownInstance(Uuid),

    /// The OS refused to spawn the process.
    #[error("failed to spawn process: {0}")]
    SpawnFailure(String),

    /// Writing to the process stdin failed.
    #[error("failed to write to stdin: {0}")]
    WriteFailure(String),

    /// Signal delivery failed (bad signal name or kill(2) refusal).
    #[error("failed to send signal: {0}")]
    SignalFailure(String),
}
