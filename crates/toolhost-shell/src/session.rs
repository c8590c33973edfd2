//! Interaction with a tracked process: stdin, signals, and polling.

use std::time::Duration;

use toolhost_tracker::RunStatus;
use uuid::Uuid;

use crate::error::ShellError;
use crate::registry::ProcessRegistry;

/// Grace period between acting on a process and reporting its status, so a
/// signal or input that kills it quickly is reflected in the same reply.
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// One interaction with a running or finished process.
///
/// `stdin` and `signal` are mutually exclusive; the echo flag overrides may
/// accompany either or stand alone with a plain poll.
#[derive(Debug, Clone, Default)]
pub struct MessageRequest {
    pub stdin: Option<String>,
    pub signal: Option<String>,
    pub show_stdin: Option<bool>,
    pub show_stdout: Option<bool>,
}

/// Reply to an interaction.
///
/// `error` carries operation-level failures (dead process, bad signal); the
/// instance itself was found, so status fields are always meaningful.
#[derive(Debug)]
pub struct MessageOutcome {
    pub status: RunStatus,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

/// Handles one message to a process.
///
/// Semantics per request shape:
/// - signal: deliver it and report fresh status without draining, so output
///   that raced the signal stays buffered for the next poll;
/// - stdin: reject unless `running` (without draining), otherwise write the
///   line and fall through to a drain;
/// - neither: drain and report.
///
/// Only an unknown instance id escapes as an error; everything else is folded
/// into the outcome.
pub async fn interact(
    registry: &ProcessRegistry,
    id: Uuid,
    request: MessageRequest,
) -> Result<MessageOutcome, ShellError> {
    // Resolve the id up front; this is the one hard failure.
    let snapshot = registry.snapshot(id).await?;

    if request.show_stdin.is_some() || request.show_stdout.is_some() {
        registry
            .set_echo_flags(id, request.show_stdin, request.show_stdout)
            .await?;
    }

    if let Some(signal) = request.signal.as_deref() {
        let error = match registry.send_signal(id, signal).await {
            Ok(()) => None,
            Err(ShellError::UnknownInstance(_)) => return Err(ShellError::UnknownInstance(id)),
            Err(e) => Some(e.to_string()),
        };
        tokio::time::sleep(SETTLE_DELAY).await;
        let snapshot = registry.snapshot(id).await?;
        return Ok(MessageOutcome {
            status: snapshot.status,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: snapshot.exit_code,
            error,
        });
    }

    if let Some(input) = request.stdin.as_deref() {
        if snapshot.status != RunStatus::Running {
            return Ok(MessageOutcome {
                status: snapshot.status,
                stdout: String::new(),
                stderr: String::new(),
                exit_code: snapshot.exit_code,
                error: Some(format!(
                    "cannot send input to a process with status {}",
                    snapshot.status
                )),
            });
        }
        let effective_echo = request.show_stdin.unwrap_or(snapshot.show_stdin);
        if effective_echo {
            // The host console; stdout carries the protocol.
            eprintln!("{}", input.trim_end_matches('\n'));
        }
        if let Err(e) = registry.write_stdin(id, input).await {
            let snapshot = registry.snapshot(id).await?;
            return Ok(MessageOutcome {
                status: snapshot.status,
                stdout: String::new(),
                stderr: String::new(),
                exit_code: snapshot.exit_code,
                error: Some(e.to_string()),
            });
        }
        // Give the process a beat to react before the drain below.
        tokio::time::sleep(SETTLE_DELAY).await;
    }

    let (stdout, stderr) = registry.drain_output(id).await?;
    let snapshot = registry.snapshot(id).await?;
    Ok(MessageOutcome {
        status: snapshot.status,
        stdout,
        stderr,
        exit_code: snapshot.exit_code,
        error: None,
    })
}
