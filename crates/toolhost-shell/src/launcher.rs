//! Spawning and supervising shell processes.

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use toolhost_tracker::RunStatus;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::entry::OutputStream;
use crate::error::ShellError;
use crate::registry::{ProcessRegistry, StatusDetails};

/// Spawns the command under `sh -c` and wires up its supervision.
///
/// The entry must already be registered. On success three background tasks
/// are running: one reader per output stream and a waiter that applies the
/// terminal status once the process exits *and* both streams are fully
/// captured. On spawn failure the entry is moved to `error` with the OS
/// message before the error is returned, so the instance stays inspectable.
pub async fn launch(
    registry: &ProcessRegistry,
    id: Uuid,
    command: &str,
    working_dir: Option<&Path>,
) -> Result<(), ShellError> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            let message = e.to_string();
            error!(%id, command, error = %message, "failed to spawn process");
            registry
                .update_status(
                    id,
                    RunStatus::Error,
                    StatusDetails {
                        error: Some(message.clone()),
                        ..StatusDetails::default()
                    },
                )
                .await;
            return Err(ShellError::SpawnFailure(message));
        }
    };

    let pid = child.id();
    info!(%id, ?pid, command, "spawned shell process");

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdin = child.stdin.take();
    registry.attach_child(id, pid, stdin).await?;

    let stdout_task = spawn_reader(registry.clone(), id, OutputStream::Stdout, stdout);
    let stderr_task = spawn_reader(registry.clone(), id, OutputStream::Stderr, stderr);

    tokio::spawn(supervise(
        registry.clone(),
        id,
        child,
        stdout_task,
        stderr_task,
    ));
    Ok(())
}

/// Copies one output stream into the registry until EOF.
fn spawn_reader<R>(
    registry: ProcessRegistry,
    id: Uuid,
    stream: OutputStream,
    source: Option<R>,
) -> JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut source) = source else { return };
        let mut buf = [0u8; 8192];
        loop {
            match source.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                    let echo = registry.append_output(id, stream, &chunk).await;
                    if echo {
                        // The host console; stdout carries the protocol.
                        eprint!("{chunk}");
                    }
                }
                Err(e) => {
                    debug!(%id, ?stream, error = %e, "output stream read failed");
                    break;
                }
            }
        }
    })
}

/// Waits for exit, then for both streams to be fully captured, then applies
/// the terminal status.
///
/// Capture-before-status ordering is what makes a sync-mode reply complete:
/// when the completion channel flips, every byte the process wrote is already
/// in the buffers. If a kill-class signal already terminated the entry the
/// update here is a no-op.
async fn supervise(
    registry: ProcessRegistry,
    id: Uuid,
    mut child: Child,
    stdout_task: JoinHandle<()>,
    stderr_task: JoinHandle<()>,
) {
    let status = child.wait().await;
    let _ = stdout_task.await;
    let _ = stderr_task.await;

    let (run_status, details) = match status {
        Ok(exit) => match exit.code() {
            Some(0) => (
                RunStatus::Completed,
                StatusDetails {
                    exit_code: Some(0),
                    ..StatusDetails::default()
                },
            ),
            Some(code) => (
                RunStatus::Error,
                StatusDetails {
                    exit_code: Some(code),
                    ..StatusDetails::default()
                },
            ),
            // Killed by a signal the host did not send through us.
            None => (
                RunStatus::Terminated,
                StatusDetails {
                    signaled: true,
                    ..StatusDetails::default()
                },
            ),
        },
        Err(e) => (
            RunStatus::Error,
            StatusDetails {
                error: Some(format!("wait failed: {e}")),
                ..StatusDetails::default()
            },
        ),
    };

    debug!(%id, status = %run_status, exit_code = ?details.exit_code, "process exited");
    registry.update_status(id, run_status, details).await;
}
