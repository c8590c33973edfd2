//! Start-time mode arbitration: sync when the process beats the deadline,
//! async otherwise.

use std::path::PathBuf;
use std::time::Duration;

use toolhost_tracker::RunStatus;
use tracing::debug;
use uuid::Uuid;

use crate::error::ShellError;
use crate::launcher;
use crate::registry::ProcessRegistry;

/// Default deadline for the sync/async race.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Parameters for starting a shell process.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub command: String,
    pub description: String,
    /// Deadline for the sync/async race. Zero forces async mode.
    pub timeout: Duration,
    pub show_stdin: bool,
    pub show_stdout: bool,
    pub working_dir: Option<PathBuf>,
}

impl StartRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: String::new(),
            timeout: DEFAULT_TIMEOUT,
            show_stdin: false,
            show_stdout: false,
            working_dir: None,
        }
    }
}

/// Outcome of a start: exactly one of the two modes.
///
/// Sync means the process reached a terminal status before the deadline and
/// the captured output is complete. Async means the process is (as far as
/// the caller knows) still running, the returned output is partial, and the
/// rest arrives through later polls. An overflowed capture always reports
/// async because its output cannot be complete.
#[derive(Debug)]
pub enum StartOutcome {
    Sync {
        id: Uuid,
        status: RunStatus,
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
        error: Option<String>,
    },
    Async {
        id: Uuid,
        stdout: String,
        stderr: String,
    },
}

/// Registers, launches, and races the process against the deadline.
///
/// The entry is registered before the spawn is attempted, so even a command
/// that never starts is listable afterward with an `error` status. A spawn
/// failure resolves sync with the failure message rather than propagating,
/// matching the everything-in-the-payload policy of the tools above this.
pub async fn start(registry: &ProcessRegistry, request: StartRequest) -> StartOutcome {
    let id = registry
        .register(
            &request.command,
            &request.description,
            request.show_stdin,
            request.show_stdout,
        )
        .await;

    if let Err(ShellError::SpawnFailure(message)) = launcher::launch(
        registry,
        id,
        &request.command,
        request.working_dir.as_deref(),
    )
    .await
    {
        return StartOutcome::Sync {
            id,
            status: RunStatus::Error,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            error: Some(message),
        };
    }

    // A zero deadline skips the race entirely.
    if request.timeout.is_zero() {
        debug!(%id, "zero timeout, resolving async immediately");
        return resolve_async(registry, id).await;
    }

    let Ok(mut done) = registry.completion(id).await else {
        // Swept between registration and here; nothing left to report.
        return resolve_async(registry, id).await;
    };

    // Biased with the completion arm first: when completion and deadline
    // fire in the same poll, sync wins. The wait is wrapped so the watch
    // guard it yields is dropped before the arm body runs; holding it across
    // an await would pin this future to one thread.
    tokio::select! {
        biased;
        _ = async {
            let _ = done.wait_for(|finished| *finished).await;
        } => resolve_sync(registry, id).await,
        _ = tokio::time::sleep(request.timeout) => {
            debug!(%id, timeout = ?request.timeout, "deadline elapsed, resolving async");
            resolve_async(registry, id).await
        }
    }
}

async fn resolve_sync(registry: &ProcessRegistry, id: Uuid) -> StartOutcome {
    let Ok(snapshot) = registry.snapshot(id).await else {
        return resolve_async(registry, id).await;
    };
    // A capped capture lost data, so a "complete" sync reply would lie.
    if snapshot.overflowed {
        debug!(%id, "capture overflowed, downgrading to async");
        return resolve_async(registry, id).await;
    }
    let (stdout, stderr) = registry.drain_output(id).await.unwrap_or_default();
    StartOutcome::Sync {
        id,
        status: snapshot.status,
        stdout,
        stderr,
        exit_code: snapshot.exit_code,
        error: snapshot.error,
    }
}

async fn resolve_async(registry: &ProcessRegistry, id: Uuid) -> StartOutcome {
    let (stdout, stderr) = registry.drain_output(id).await.unwrap_or_default();
    StartOutcome::Async { id, stdout, stderr }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(command: &str, timeout_ms: u64) -> StartRequest {
        StartRequest {
            timeout: Duration::from_millis(timeout_ms),
            ..StartRequest::new(command)
        }
    }

    #[test]
    fn start_future_is_send() {
        // Tool handlers box this future as Send; a watch guard held across an
        // await inside the race would break that.
        fn assert_send<T: Send>(_: T) {}
        let registry = ProcessRegistry::new();
        assert_send(start(&registry, request("true", 10)));
    }

    #[tokio::test]
    async fn fast_command_resolves_sync_with_full_output() {
        let registry = ProcessRegistry::new();
        let outcome = start(&registry, request("echo hello", 5_000)).await;
        match outcome {
            StartOutcome::Sync {
                status,
                stdout,
                exit_code,
                error,
                ..
            } => {
                assert_eq!(status, RunStatus::Completed);
                assert_eq!(stdout, "hello\n");
                assert_eq!(exit_code, Some(0));
                assert!(error.is_none());
            }
            other => panic!("expected sync outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failing_command_resolves_sync_with_error_status() {
        let registry = ProcessRegistry::new();
        let outcome = start(&registry, request("echo oops >&2; exit 3", 5_000)).await;
        match outcome {
            StartOutcome::Sync {
                status,
                stderr,
                exit_code,
                ..
            } => {
                assert_eq!(status, RunStatus::Error);
                assert_eq!(stderr, "oops\n");
                assert_eq!(exit_code, Some(3));
            }
            other => panic!("expected sync outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_command_resolves_async() {
        let registry = ProcessRegistry::new();
        let outcome = start(&registry, request("sleep 5", 50)).await;
        let StartOutcome::Async { id, .. } = outcome else {
            panic!("expected async outcome");
        };
        let snap = registry.snapshot(id).await.unwrap();
        assert_eq!(snap.status, RunStatus::Running);
        registry.send_signal(id, "KILL").await.unwrap();
    }

    #[tokio::test]
    async fn zero_timeout_forces_async_even_for_instant_commands() {
        let registry = ProcessRegistry::new();
        let outcome = start(&registry, request("true", 0)).await;
        assert!(matches!(outcome, StartOutcome::Async { .. }));
    }

    #[tokio::test]
    async fn spawn_failure_resolves_sync_error_and_stays_listed() {
        let registry = ProcessRegistry::new();
        let mut req = request("true", 5_000);
        req.working_dir = Some(PathBuf::from("/nonexistent/toolhost/dir"));
        let outcome = start(&registry, req).await;
        let StartOutcome::Sync { id, status, error, .. } = outcome else {
            panic!("expected sync outcome");
        };
        assert_eq!(status, RunStatus::Error);
        assert!(error.is_some());
        // The failed start is still inspectable afterward.
        let snap = registry.snapshot(id).await.unwrap();
        assert_eq!(snap.status, RunStatus::Error);
    }

    #[tokio::test]
    async fn async_start_output_arrives_in_later_polls() {
        let registry = ProcessRegistry::new();
        let outcome = start(&registry, request("sleep 0.3; echo done", 50)).await;
        let StartOutcome::Async { id, .. } = outcome else {
            panic!("expected async outcome");
        };

        let mut done = registry.completion(id).await.unwrap();
        done.wait_for(|finished| *finished).await.unwrap();

        let (stdout, _) = registry.drain_output(id).await.unwrap();
        assert_eq!(stdout, "done\n");
        let snap = registry.snapshot(id).await.unwrap();
        assert_eq!(snap.status, RunStatus::Completed);
        assert_eq!(snap.exit_code, Some(0));
    }
}
