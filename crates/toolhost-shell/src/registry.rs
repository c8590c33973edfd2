//! The process registry: the single synchronization point for shell state.
//!
//! All mutation goes through one async mutex around the instance tracker, so
//! a drain observes either none or all of any concurrent append, and a status
//! report never interleaves with a terminal transition.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::sync::{watch, Mutex};
use toolhost_tracker::{InstanceTracker, RunStatus, StatusFilter};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entry::{OutputStream, ProcessEntry};
use crate::error::ShellError;

/// Signal names accepted by the message tool, without the `SIG` prefix.
const SIGNAL_NAMES: &[&str] = &[
    "HUP", "INT", "QUIT", "ILL", "TRAP", "ABRT", "BUS", "FPE", "KILL", "USR1", "SEGV", "USR2",
    "PIPE", "ALRM", "TERM", "CHLD", "CONT", "STOP", "TSTP", "TTIN", "TTOU", "URG", "XCPU", "XFSZ",
    "VTALRM", "PROF", "WINCH", "IO", "SYS",
];

/// Normalizes a signal name: strips an optional `SIG` prefix and upcases.
///
/// Returns `None` for names that are not POSIX signals.
pub fn normalize_signal(name: &str) -> Option<String> {
    let upper = name.trim().to_ascii_uppercase();
    let short = upper.strip_prefix("SIG").unwrap_or(&upper);
    SIGNAL_NAMES.contains(&short).then(|| short.to_string())
}

/// Whether a (normalized) signal is treated as an authoritative kill.
///
/// Delivery of one of these immediately moves the entry to `terminated`; the
/// real OS exit that follows is ignored by the monotonic status machine.
pub fn is_kill_signal(short: &str) -> bool {
    matches!(short, "KILL" | "TERM")
}

/// Detail attached to a terminal status transition.
#[derive(Debug, Default)]
pub struct StatusDetails {
    pub exit_code: Option<i32>,
    pub signaled: bool,
    pub error: Option<String>,
}

/// Read-only snapshot of one tracked process.
#[derive(Debug, Clone)]
pub struct ProcessSummary {
    pub id: Uuid,
    pub command: String,
    pub description: String,
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub signaled: bool,
    pub overflowed: bool,
    pub show_stdin: bool,
    pub show_stdout: bool,
    pub error: Option<String>,
}

impl ProcessSummary {
    fn of(entry: &ProcessEntry) -> Self {
        Self {
            id: entry.id,
            command: entry.command.clone(),
            description: entry.description.clone(),
            status: entry.status,
            exit_code: entry.exit_code,
            started_at: entry.started_at,
            ended_at: entry.ended_at,
            signaled: entry.signaled,
            overflowed: entry.overflowed,
            show_stdin: entry.show_stdin,
            show_stdout: entry.show_stdout,
            error: entry.error.clone(),
        }
    }
}

/// Shared registry of shell processes.
///
/// Cheap to clone; every clone refers to the same table.
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    inner: Arc<Mutex<InstanceTracker<ProcessEntry>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new entry in `running` status and returns its id.
    ///
    /// The entry is listable immediately, before the process has spawned.
    pub async fn register(
        &self,
        command: &str,
        description: &str,
        show_stdin: bool,
        show_stdout: bool,
    ) -> Uuid {
        let mut tracker = self.inner.lock().await;
        let id = tracker.register_with(|id| {
            ProcessEntry::new(
                id,
                command.to_string(),
                description.to_string(),
                show_stdin,
                show_stdout,
            )
        });
        info!(%id, command, "registered shell process");
        id
    }

    /// Attaches the spawned child's pid and stdin handle to an entry.
    pub(crate) async fn attach_child(
        &self,
        id: Uuid,
        pid: Option<u32>,
        stdin: Option<ChildStdin>,
    ) -> Result<(), ShellError> {
        let mut tracker = self.inner.lock().await;
        let entry = tracker.get_mut(id).ok_or(ShellError::UnknownInstance(id))?;
        entry.pid = pid;
        entry.stdin = stdin;
        Ok(())
    }

    /// Applies a terminal status with its details.
    ///
    /// No-op for unknown ids and entries that are already terminal: the first
    /// terminal transition wins and later reports (a real exit after an
    /// authoritative kill) are discarded. Flips the entry's completion
    /// channel so any start arbitration racing the deadline wakes up.
    pub async fn update_status(&self, id: Uuid, status: RunStatus, details: StatusDetails) -> bool {
        let mut tracker = self.inner.lock().await;
        let applied = tracker.update_status(id, status, |entry| {
            entry.exit_code = details.exit_code;
            entry.signaled = details.signaled;
            entry.error = details.error;
            // Drop the handle; a terminal process has no stdin to write to.
            entry.stdin = None;
        });
        if applied {
            if let Some(entry) = tracker.get(id) {
                let _ = entry.done.send(true);
            }
        }
        applied
    }

    /// A receiver that resolves when the entry reaches a terminal status.
    pub async fn completion(&self, id: Uuid) -> Result<watch::Receiver<bool>, ShellError> {
        let tracker = self.inner.lock().await;
        let entry = tracker.get(id).ok_or(ShellError::UnknownInstance(id))?;
        Ok(entry.done.subscribe())
    }

    /// Appends a chunk of captured output.
    ///
    /// Returns the entry's `show_stdout` flag so the caller can decide
    /// whether to echo the chunk to the host console. Unknown ids are logged
    /// and ignored, since a reader task can outlive a swept entry.
    pub async fn append_output(&self, id: Uuid, stream: OutputStream, chunk: &str) -> bool {
        let mut tracker = self.inner.lock().await;
        let Some(entry) = tracker.get_mut(id) else {
            warn!(%id, "output for unknown shell instance dropped");
            return false;
        };
        if !entry.append(stream, chunk) {
            debug!(%id, ?stream, "stream buffer full, chunk dropped");
        }
        entry.show_stdout
    }

    /// Atomically takes everything captured so far for one entry.
    pub async fn drain_output(&self, id: Uuid) -> Result<(String, String), ShellError> {
        let mut tracker = self.inner.lock().await;
        let entry = tracker.get_mut(id).ok_or(ShellError::UnknownInstance(id))?;
        Ok(entry.drain())
    }

    /// Snapshot of one entry.
    pub async fn snapshot(&self, id: Uuid) -> Result<ProcessSummary, ShellError> {
        let tracker = self.inner.lock().await;
        let entry = tracker.get(id).ok_or(ShellError::UnknownInstance(id))?;
        Ok(ProcessSummary::of(entry))
    }

    /// Snapshots of all entries in insertion order, narrowed by status.
    pub async fn list(&self, filter: StatusFilter) -> Vec<ProcessSummary> {
        let tracker = self.inner.lock().await;
        tracker
            .list(filter)
            .into_iter()
            .map(ProcessSummary::of)
            .collect()
    }

    /// Overrides the console echo flags. `None` leaves a flag unchanged.
    pub async fn set_echo_flags(
        &self,
        id: Uuid,
        show_stdin: Option<bool>,
        show_stdout: Option<bool>,
    ) -> Result<(), ShellError> {
        let mut tracker = self.inner.lock().await;
        let entry = tracker.get_mut(id).ok_or(ShellError::UnknownInstance(id))?;
        if let Some(v) = show_stdin {
            entry.show_stdin = v;
        }
        if let Some(v) = show_stdout {
            entry.show_stdout = v;
        }
        Ok(())
    }

    /// Writes a line to the process stdin.
    ///
    /// A trailing newline is appended when missing so the child's line reader
    /// sees a complete line. Callers check `running` status first; a missing
    /// handle here means the process died between the check and the write.
    pub async fn write_stdin(&self, id: Uuid, input: &str) -> Result<(), ShellError> {
        // Take the handle out so the table lock is not held across the write:
        // a child that never reads stdin leaves the pipe full, and the write
        // must not stall unrelated instances. While the write is in flight a
        // concurrent writer sees a closed stdin.
        let mut stdin = {
            let mut tracker = self.inner.lock().await;
            let entry = tracker.get_mut(id).ok_or(ShellError::UnknownInstance(id))?;
            entry
                .stdin
                .take()
                .ok_or_else(|| ShellError::WriteFailure("stdin is closed".to_string()))?
        };

        let mut line = input.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await
        }
        .await;

        // Restore the handle unless the entry went terminal in the meantime;
        // update_status already dropped its (empty) slot in that case.
        {
            let mut tracker = self.inner.lock().await;
            if let Some(entry) = tracker.get_mut(id) {
                if !entry.status.is_terminal() {
                    entry.stdin = Some(stdin);
                }
            }
        }

        written.map_err(|e| ShellError::WriteFailure(e.to_string()))
    }

    /// Delivers a POSIX signal to the process by name.
    ///
    /// Kill-class signals (`KILL`, `TERM`) are authoritative: successful
    /// delivery immediately marks the entry `terminated` without waiting for
    /// the OS to report the death. Signals to an already-terminal entry are
    /// accepted and do nothing.
    pub async fn send_signal(&self, id: Uuid, signal: &str) -> Result<(), ShellError> {
        let short = normalize_signal(signal)
            .ok_or_else(|| ShellError::SignalFailure(format!("unknown signal: {signal}")))?;

        let (pid, status) = {
            let tracker = self.inner.lock().await;
            let entry = tracker.get(id).ok_or(ShellError::UnknownInstance(id))?;
            (entry.pid, entry.status)
        };
        if status.is_terminal() {
            debug!(%id, signal = %short, "signal to terminal instance ignored");
            return Ok(());
        }
        let pid = pid.ok_or_else(|| {
            ShellError::SignalFailure("process has no pid to signal".to_string())
        })?;

        deliver_signal(pid, &short).await?;
        info!(%id, pid, signal = %short, "signal delivered");

        if is_kill_signal(&short) {
            self.update_status(
                id,
                RunStatus::Terminated,
                StatusDetails {
                    signaled: true,
                    ..StatusDetails::default()
                },
            )
            .await;
        }
        Ok(())
    }

    /// Sends `SIGTERM` to every running process. Used at server shutdown.
    pub async fn terminate_all(&self) {
        let running = {
            let tracker = self.inner.lock().await;
            tracker.ids(StatusFilter::Running)
        };
        for id in running {
            if let Err(e) = self.send_signal(id, "TERM").await {
                warn!(%id, error = %e, "failed to terminate process at shutdown");
            }
        }
    }

    /// Sweeps terminal entries older than the threshold. Returns the number
    /// removed.
    pub async fn cleanup(&self, older_than: Duration) -> usize {
        let mut tracker = self.inner.lock().await;
        tracker.cleanup(older_than).len()
    }

    /// Number of tracked entries, any status.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// True when no entries are tracked.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

/// Runs `kill -s <name> <pid>`, the portable way to deliver an arbitrary
/// named signal without a libc binding.
async fn deliver_signal(pid: u32, short: &str) -> Result<(), ShellError> {
    let output = tokio::process::Command::new("kill")
        .arg("-s")
        .arg(short)
        .arg(pid.to_string())
        .output()
        .await
        .map_err(|e| ShellError::SignalFailure(e.to_string()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ShellError::SignalFailure(format!(
            "kill -s {short} {pid} failed: {}",
            stderr.trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_names_normalize_with_and_without_prefix() {
        assert_eq!(normalize_signal("SIGTERM").as_deref(), Some("TERM"));
        assert_eq!(normalize_signal("term").as_deref(), Some("TERM"));
        assert_eq!(normalize_signal("USR1").as_deref(), Some("USR1"));
        assert!(normalize_signal("NOPE").is_none());
    }

    #[test]
    fn only_kill_and_term_are_kill_class() {
        assert!(is_kill_signal("KILL"));
        assert!(is_kill_signal("TERM"));
        assert!(!is_kill_signal("INT"));
        assert!(!is_kill_signal("USR2"));
    }

    #[tokio::test]
    async fn register_then_snapshot() {
        let registry = ProcessRegistry::new();
        let id = registry.register("echo hi", "greeting", false, false).await;
        let snap = registry.snapshot(id).await.unwrap();
        assert_eq!(snap.command, "echo hi");
        assert_eq!(snap.status, RunStatus::Running);
        assert!(snap.exit_code.is_none());
    }

    #[tokio::test]
    async fn drain_is_read_and_clear() {
        let registry = ProcessRegistry::new();
        let id = registry.register("true", "", false, false).await;
        registry.append_output(id, OutputStream::Stdout, "one").await;
        registry.append_output(id, OutputStream::Stderr, "two").await;

        let (out, err) = registry.drain_output(id).await.unwrap();
        assert_eq!((out.as_str(), err.as_str()), ("one", "two"));
        let (out, err) = registry.drain_output(id).await.unwrap();
        assert!(out.is_empty() && err.is_empty());
    }

    #[tokio::test]
    async fn unknown_instance_is_reported() {
        let registry = ProcessRegistry::new();
        let missing = Uuid::new_v4();
        assert!(matches!(
            registry.drain_output(missing).await,
            Err(ShellError::UnknownInstance(_))
        ));
        assert!(matches!(
            registry.send_signal(missing, "TERM").await,
            Err(ShellError::UnknownInstance(_))
        ));
    }

    #[tokio::test]
    async fn terminal_update_flips_completion_channel() {
        let registry = ProcessRegistry::new();
        let id = registry.register("true", "", false, false).await;
        let mut done = registry.completion(id).await.unwrap();
        assert!(!*done.borrow());

        registry
            .update_status(
                id,
                RunStatus::Completed,
                StatusDetails {
                    exit_code: Some(0),
                    ..StatusDetails::default()
                },
            )
            .await;
        done.changed().await.unwrap();
        assert!(*done.borrow());

        let snap = registry.snapshot(id).await.unwrap();
        assert_eq!(snap.status, RunStatus::Completed);
        assert_eq!(snap.exit_code, Some(0));
        assert!(snap.ended_at.is_some());
    }

    #[tokio::test]
    async fn echo_flags_can_be_overridden_later() {
        let registry = ProcessRegistry::new();
        let id = registry.register("true", "", false, false).await;
        registry.set_echo_flags(id, Some(true), None).await.unwrap();
        let snap = registry.snapshot(id).await.unwrap();
        assert!(snap.show_stdin);
        assert!(!snap.show_stdout);
    }

    #[tokio::test]
    async fn cleanup_reports_removed_count() {
        let registry = ProcessRegistry::new();
        let done = registry.register("true", "", false, false).await;
        let live = registry.register("sleep 99", "", false, false).await;
        registry
            .update_status(done, RunStatus::Completed, StatusDetails::default())
            .await;

        assert_eq!(registry.cleanup(Duration::ZERO).await, 1);
        assert_eq!(registry.len().await, 1);
        assert!(registry.snapshot(live).await.is_ok());
    }
}
