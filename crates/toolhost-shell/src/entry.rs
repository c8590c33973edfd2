//! The per-process tracker entry.

use chrono::{DateTime, Utc};
use tokio::process::ChildStdin;
use tokio::sync::watch;
use toolhost_tracker::{RunStatus, Tracked};
use uuid::Uuid;

/// Cap on each captured stream. Once a stream would exceed this, further
/// chunks for it are dropped and the entry is flagged as overflowed, which
/// forces async mode so the caller is told the capture is partial.
pub const MAX_STREAM_BYTES: usize = 10 * 1024 * 1024;

/// Which output stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One tracked shell process.
///
/// Everything mutable here is guarded by the registry's lock; the entry
/// itself has no interior synchronization. The `done` channel flips to `true`
/// on the first terminal transition, whatever its cause, so the start
/// arbitration can race it against the deadline.
#[derive(Debug)]
pub struct ProcessEntry {
    pub id: Uuid,
    pub command: String,
    pub description: String,
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,

    pub stdout: String,
    pub stderr: String,
    /// Sticky: set when either stream hits [`MAX_STREAM_BYTES`], never
    /// cleared, not even by a drain.
    pub overflowed: bool,

    pub show_stdin: bool,
    pub show_stdout: bool,

    /// True when the entry was terminated by an explicit kill-class signal.
    pub signaled: bool,
    /// Failure detail for `Error` status (spawn failure message or similar).
    pub error: Option<String>,

    pub pid: Option<u32>,
    pub stdin: Option<ChildStdin>,
    pub done: watch::Sender<bool>,
}

impl ProcessEntry {
    pub fn new(id: Uuid, command: String, description: String, show_stdin: bool, show_stdout: bool) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            id,
            command,
            description,
            status: RunStatus::Running,
            exit_code: None,
            started_at: Utc::now(),
            ended_at: None,
            stdout: String::new(),
            stderr: String::new(),
            overflowed: false,
            show_stdin,
            show_stdout,
            signaled: false,
            error: None,
            pid: None,
            stdin: None,
            done,
        }
    }

    /// Appends a chunk to one stream, honoring the per-stream cap.
    ///
    /// Returns `false` when the chunk was dropped because the cap was hit.
    pub fn append(&mut self, stream: OutputStream, chunk: &str) -> bool {
        let buffer = match stream {
            OutputStream::Stdout => &mut self.stdout,
            OutputStream::Stderr => &mut self.stderr,
        };
        if buffer.len() + chunk.len() > MAX_STREAM_BYTES {
            self.overflowed = true;
            return false;
        }
        buffer.push_str(chunk);
        true
    }

    /// Takes everything captured so far, leaving both buffers empty.
    ///
    /// The overflow flag survives the drain: a capture that lost data stays
    /// marked as lossy for the lifetime of the entry.
    pub fn drain(&mut self) -> (String, String) {
        (
            std::mem::take(&mut self.stdout),
            std::mem::take(&mut self.stderr),
        )
    }
}

impl Tracked for ProcessEntry {
    fn status(&self) -> RunStatus {
        self.status
    }

    fn set_status(&mut self, status: RunStatus) {
        self.status = status;
    }

    fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    fn set_ended_at(&mut self, at: DateTime<Utc>) {
        self.ended_at = Some(at);
    }
}
