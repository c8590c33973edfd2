//! Shell execution tools with background session tracking.
//!
//! A started command is always registered as a tracked instance first. The
//! start path then races completion against a deadline: commands that finish
//! in time resolve *sync* with their complete output, slower ones resolve
//! *async* with an instance id for later interaction through `shellMessage`.
//! Either way the same registry entry backs every later poll, write, and
//! signal, and `listShells` reports all of them in start order.

pub mod arbiter;
pub mod entry;
pub mod error;
pub mod launcher;
pub mod registry;
pub mod session;
pub mod tools;

pub use arbiter::{start, StartOutcome, StartRequest, DEFAULT_TIMEOUT};
pub use entry::{OutputStream, ProcessEntry, MAX_STREAM_BYTES};
pub use error::ShellError;
pub use registry::{ProcessRegistry, ProcessSummary, StatusDetails};
pub use session::{interact, MessageOutcome, MessageRequest, SETTLE_DELAY};
pub use tools::{ListShellsTool, ShellMessageTool, ShellStartTool};
