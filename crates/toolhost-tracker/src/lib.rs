//! Shared lifecycle tracking for toolhost background instances.
//!
//! Shell processes and sub-agents follow the same pattern: an instance is
//! registered with a fresh id and a `running` status, moves exactly once into
//! a terminal status (`completed`, `error`, or `terminated`), and is later
//! swept by an age-based cleanup. [`InstanceTracker`] implements that pattern
//! generically; the shell and agent crates supply the entry types.

mod status;
mod tracker;

pub use status::{RunStatus, StatusFilter};
pub use tracker::{InstanceTracker, Tracked, DEFAULT_RETENTION};
