//! Agent subsystem errors.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by agent operations. The tools fold these into JSON
/// payloads rather than surfacing protocol errors.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No tracked agent has this id (never existed or already swept).
    #[error("no agent found with id {0}")]
    UnknownInstance(Uuid),
}
