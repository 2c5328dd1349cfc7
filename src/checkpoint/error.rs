//! Checkpoint error types.

use crate::core::StateId;
use thiserror::Error;

/// Errors that can occur while storing or restoring a checkpoint
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The checkpoint could not be encoded or decoded as JSON
    #[error("checkpoint JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),

    /// Checkpoint was written by an incompatible format version
    #[error("unsupported checkpoint version {found}, supported: {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Execution cannot resume at the recorded state
    #[error("cannot resume at reserved state '{0}'")]
    NotResumable(StateId),

    /// The recorded trace exceeds its own bound
    #[error("trace holds {len} segments but max_trace is {max}")]
    TraceOverflow { len: usize, max: usize },
}
