//! Checkpoint and resume functionality for halted executions.
//!
//! The engine never stores anything itself: a halted execution hands its
//! run state back to the caller. This module wraps that run state in a
//! versioned, serializable envelope so long-running workflows can survive
//! process restarts.

use crate::core::{RunOptions, RunSnapshot, RunState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

mod error;

pub use error::CheckpointError;

/// Version identifier for checkpoint format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serializable checkpoint of a halted run state.
/// Does NOT include hooks or subscription handlers (not serializable).
///
/// # Example
///
/// ```rust
/// use waypoint::builder::{Declaration, StateDecl};
/// use waypoint::checkpoint::Checkpoint;
/// use waypoint::compiler::compile;
/// use waypoint::core::{RunOptions, RunState};
/// use serde_json::json;
///
/// let spec = compile(
///     Declaration::<()>::new().state(
///         "start",
///         StateDecl::sync(|_, d| Ok(d))
///             .when("end", |d| d["approved"] == json!(true))
///             .always("halt"),
///     ),
/// )
/// .unwrap();
///
/// let halted = spec.run_blocking((), None).unwrap().halted().unwrap();
/// let json = Checkpoint::from_halted(&halted).to_json().unwrap();
///
/// // ...later, possibly in another process
/// let checkpoint = Checkpoint::from_json(&json).unwrap();
/// let resumed: RunState<()> = checkpoint.restore(RunOptions::new()).unwrap();
/// let resumed = resumed.with_data(json!({"approved": true}));
///
/// let outcome = spec.run_blocking((), Some(resumed)).unwrap();
/// assert_eq!(outcome.completed(), Some(json!({"approved": true})));
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint format version
    pub version: u32,

    /// Unique checkpoint identifier
    pub id: Uuid,

    /// When checkpoint was created
    pub timestamp: DateTime<Utc>,

    /// The halted run state
    pub snapshot: RunSnapshot,
}

impl Checkpoint {
    /// Capture a run state returned by `halt`.
    pub fn from_halted<R>(state: &RunState<R>) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            snapshot: state.snapshot(),
        }
    }

    /// Serialize checkpoint to JSON format.
    pub fn to_json(&self) -> Result<String, CheckpointError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize checkpoint from JSON format, rejecting invalid ones.
    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        let checkpoint: Self = serde_json::from_str(json)?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    /// Check the format version and that the checkpoint points at a state
    /// execution can resume from.
    pub fn validate(&self) -> Result<(), CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: self.version,
                supported: CHECKPOINT_VERSION,
            });
        }

        let current = &self.snapshot.current_state_id;
        if current.is_terminal() {
            return Err(CheckpointError::NotResumable(current.clone()));
        }

        let (len, max) = (self.snapshot.trace.len(), self.snapshot.max_trace);
        if len > max {
            return Err(CheckpointError::TraceOverflow { len, max });
        }

        Ok(())
    }

    /// Rebuild a resumable run state. Hooks and subscription handlers come
    /// from `options`; see [`RunState::from_snapshot`].
    pub fn restore<R>(&self, options: RunOptions<R>) -> Result<RunState<R>, CheckpointError> {
        self.validate()?;
        debug!(
            checkpoint = %self.id,
            resume_at = %self.snapshot.current_state_id,
            "restoring checkpoint"
        );
        Ok(RunState::from_snapshot(self.snapshot.clone(), options))
    }
}
