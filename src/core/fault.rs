//! Run-time faults.
//!
//! A fault never aborts an execution directly: it is attached to the run
//! state and routed to the `error` state, whose handler decides what happens.

use super::state::StateId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error type raised by handlers.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Shared handle to the original error raised inside a handler.
///
/// Serializes as the error's message; a deserialized cause keeps only that
/// message.
#[derive(Clone)]
pub struct Cause(Arc<dyn StdError + Send + Sync + 'static>);

impl Cause {
    pub fn new(err: impl Into<BoxError>) -> Self {
        Cause(Arc::from(err.into()))
    }

    /// Access the original error as a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl StdError for Cause {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl Serialize for Cause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cause {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let message = String::deserialize(deserializer)?;
        Ok(Cause::new(RestoredCause(message)))
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct RestoredCause(String);

/// Structured fault attached to a run state on its way to `error`.
#[derive(Clone, Debug, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fault {
    /// The state's handler raised.
    #[error("state '{state_id}' failed: {cause}")]
    Handler {
        state_id: StateId,
        input: Value,
        #[source]
        cause: Cause,
    },

    /// An asynchronous handler dropped its continuation without resolving it.
    #[error("state '{state_id}' abandoned its continuation")]
    Abandoned { state_id: StateId, input: Value },

    /// No dispatch matched, or the matched target is not part of the spec.
    #[error(
        "no valid dispatch from '{current_state_id}': {}",
        describe_target(.target_state_id)
    )]
    Dispatch {
        current_state_id: StateId,
        target_state_id: Option<StateId>,
    },
}

fn describe_target(target: &Option<StateId>) -> String {
    match target {
        Some(target) => format!("target '{target}' is not declared"),
        None => "no predicate matched".to_string(),
    }
}

impl Fault {
    pub fn handler(state_id: StateId, input: Value, cause: impl Into<BoxError>) -> Self {
        Fault::Handler {
            state_id,
            input,
            cause: Cause::new(cause),
        }
    }

    /// The state that was executing when the fault occurred.
    pub fn state_id(&self) -> &StateId {
        match self {
            Fault::Handler { state_id, .. } | Fault::Abandoned { state_id, .. } => state_id,
            Fault::Dispatch {
                current_state_id, ..
            } => current_state_id,
        }
    }
}
