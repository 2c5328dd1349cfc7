//! Execution engine.
//!
//! Drives a [`CompiledSpec`] from its current state until it reaches `end`
//! or `error`, or pauses at `halt`. Both execution modes share one step
//! function and differ only in how they wait for a handler's continuation:
//!
//! - **Blocking**: the calling thread runs the loop and waits on each
//!   handler's oneshot channel.
//! - **Non-blocking**: the loop is a future that awaits the same channel,
//!   one step per iteration.
//!
//! # Example
//!
//! ```rust
//! use waypoint::builder::{Declaration, StateDecl};
//! use waypoint::compiler::compile;
//! use serde_json::json;
//!
//! let spec = compile(
//!     Declaration::<()>::new().state(
//!         "start",
//!         StateDecl::sync(|_, mut d| {
//!             let count = d["count"].as_i64().unwrap_or(0) + 1;
//!             d["count"] = json!(count);
//!             Ok(d)
//!         })
//!         .when("end", |d| d["count"].as_i64().unwrap_or(0) > 3)
//!         .always("start"),
//!     ),
//! )
//! .unwrap();
//!
//! let outcome = spec.run_blocking((), None).unwrap();
//! assert_eq!(outcome.completed(), Some(json!({"count": 4})));
//! ```

mod driver;
mod step;

use crate::compiler::CompiledSpec;
use crate::core::{Cause, ExecutionMode, Fault, RunSnapshot, RunState, StateId};
use serde_json::Value;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How an execution ended without failing.
pub enum Outcome<R> {
    /// `end` was reached; holds its handler's value.
    Completed(Value),
    /// `halt` was reached; the run state can be fed back in to resume.
    Halted(RunState<R>),
}

impl<R> Outcome<R> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, Outcome::Halted(_))
    }

    /// The final payload, or the halted run state's payload.
    pub fn data(&self) -> &Value {
        match self {
            Outcome::Completed(data) => data,
            Outcome::Halted(state) => &state.data,
        }
    }

    pub fn completed(self) -> Option<Value> {
        match self {
            Outcome::Completed(data) => Some(data),
            Outcome::Halted(_) => None,
        }
    }

    pub fn halted(self) -> Option<RunState<R>> {
        match self {
            Outcome::Halted(state) => Some(state),
            Outcome::Completed(_) => None,
        }
    }
}

impl<R> fmt::Debug for Outcome<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed(data) => f.debug_tuple("Completed").field(data).finish(),
            Outcome::Halted(state) => f.debug_tuple("Halted").field(state).finish(),
        }
    }
}

/// Errors that end an execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Raised by the default `error` state. The context is the whole failing
    /// run state; the routed fault is both `context.fault` and the source.
    #[error("execution error")]
    Failed {
        context: Box<RunSnapshot>,
        #[source]
        cause: Option<Fault>,
    },

    /// A custom `end` or `error` handler returned an error.
    #[error("terminal state '{state_id}' raised: {cause}")]
    Raised {
        state_id: StateId,
        #[source]
        cause: Cause,
    },

    /// The run state points at a state the spec does not contain.
    #[error("unknown state '{0}'")]
    UnknownState(StateId),

    /// A blocking run had to wait on a handler from inside a
    /// current-thread runtime, which cannot be parked.
    #[error("cannot block on state '{0}' inside a current-thread runtime")]
    BlockedRuntime(StateId),
}

impl ExecutionError {
    pub(crate) fn failed<R>(state: &RunState<R>) -> Self {
        ExecutionError::Failed {
            context: Box::new(state.snapshot()),
            cause: state.fault.clone(),
        }
    }

    /// The fault routed to `error`, if this error carries one.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            ExecutionError::Failed { cause, .. } => cause.as_ref(),
            _ => None,
        }
    }

    /// Snapshot of the failing run state.
    pub fn context(&self) -> Option<&RunSnapshot> {
        match self {
            ExecutionError::Failed { context, .. } => Some(context),
            _ => None,
        }
    }
}

/// Result of [`run`]: immediate in blocking mode, deferred otherwise.
///
/// Both variants can be awaited.
pub enum Execution<R> {
    Ready(Result<Outcome<R>, ExecutionError>),
    Deferred(BoxFuture<'static, Result<Outcome<R>, ExecutionError>>),
}

impl<R> Execution<R> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Execution::Ready(_))
    }

    /// The result, when it was computed in blocking mode.
    pub fn into_ready(self) -> Option<Result<Outcome<R>, ExecutionError>> {
        match self {
            Execution::Ready(result) => Some(result),
            Execution::Deferred(_) => None,
        }
    }
}

impl<R: Send + 'static> IntoFuture for Execution<R> {
    type Output = Result<Outcome<R>, ExecutionError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Execution::Ready(result) => Box::pin(std::future::ready(result)),
            Execution::Deferred(future) => future,
        }
    }
}

impl<R> fmt::Debug for Execution<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Execution::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Execution::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Run `spec` in the mode chosen by the run state, or by the spec's shape
/// when the run state does not choose.
///
/// With no run state, execution starts at `start` with an empty object
/// payload and default options.
pub fn run<R: Send + Sync + 'static>(
    spec: &CompiledSpec<R>,
    resources: impl Into<Arc<R>>,
    state: Option<RunState<R>>,
) -> Execution<R> {
    let state = state.unwrap_or_default();
    let mode = state.mode.unwrap_or(if spec.is_async() {
        ExecutionMode::NonBlocking
    } else {
        ExecutionMode::Blocking
    });
    debug!(?mode, state = %state.current_state_id, "starting execution");

    match mode {
        ExecutionMode::Blocking => Execution::Ready(run_blocking(spec, resources, Some(state))),
        ExecutionMode::NonBlocking => Execution::Deferred(run_async(spec, resources, Some(state))),
    }
}

/// Run `spec` to completion on the calling thread.
///
/// Waits for asynchronous handlers by blocking. Inside a multi-thread
/// runtime the worker is handed off first; inside a current-thread runtime
/// a pending handler fails the run with [`ExecutionError::BlockedRuntime`].
pub fn run_blocking<R: Send + Sync + 'static>(
    spec: &CompiledSpec<R>,
    resources: impl Into<Arc<R>>,
    state: Option<RunState<R>>,
) -> Result<Outcome<R>, ExecutionError> {
    let resources = resources.into();
    driver::drive_blocking(spec, &*resources, resume(state))
}

/// Run `spec` as a future, whatever its shape. Nothing runs until the
/// future is polled.
pub fn run_async<R: Send + Sync + 'static>(
    spec: &CompiledSpec<R>,
    resources: impl Into<Arc<R>>,
    state: Option<RunState<R>>,
) -> BoxFuture<'static, Result<Outcome<R>, ExecutionError>> {
    Box::pin(driver::drive_async(
        spec.clone(),
        resources.into(),
        resume(state),
    ))
}

/// A fresh run state, or a resumed one with its previous state recovered.
fn resume<R>(state: Option<RunState<R>>) -> RunState<R> {
    state.map(RunState::recover_last).unwrap_or_default()
}
