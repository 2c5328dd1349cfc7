//! Per-execution run state.
//!
//! A [`RunState`] is threaded through the step loop by value: each step
//! consumes the previous one and produces its replacement. A halted run
//! state is handed back to the caller, who may store it (see
//! [`RunSnapshot`]) and feed it back in later to resume.

use super::fault::Fault;
use super::state::StateId;
use super::subscription::{Path, Subscriptions};
use super::trace::Trace;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Default bound on the number of retained trace segments.
pub const DEFAULT_MAX_TRACE: usize = 1000;

/// Interceptor applied before each step (`pre`) or after each successful
/// transition (`post`).
pub type Hook<R> = Arc<dyn Fn(RunState<R>, &R) -> RunState<R> + Send + Sync>;

/// How the engine drives an execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// The calling thread runs the whole loop and receives the result.
    Blocking,
    /// Each step is awaited; the caller receives a future.
    NonBlocking,
}

/// Execution options carried inside the run state.
pub struct RunOptions<R> {
    /// Maximum number of trace segments retained
    pub max_trace: usize,
    /// Watched payload paths
    pub subscriptions: Subscriptions,
    /// Applied at the top of every step
    pub pre: Option<Hook<R>>,
    /// Applied after every successful transition
    pub post: Option<Hook<R>>,
}

impl<R> RunOptions<R> {
    pub fn new() -> Self {
        Self {
            max_trace: DEFAULT_MAX_TRACE,
            subscriptions: Subscriptions::new(),
            pre: None,
            post: None,
        }
    }

    pub fn max_trace(mut self, max: usize) -> Self {
        self.max_trace = max;
        self
    }

    pub fn subscriptions(mut self, subscriptions: Subscriptions) -> Self {
        self.subscriptions = subscriptions;
        self
    }

    /// Watch a payload path (see [`Subscriptions::watch`]).
    pub fn watch<F>(mut self, path: impl Into<Path>, handler: F) -> Self
    where
        F: Fn(&Path, &Value, &Value) + Send + Sync + 'static,
    {
        self.subscriptions = self.subscriptions.watch(path, handler);
        self
    }

    pub fn pre<F>(mut self, hook: F) -> Self
    where
        F: Fn(RunState<R>, &R) -> RunState<R> + Send + Sync + 'static,
    {
        self.pre = Some(Arc::new(hook));
        self
    }

    pub fn post<F>(mut self, hook: F) -> Self
    where
        F: Fn(RunState<R>, &R) -> RunState<R> + Send + Sync + 'static,
    {
        self.post = Some(Arc::new(hook));
        self
    }
}

impl<R> Default for RunOptions<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for RunOptions<R> {
    fn clone(&self) -> Self {
        Self {
            max_trace: self.max_trace,
            subscriptions: self.subscriptions.clone(),
            pre: self.pre.clone(),
            post: self.post.clone(),
        }
    }
}

impl<R> fmt::Debug for RunOptions<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("max_trace", &self.max_trace)
            .field("subscriptions", &self.subscriptions)
            .field("pre", &self.pre.is_some())
            .field("post", &self.post.is_some())
            .finish()
    }
}

/// The full state of one execution.
///
/// # Example
///
/// ```rust
/// use waypoint::core::{RunOptions, RunState, StateId};
/// use serde_json::json;
///
/// let state: RunState<()> = RunState::with_options(
///     json!({"count": 0}),
///     RunOptions::new().max_trace(10),
/// );
///
/// assert_eq!(state.current_state_id, StateId::start());
/// assert!(state.last_state_id.is_none());
/// assert!(state.trace.is_empty());
/// ```
pub struct RunState<R> {
    /// State about to be visited
    pub current_state_id: StateId,
    /// Previously visited state
    pub last_state_id: Option<StateId>,
    /// Application payload
    pub data: Value,
    /// Bounded record of visited states
    pub trace: Trace,
    pub options: RunOptions<R>,
    /// Fault being routed to the `error` state
    pub fault: Option<Fault>,
    /// Per-run override of the compiled spec's execution mode
    pub mode: Option<ExecutionMode>,
}

impl<R> RunState<R> {
    /// Fresh run state at `start` with default options.
    pub fn new(data: Value) -> Self {
        Self::with_options(data, RunOptions::new())
    }

    /// Fresh run state at `start`. Subscriptions take their initial snapshot
    /// from `data`.
    pub fn with_options(data: Value, mut options: RunOptions<R>) -> Self {
        options.subscriptions = options.subscriptions.arm(&data);
        Self {
            current_state_id: StateId::start(),
            last_state_id: None,
            data,
            trace: Trace::new(),
            options,
            fault: None,
            mode: None,
        }
    }

    /// Rebuild a run state from a stored snapshot.
    ///
    /// Hooks and subscription handlers come from `options`; the snapshot
    /// supplies everything else, including `max_trace` and the last values
    /// seen by watched paths. A missing `last_state_id` is recovered from the
    /// newest trace segment.
    pub fn from_snapshot(snapshot: RunSnapshot, mut options: RunOptions<R>) -> Self {
        options.max_trace = snapshot.max_trace;
        options.subscriptions = options
            .subscriptions
            .arm(&snapshot.data)
            .restore(snapshot.watched);

        Self {
            current_state_id: snapshot.current_state_id,
            last_state_id: snapshot.last_state_id,
            data: snapshot.data,
            trace: snapshot.trace.truncate_to(options.max_trace),
            options,
            fault: snapshot.fault,
            mode: snapshot.mode,
        }
        .recover_last()
    }

    /// Fill a missing `last_state_id` from the newest trace segment, as left
    /// behind by `halt`.
    pub(crate) fn recover_last(mut self) -> Self {
        if self.last_state_id.is_none() {
            self.last_state_id = self.trace.last().map(|s| s.state_id.clone());
        }
        self
    }

    /// Serializable view of this run state, without hooks or handlers.
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            current_state_id: self.current_state_id.clone(),
            last_state_id: self.last_state_id.clone(),
            data: self.data.clone(),
            trace: self.trace.clone(),
            max_trace: self.options.max_trace,
            watched: self
                .options
                .subscriptions
                .watched()
                .map(|(path, value)| (path.clone(), value.clone()))
                .collect(),
            fault: self.fault.clone(),
            mode: self.mode,
        }
    }

    /// Force blocking or non-blocking execution for this run.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Position the run at `state_id`.
    pub fn at(mut self, state_id: impl Into<StateId>) -> Self {
        self.current_state_id = state_id.into();
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub(crate) fn apply_pre(self, resources: &R) -> Self {
        match self.options.pre.clone() {
            Some(hook) => hook(self, resources),
            None => self,
        }
    }

    pub(crate) fn apply_post(self, resources: &R) -> Self {
        match self.options.post.clone() {
            Some(hook) => hook(self, resources),
            None => self,
        }
    }

    /// Run subscriptions against the current payload.
    pub(crate) fn observe(mut self) -> Self {
        let subscriptions = std::mem::take(&mut self.options.subscriptions);
        self.options.subscriptions = subscriptions.observe(&self.data);
        self
    }
}

impl<R> Default for RunState<R> {
    fn default() -> Self {
        Self::new(Value::Object(Default::default()))
    }
}

impl<R> Clone for RunState<R> {
    fn clone(&self) -> Self {
        Self {
            current_state_id: self.current_state_id.clone(),
            last_state_id: self.last_state_id.clone(),
            data: self.data.clone(),
            trace: self.trace.clone(),
            options: self.options.clone(),
            fault: self.fault.clone(),
            mode: self.mode,
        }
    }
}

impl<R> fmt::Debug for RunState<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunState")
            .field("current_state_id", &self.current_state_id)
            .field("last_state_id", &self.last_state_id)
            .field("data", &self.data)
            .field("trace", &self.trace)
            .field("options", &self.options)
            .field("fault", &self.fault)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Serializable view of a [`RunState`].
///
/// Closures (hooks, subscription handlers) are not part of a snapshot; they
/// are supplied again through [`RunState::from_snapshot`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub current_state_id: StateId,
    pub last_state_id: Option<StateId>,
    pub data: Value,
    pub trace: Trace,
    pub max_trace: usize,
    /// Last observed value for each watched path
    pub watched: Vec<(Path, Value)>,
    pub fault: Option<Fault>,
    pub mode: Option<ExecutionMode>,
}
