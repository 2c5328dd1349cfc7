//! Compiled specifications.

use crate::builder::{AsyncHandler, Continuation, SyncHandler, TerminalHandler};
use crate::core::{BoxError, Cause, Predicate, RunState, StateId};
use crate::engine::{self, BoxFuture, Execution, ExecutionError, Outcome};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

/// Engine-facing handler for `end`, `halt` and `error`.
pub(crate) type TerminalFn<R> =
    Arc<dyn Fn(&R, RunState<R>) -> Result<Outcome<R>, ExecutionError> + Send + Sync>;

/// A non-terminal state after compilation.
pub(crate) struct CompiledState<R> {
    pub(crate) handler: AsyncHandler<R>,
    pub(crate) dispatches: Vec<(StateId, Predicate)>,
    pub(crate) is_async: bool,
}

pub(crate) enum Node<R> {
    Step(CompiledState<R>),
    Terminal(TerminalFn<R>),
}

struct Inner<R> {
    nodes: BTreeMap<StateId, Node<R>>,
    is_async: bool,
}

/// An immutable, validated, executable workflow.
///
/// Cloning is cheap and clones share the same compiled states, so one spec
/// can drive many concurrent, independently owned executions.
pub struct CompiledSpec<R> {
    inner: Arc<Inner<R>>,
}

impl<R> CompiledSpec<R> {
    /// Merge engine-owned terminal handlers into the user's states.
    pub(crate) fn new(mut nodes: BTreeMap<StateId, Node<R>>) -> Self
    where
        R: 'static,
    {
        nodes
            .entry(StateId::end())
            .or_insert_with(|| Node::Terminal(default_end()));
        nodes
            .entry(StateId::error())
            .or_insert_with(|| Node::Terminal(default_error()));
        nodes.insert(StateId::halt(), Node::Terminal(halt()));

        let is_async = nodes
            .values()
            .any(|node| matches!(node, Node::Step(state) if state.is_async));

        Self {
            inner: Arc::new(Inner { nodes, is_async }),
        }
    }

    /// True when any state was declared asynchronous. Selects the default
    /// execution mode.
    pub fn is_async(&self) -> bool {
        self.inner.is_async
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.nodes.contains_key(id)
    }

    /// All states, including the engine-owned terminals.
    pub fn state_ids(&self) -> impl Iterator<Item = &StateId> + '_ {
        self.inner.nodes.keys()
    }

    /// Dispatch targets of a non-terminal state, in evaluation order.
    pub fn dispatch_targets(&self, id: &str) -> Option<Vec<&StateId>> {
        match self.inner.nodes.get(id)? {
            Node::Step(state) => Some(state.dispatches.iter().map(|(t, _)| t).collect()),
            Node::Terminal(_) => None,
        }
    }

    /// The compiled predicate of the `index`-th dispatch of `id`.
    pub fn predicate(&self, id: &str, index: usize) -> Option<&Predicate> {
        match self.inner.nodes.get(id)? {
            Node::Step(state) => state.dispatches.get(index).map(|(_, p)| p),
            Node::Terminal(_) => None,
        }
    }

    /// Target selected by the first dispatch of `id` whose predicate holds
    /// on `data`, without running any handler.
    pub fn resolve(&self, id: &str, data: &Value) -> Option<&StateId> {
        match self.inner.nodes.get(id)? {
            Node::Step(state) => state
                .dispatches
                .iter()
                .find(|(_, predicate)| predicate.check(data))
                .map(|(target, _)| target),
            Node::Terminal(_) => None,
        }
    }

    pub(crate) fn node(&self, id: &str) -> Option<&Node<R>> {
        self.inner.nodes.get(id)
    }
}

impl<R: Send + Sync + 'static> CompiledSpec<R> {
    /// See [`engine::run`].
    pub fn run(&self, resources: impl Into<Arc<R>>, state: Option<RunState<R>>) -> Execution<R> {
        engine::run(self, resources, state)
    }

    /// See [`engine::run_blocking`].
    pub fn run_blocking(
        &self,
        resources: impl Into<Arc<R>>,
        state: Option<RunState<R>>,
    ) -> Result<Outcome<R>, ExecutionError> {
        engine::run_blocking(self, resources, state)
    }

    /// See [`engine::run_async`].
    pub fn run_async(
        &self,
        resources: impl Into<Arc<R>>,
        state: Option<RunState<R>>,
    ) -> BoxFuture<'static, Result<Outcome<R>, ExecutionError>> {
        engine::run_async(self, resources, state)
    }
}

impl<R> Clone for CompiledSpec<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> fmt::Debug for CompiledSpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSpec")
            .field("states", &self.inner.nodes.keys().collect::<Vec<_>>())
            .field("is_async", &self.inner.is_async)
            .finish()
    }
}

/// A synchronous handler panicked.
#[derive(Debug, Error)]
#[error("handler panicked: {0}")]
pub struct HandlerPanic(pub String);

impl HandlerPanic {
    pub(crate) fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        HandlerPanic(message)
    }
}

/// Bring a synchronous handler to the continuation calling convention.
///
/// The handler runs inside `catch_unwind`; its result, error, or panic is
/// delivered through the continuation.
pub(crate) fn normalize<R: 'static>(handler: SyncHandler<R>) -> AsyncHandler<R> {
    Arc::new(move |resources: &R, data: Value, k: Continuation| {
        match panic::catch_unwind(AssertUnwindSafe(|| handler(resources, data))) {
            Ok(result) => k.resolve(result),
            Err(payload) => k.fail(HandlerPanic::from_payload(payload)),
        }
    })
}

/// Wrap an author-supplied `end` / `error` handler.
pub(crate) fn custom_terminal<R: 'static>(
    state_id: StateId,
    handler: TerminalHandler<R>,
) -> TerminalFn<R> {
    Arc::new(move |resources: &R, state: RunState<R>| {
        handler(resources, &state)
            .map(Outcome::Completed)
            .map_err(|err: BoxError| ExecutionError::Raised {
                state_id: state_id.clone(),
                cause: Cause::new(err),
            })
    })
}

fn default_end<R: 'static>() -> TerminalFn<R> {
    Arc::new(|_: &R, state: RunState<R>| Ok(Outcome::Completed(state.data)))
}

fn default_error<R: 'static>() -> TerminalFn<R> {
    Arc::new(|_: &R, state: RunState<R>| Err(ExecutionError::failed(&state)))
}

fn halt<R: 'static>() -> TerminalFn<R> {
    Arc::new(|_: &R, state: RunState<R>| Ok(Outcome::Halted(state)))
}
