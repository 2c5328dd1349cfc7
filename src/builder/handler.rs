//! State handlers and the continuation calling convention.

use crate::core::{BoxError, Fault, RunState, StateId};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;

/// Handler that returns its new payload directly.
pub type SyncHandler<R> = Arc<dyn Fn(&R, Value) -> Result<Value, BoxError> + Send + Sync>;

/// Handler that reports its new payload through a [`Continuation`], possibly
/// from another thread and possibly later.
pub type AsyncHandler<R> = Arc<dyn Fn(&R, Value, Continuation) + Send + Sync>;

/// Handler for the `end` or `error` state; receives the whole run state.
pub type TerminalHandler<R> =
    Arc<dyn Fn(&R, &RunState<R>) -> Result<Value, BoxError> + Send + Sync>;

/// A handler as declared by the workflow author.
pub enum HandlerSpec<R> {
    Sync(SyncHandler<R>),
    Async(AsyncHandler<R>),
    Terminal(TerminalHandler<R>),
}

impl<R> HandlerSpec<R> {
    pub fn sync<F>(handler: F) -> Self
    where
        F: Fn(&R, Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        HandlerSpec::Sync(Arc::new(handler))
    }

    pub fn asynchronous<F>(handler: F) -> Self
    where
        F: Fn(&R, Value, Continuation) + Send + Sync + 'static,
    {
        HandlerSpec::Async(Arc::new(handler))
    }

    pub fn terminal<F>(handler: F) -> Self
    where
        F: Fn(&R, &RunState<R>) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        HandlerSpec::Terminal(Arc::new(handler))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, HandlerSpec::Async(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, HandlerSpec::Terminal(_))
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            HandlerSpec::Sync(_) => "sync",
            HandlerSpec::Async(_) => "async",
            HandlerSpec::Terminal(_) => "terminal",
        }
    }
}

impl<R> Clone for HandlerSpec<R> {
    fn clone(&self) -> Self {
        match self {
            HandlerSpec::Sync(h) => HandlerSpec::Sync(Arc::clone(h)),
            HandlerSpec::Async(h) => HandlerSpec::Async(Arc::clone(h)),
            HandlerSpec::Terminal(h) => HandlerSpec::Terminal(Arc::clone(h)),
        }
    }
}

impl<R> fmt::Debug for HandlerSpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerSpec::{}", self.kind())
    }
}

/// Result delivered through a continuation, stamped with when it arrived.
#[derive(Debug)]
pub(crate) struct Resolution {
    pub(crate) result: Result<Value, Fault>,
    pub(crate) resolved_at: Instant,
}

/// Single-use completion handle given to every handler invocation.
///
/// Exactly one of [`succeed`](Continuation::succeed) or
/// [`fail`](Continuation::fail) should be called, from any thread. Dropping
/// the continuation without calling either is reported as
/// [`Fault::Abandoned`].
///
/// # Example
///
/// ```rust
/// use waypoint::builder::{Declaration, StateDecl};
/// use serde_json::json;
///
/// let decl: Declaration<()> = Declaration::new().state(
///     "start",
///     StateDecl::asynchronous(|_res, data, k| {
///         std::thread::spawn(move || k.succeed(data));
///     })
///     .always("end"),
/// );
/// ```
pub struct Continuation {
    state_id: StateId,
    input: Value,
    sender: oneshot::Sender<Resolution>,
}

impl Continuation {
    pub(crate) fn channel(
        state_id: StateId,
        input: Value,
    ) -> (Continuation, oneshot::Receiver<Resolution>) {
        let (sender, receiver) = oneshot::channel();
        let continuation = Continuation {
            state_id,
            input,
            sender,
        };
        (continuation, receiver)
    }

    /// The state whose handler holds this continuation.
    pub fn state_id(&self) -> &StateId {
        &self.state_id
    }

    /// Complete the state with a new payload.
    pub fn succeed(self, data: Value) {
        self.deliver(Ok(data));
    }

    /// Complete the state with an error; it is routed to `error`.
    pub fn fail(self, err: impl Into<BoxError>) {
        let fault = Fault::handler(self.state_id.clone(), self.input.clone(), err);
        self.deliver(Err(fault));
    }

    /// Complete the state from a `Result`.
    pub fn resolve(self, result: Result<Value, BoxError>) {
        match result {
            Ok(data) => self.succeed(data),
            Err(err) => self.fail(err),
        }
    }

    fn deliver(self, result: Result<Value, Fault>) {
        let resolution = Resolution {
            result,
            resolved_at: Instant::now(),
        };
        // The execution may have been dropped by its caller.
        let _ = self.sender.send(resolution);
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("state_id", &self.state_id)
            .finish_non_exhaustive()
    }
}
