//! Blocking and non-blocking drivers for the step function.

use crate::builder::Resolution;
use crate::compiler::CompiledSpec;
use crate::core::RunState;
use crate::engine::step::{self, Step};
use crate::engine::{ExecutionError, Outcome};
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::oneshot::{self, error::TryRecvError};

/// Run the loop on the calling thread.
///
/// A continuation that already fired is taken without blocking, so
/// synchronous specs never park the thread. A handler still in flight is
/// waited on with [`wait`].
pub(crate) fn drive_blocking<R>(
    spec: &CompiledSpec<R>,
    resources: &R,
    mut state: RunState<R>,
) -> Result<Outcome<R>, ExecutionError> {
    loop {
        let (pending, mut receiver) = match step::enter(spec, resources, state) {
            Step::Done(result) => return result,
            Step::Pending(pending, receiver) => (pending, receiver),
        };
        let resolution = match receiver.try_recv() {
            Ok(resolution) => Some(resolution),
            Err(TryRecvError::Empty) => match wait(receiver) {
                Ok(resolution) => resolution,
                Err(()) => {
                    return Err(ExecutionError::BlockedRuntime(pending.state_id().clone()))
                }
            },
            Err(TryRecvError::Closed) => None,
        };
        state = step::settle(spec, resources, pending, resolution);
    }
}

/// Park the calling thread until the continuation resolves.
///
/// Outside a runtime this is a plain blocking receive. On a multi-thread
/// runtime worker the worker's other tasks are moved off first. A
/// current-thread runtime cannot be parked at all.
fn wait(receiver: oneshot::Receiver<Resolution>) -> Result<Option<Resolution>, ()> {
    match Handle::try_current() {
        Err(_) => Ok(receiver.blocking_recv().ok()),
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            Ok(tokio::task::block_in_place(|| handle.block_on(receiver)).ok())
        }
        Ok(_) => Err(()),
    }
}

/// Run the loop as a future, awaiting each continuation in turn.
pub(crate) async fn drive_async<R>(
    spec: CompiledSpec<R>,
    resources: Arc<R>,
    mut state: RunState<R>,
) -> Result<Outcome<R>, ExecutionError> {
    loop {
        let (pending, receiver) = match step::enter(&spec, &*resources, state) {
            Step::Done(result) => return result,
            Step::Pending(pending, receiver) => (pending, receiver),
        };
        let resolution = receiver.await.ok();
        state = step::settle(&spec, &*resources, pending, resolution);
    }
}
