//! The single step function shared by both drivers.
//!
//! A step is split around the handler's continuation: [`enter`] runs
//! everything up to and including the handler invocation, [`settle`] runs
//! everything after the continuation resolved. The drivers only differ in
//! how they wait between the two.

use crate::builder::{Continuation, Resolution};
use crate::compiler::{CompiledSpec, Node};
use crate::core::{Fault, RunState, StateId, TraceSegment};
use crate::engine::{ExecutionError, Outcome};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Result of entering a state.
pub(crate) enum Step<R> {
    /// A terminal state produced the execution's final result.
    Done(Result<Outcome<R>, ExecutionError>),
    /// A handler is in flight; its result arrives on the receiver.
    Pending(Pending<R>, oneshot::Receiver<Resolution>),
}

/// Run state of a step whose handler has been invoked.
pub(crate) struct Pending<R> {
    state: RunState<R>,
    invoked_at: Instant,
}

impl<R> Pending<R> {
    pub(crate) fn state_id(&self) -> &StateId {
        &self.state.current_state_id
    }
}

/// Apply the pre-hook, observe subscriptions, then either finish at a
/// terminal state or invoke the current state's handler.
pub(crate) fn enter<R>(spec: &CompiledSpec<R>, resources: &R, state: RunState<R>) -> Step<R> {
    let state = state.apply_pre(resources).observe();
    let id = state.current_state_id.clone();

    let Some(node) = spec.node(id.name()) else {
        warn!(state = %id, "state is not part of the compiled spec");
        return Step::Done(Err(ExecutionError::UnknownState(id)));
    };

    match node {
        Node::Terminal(terminal) => {
            let state = if id.is_halt() { rewind(state) } else { state };
            let result = terminal(resources, state);
            match &result {
                Ok(Outcome::Completed(_)) => info!(state = %id, "execution completed"),
                Ok(Outcome::Halted(halted)) => {
                    info!(resume_at = %halted.current_state_id, "execution halted")
                }
                Err(err) => warn!(state = %id, error = %err, "execution failed"),
            }
            Step::Done(result)
        }
        Node::Step(compiled) => {
            debug!(state = %id, "entering state");
            let (continuation, receiver) = Continuation::channel(id, state.data.clone());
            let invoked_at = Instant::now();
            (compiled.handler)(resources, state.data.clone(), continuation);
            Step::Pending(Pending { state, invoked_at }, receiver)
        }
    }
}

/// Finish a step once its continuation resolved. `None` means the handler
/// dropped its continuation.
pub(crate) fn settle<R>(
    spec: &CompiledSpec<R>,
    resources: &R,
    pending: Pending<R>,
    resolution: Option<Resolution>,
) -> RunState<R> {
    let Pending { state, invoked_at } = pending;

    match resolution {
        Some(Resolution {
            result: Ok(output),
            resolved_at,
        }) => {
            let elapsed = resolved_at.saturating_duration_since(invoked_at);
            transition(spec, resources, state, output, elapsed)
        }
        Some(Resolution {
            result: Err(fault),
            resolved_at,
        }) => {
            let elapsed = resolved_at.saturating_duration_since(invoked_at);
            fail(state, fault, elapsed)
        }
        None => {
            let fault = Fault::Abandoned {
                state_id: state.current_state_id.clone(),
                input: state.data.clone(),
            };
            fail(state, fault, invoked_at.elapsed())
        }
    }
}

fn transition<R>(
    spec: &CompiledSpec<R>,
    resources: &R,
    state: RunState<R>,
    output: Value,
    elapsed: Duration,
) -> RunState<R> {
    let mut state = state.with_data(output).observe();
    let id = state.current_state_id.clone();

    match spec.resolve(id.name(), &state.data).cloned() {
        Some(target) if spec.contains(target.name()) => {
            debug!(from = %id, to = %target, elapsed_ms = elapsed.as_millis() as u64, "dispatched");
            let max = state.options.max_trace;
            state.trace = std::mem::take(&mut state.trace)
                .record(TraceSegment::success(id.clone(), elapsed), max);
            state.last_state_id = Some(id);
            state.current_state_id = target;
            state.apply_post(resources)
        }
        target => {
            let fault = Fault::Dispatch {
                current_state_id: id,
                target_state_id: target,
            };
            fail(state, fault, elapsed)
        }
    }
}

/// Route a fault to `error`.
fn fail<R>(mut state: RunState<R>, fault: Fault, elapsed: Duration) -> RunState<R> {
    let id = state.current_state_id.clone();
    warn!(state = %id, error = %fault, "state faulted");

    let max = state.options.max_trace;
    state.trace = std::mem::take(&mut state.trace).record(TraceSegment::error(id.clone(), elapsed), max);
    state.last_state_id = Some(id);
    state.current_state_id = StateId::error();
    state.fault = Some(fault);
    state
}

/// Point a halting run state back at the state that led to `halt`.
fn rewind<R>(mut state: RunState<R>) -> RunState<R> {
    let resume_at = state
        .last_state_id
        .take()
        .or_else(|| state.trace.last().map(|s| s.state_id.clone()))
        .unwrap_or_else(StateId::start);
    state.current_state_id = resume_at;
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Declaration, StateDecl};
    use crate::compiler::compile;
    use crate::core::{RunOptions, SegmentStatus};
    use serde_json::json;

    fn settle_now<R>(spec: &CompiledSpec<R>, resources: &R, state: RunState<R>) -> RunState<R> {
        match enter(spec, resources, state) {
            Step::Pending(pending, mut receiver) => {
                let resolution = receiver.try_recv().ok();
                settle(spec, resources, pending, resolution)
            }
            Step::Done(_) => panic!("Expected a pending step"),
        }
    }

    #[test]
    fn successful_step_records_trace_and_moves_on() {
        let spec = compile(
            Declaration::<()>::new().state(
                "start",
                StateDecl::sync(|_, mut d| {
                    d["seen"] = json!(true);
                    Ok(d)
                })
                .always("end"),
            ),
        )
        .unwrap();

        let state = settle_now(&spec, &(), RunState::default());

        assert_eq!(state.current_state_id, StateId::end());
        assert_eq!(state.last_state_id, Some(StateId::start()));
        assert_eq!(state.data, json!({"seen": true}));
        assert_eq!(state.trace.len(), 1);
        assert_eq!(state.trace.last().unwrap().status, SegmentStatus::Success);
    }

    #[test]
    fn unmatched_dispatch_routes_to_error_with_absent_target() {
        let spec = compile(
            Declaration::<()>::new().state("start", StateDecl::sync(|_, d| Ok(d)).when("end", |_| false)),
        )
        .unwrap();

        let state = settle_now(&spec, &(), RunState::default());

        assert_eq!(state.current_state_id, StateId::error());
        assert!(state.trace.last().unwrap().is_error());
        match state.fault {
            Some(Fault::Dispatch {
                current_state_id,
                target_state_id,
            }) => {
                assert_eq!(current_state_id, "start");
                assert!(target_state_id.is_none());
            }
            other => panic!("Expected dispatch fault, got {other:?}"),
        }
    }

    #[test]
    fn dropped_continuation_is_abandoned() {
        let spec = compile(
            Declaration::<()>::new().state("start", StateDecl::asynchronous(|_, _, k| drop(k)).always("end")),
        )
        .unwrap();

        let state = settle_now(&spec, &(), RunState::new(json!({"n": 1})));

        assert_eq!(state.current_state_id, StateId::error());
        assert!(matches!(
            state.fault,
            Some(Fault::Abandoned { ref input, .. }) if *input == json!({"n": 1})
        ));
    }

    #[test]
    fn halt_rewinds_to_previous_state() {
        let spec = compile(
            Declaration::<()>::new().state("start", StateDecl::sync(|_, d| Ok(d)).always("halt")),
        )
        .unwrap();

        let mut state = RunState::default().at("halt");
        state.last_state_id = Some(StateId::from("review"));

        match enter(&spec, &(), state) {
            Step::Done(Ok(Outcome::Halted(halted))) => {
                assert_eq!(halted.current_state_id, "review");
                assert!(halted.last_state_id.is_none());
            }
            _ => panic!("Expected halted outcome"),
        }
    }

    #[test]
    fn halt_without_history_rewinds_to_start() {
        let spec = compile(
            Declaration::<()>::new().state("start", StateDecl::sync(|_, d| Ok(d)).always("halt")),
        )
        .unwrap();

        match enter(&spec, &(), RunState::default().at("halt")) {
            Step::Done(Ok(Outcome::Halted(halted))) => {
                assert_eq!(halted.current_state_id, StateId::start());
            }
            _ => panic!("Expected halted outcome"),
        }
    }

    #[test]
    fn post_hook_runs_only_after_successful_transition() {
        let spec = compile(
            Declaration::<()>::new().state("start", StateDecl::sync(|_, _| Err("boom".into())).always("end")),
        )
        .unwrap();

        let options = RunOptions::new().post(|state: RunState<()>, _: &()| {
            let mut data = state.data.clone();
            data["post"] = json!(true);
            state.with_data(data)
        });
        let state = settle_now(&spec, &(), RunState::with_options(json!({}), options));

        assert_eq!(state.current_state_id, StateId::error());
        assert!(state.data.get("post").is_none());
    }
}
