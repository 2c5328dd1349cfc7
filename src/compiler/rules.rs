//! Structural checks for declarations using Validation.
//!
//! Every check runs; all violations are accumulated rather than stopping at
//! the first one.

use crate::builder::{Declaration, HandlerSpec, PredicateForm, StateDecl};
use crate::compiler::violations::Violation;
use crate::core::StateId;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Outcome of one structural check.
pub(crate) type Check = Validation<(), NonEmptyVec<Violation>>;

/// Run every structural check against a declaration.
pub(crate) fn enforce<R>(decl: &Declaration<R>, has_evaluator: bool) -> Check {
    let mut checks: Vec<Check> = Vec::new();

    checks.push(require(decl.contains(StateId::START), || {
        Violation::MissingStart
    }));

    for (id, state) in decl.states() {
        check_handler(id, state, &mut checks);
        check_dispatches(decl, id, state, has_evaluator, &mut checks);
    }

    Validation::all_vec(checks).map(|_| ())
}

/// Gather violations from a list of checks.
pub(crate) fn collect(check: Check) -> Vec<Violation> {
    match check {
        Validation::Success(_) => Vec::new(),
        Validation::Failure(errors) => errors.iter().cloned().collect(),
    }
}

fn require(ok: bool, violation: impl FnOnce() -> Violation) -> Check {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(violation())
    }
}

fn check_handler<R>(id: &StateId, state: &StateDecl<R>, checks: &mut Vec<Check>) {
    let handler = state.handler();

    if id.is_halt() {
        checks.push(require(handler.is_none(), || Violation::HaltHandlerDeclared));
        return;
    }

    if id.is_terminal() {
        if let Some(handler) = handler {
            checks.push(require(handler.is_terminal(), || {
                Violation::StepHandlerOnTerminal {
                    state: id.clone(),
                    kind: handler.kind(),
                }
            }));
        }
        return;
    }

    checks.push(require(handler.is_some(), || Violation::MissingHandler {
        state: id.clone(),
    }));
    checks.push(require(
        !matches!(handler, Some(HandlerSpec::Terminal(_))),
        || Violation::TerminalHandlerMisplaced { state: id.clone() },
    ));
    checks.push(require(!state.dispatches().is_empty(), || {
        Violation::MissingDispatches { state: id.clone() }
    }));
}

fn check_dispatches<R>(
    decl: &Declaration<R>,
    id: &StateId,
    state: &StateDecl<R>,
    has_evaluator: bool,
    checks: &mut Vec<Check>,
) {
    for dispatch in state.dispatches() {
        let target = &dispatch.target;
        checks.push(require(
            target.is_reserved() || decl.contains(target.name()),
            || Violation::InvalidTarget {
                state: id.clone(),
                target: target.clone(),
            },
        ));

        let needs_evaluator = matches!(dispatch.predicate, PredicateForm::Expr(_));
        checks.push(require(has_evaluator || !needs_evaluator, || {
            Violation::NoEvaluator {
                state: id.clone(),
                target: target.clone(),
            }
        }));
    }
}
