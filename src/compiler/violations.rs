//! Structural violations found while compiling a declaration.

use crate::core::StateId;
use thiserror::Error;

/// A single structural problem in a declaration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Violation {
    /// Every execution begins at `start`, so a declaration without one can
    /// never run. Not tied to a state, so [`Violation::state`] is `None`.
    #[error("no 'start' state declared")]
    MissingStart,

    #[error("state '{state}' has no handler")]
    MissingHandler { state: StateId },

    #[error("state '{state}' has no dispatches")]
    MissingDispatches { state: StateId },

    #[error("state '{state}' dispatches to undeclared state '{target}'")]
    InvalidTarget { state: StateId, target: StateId },

    #[error("state '{state}' references unknown handler '{handler}'")]
    UnknownHandler { state: StateId, handler: String },

    #[error("state '{state}' declares async={declared} but handler '{handler}' is {actual}")]
    AsyncMismatch {
        state: StateId,
        handler: String,
        declared: bool,
        actual: &'static str,
    },

    #[error("state '{state}' is not terminal but has a terminal handler")]
    TerminalHandlerMisplaced { state: StateId },

    #[error("terminal state '{state}' needs a terminal handler, found a {kind} handler")]
    StepHandlerOnTerminal { state: StateId, kind: &'static str },

    #[error("'halt' is engine-owned and cannot declare a handler")]
    HaltHandlerDeclared,

    #[error("state '{state}' uses an expression for '{target}' but no evaluator is configured")]
    NoEvaluator { state: StateId, target: StateId },

    #[error("state '{state}' has an invalid expression for '{target}': {message}")]
    BadExpression {
        state: StateId,
        target: StateId,
        message: String,
    },
}

impl Violation {
    /// The offending state, when the violation concerns one.
    pub fn state(&self) -> Option<&StateId> {
        match self {
            Violation::MissingStart => None,
            Violation::HaltHandlerDeclared => None,
            Violation::MissingHandler { state }
            | Violation::MissingDispatches { state }
            | Violation::InvalidTarget { state, .. }
            | Violation::UnknownHandler { state, .. }
            | Violation::AsyncMismatch { state, .. }
            | Violation::TerminalHandlerMisplaced { state }
            | Violation::StepHandlerOnTerminal { state, .. }
            | Violation::NoEvaluator { state, .. }
            | Violation::BadExpression { state, .. } => Some(state),
        }
    }
}

/// Compilation failure: every violation found in the declaration.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid declaration: {}", join(.violations))]
    Invalid { violations: Vec<Violation> },
}

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl CompileError {
    pub fn violations(&self) -> &[Violation] {
        match self {
            CompileError::Invalid { violations } => violations,
        }
    }

    /// True when any violation matches `predicate`.
    pub fn has(&self, predicate: impl Fn(&Violation) -> bool) -> bool {
        self.violations().iter().any(predicate)
    }
}

impl From<Vec<Violation>> for CompileError {
    fn from(violations: Vec<Violation>) -> Self {
        CompileError::Invalid { violations }
    }
}
