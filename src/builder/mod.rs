//! Builder API for workflow declarations.
//!
//! This module provides fluent builders for declaring states, their
//! handlers and their dispatch rules, plus a data-only form whose handlers
//! are bound by name at compile time.

mod declaration;
mod handler;
mod textual;

pub use declaration::{Declaration, Dispatch, PredicateForm, StateDecl};
pub use handler::{AsyncHandler, Continuation, HandlerSpec, SyncHandler, TerminalHandler};
pub use textual::{HandlerRegistry, TextualDeclaration, TextualState};

pub(crate) use handler::Resolution;
