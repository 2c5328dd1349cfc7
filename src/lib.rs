//! Waypoint: a resumable finite-state-machine workflow engine
//!
//! A workflow is a set of named states. Each state owns a handler that
//! transforms a JSON payload and an ordered list of dispatch rules that pick
//! the next state from the handler's output. Declarations are validated and
//! compiled once, then executed any number of times.
//!
//! # Core Concepts
//!
//! - **Declaration**: states, handlers and dispatch rules ([`builder`])
//! - **Compiled spec**: the validated, immutable executable form ([`compiler`])
//! - **Run state**: payload, position, bounded trace and options, threaded
//!   through every step by value ([`core`])
//! - **Execution**: blocking or non-blocking, with identical semantics
//!   ([`engine`])
//! - **Halt and resume**: `halt` hands back a run state that can be stored
//!   ([`checkpoint`]) and fed back in later
//! - **Analysis**: reachability, dead ends and cycles without running
//!   anything ([`analysis`])
//!
//! Four state names are reserved: `start`, `end`, `halt` and `error`.
//!
//! # Example
//!
//! ```rust
//! use waypoint::builder::{Declaration, StateDecl};
//! use waypoint::compiler::compile;
//! use serde_json::json;
//!
//! let spec = compile(
//!     Declaration::<()>::new()
//!         .state(
//!             "start",
//!             StateDecl::sync(|_, mut d| {
//!                 d["foo"] = json!("bar");
//!                 Ok(d)
//!             })
//!             .always("foo"),
//!         )
//!         .state(
//!             "foo",
//!             StateDecl::sync(|_, mut d| {
//!                 d["y"] = json!(2);
//!                 Ok(d)
//!             })
//!             .always("end"),
//!         ),
//! )
//! .unwrap();
//!
//! let outcome = spec.run_blocking((), None).unwrap();
//! assert_eq!(outcome.completed(), Some(json!({"foo": "bar", "y": 2})));
//! ```

pub mod analysis;
pub mod builder;
pub mod checkpoint;
pub mod compiler;
pub mod core;
pub mod engine;

// Re-export commonly used types
pub use crate::analysis::{analyze, Analysis};
pub use crate::builder::{Continuation, Declaration, StateDecl};
pub use crate::compiler::{compile, CompileError, CompiledSpec, Compiler};
pub use crate::core::{Fault, RunOptions, RunState, StateId};
pub use crate::engine::{run, run_async, run_blocking, Execution, ExecutionError, Outcome};
