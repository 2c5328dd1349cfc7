//! Core engine data types.
//!
//! This module contains the pure data structures threaded through an
//! execution:
//! - State identifiers and dispatch predicates
//! - The bounded execution trace
//! - Payload-path subscriptions
//! - The run state, its options, and structured faults
//!
//! Nothing here invokes a state handler; that is the engine's job.

mod fault;
mod predicate;
mod run_state;
mod state;
mod subscription;
mod trace;

pub use fault::{BoxError, Cause, Fault};
pub use predicate::Predicate;
pub use run_state::{ExecutionMode, Hook, RunOptions, RunSnapshot, RunState, DEFAULT_MAX_TRACE};
pub use state::StateId;
pub use subscription::{Path, SubscriptionHandler, Subscriptions};
pub use trace::{SegmentStatus, Trace, TraceSegment};
