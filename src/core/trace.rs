//! Bounded execution trace.
//!
//! Every visited non-terminal state leaves one [`TraceSegment`]. The trace is
//! a sliding window: once `max` segments are held, recording a new one drops
//! the oldest.

use super::state::StateId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Outcome of a single state visit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStatus {
    Success,
    Error,
}

/// Record of one visited state.
///
/// # Example
///
/// ```rust
/// use waypoint::core::{SegmentStatus, TraceSegment};
/// use std::time::Duration;
///
/// let segment = TraceSegment::success("validate", Duration::from_millis(12));
/// assert_eq!(segment.status, SegmentStatus::Success);
/// assert_eq!(segment.duration_ms, 12);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceSegment {
    /// The state that was visited
    pub state_id: StateId,
    /// Whether the visit completed successfully
    pub status: SegmentStatus,
    /// Wall-clock time from handler invocation to continuation
    pub duration_ms: u64,
    /// When the handler was invoked
    pub started_at: DateTime<Utc>,
}

impl TraceSegment {
    pub fn new(state_id: impl Into<StateId>, status: SegmentStatus, elapsed: Duration) -> Self {
        let started_at = Utc::now()
            - chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            state_id: state_id.into(),
            status,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            started_at,
        }
    }

    pub fn success(state_id: impl Into<StateId>, elapsed: Duration) -> Self {
        Self::new(state_id, SegmentStatus::Success, elapsed)
    }

    pub fn error(state_id: impl Into<StateId>, elapsed: Duration) -> Self {
        Self::new(state_id, SegmentStatus::Error, elapsed)
    }

    pub fn is_error(&self) -> bool {
        self.status == SegmentStatus::Error
    }
}

/// Ordered, bounded sequence of trace segments.
///
/// Recording consumes the trace and returns the updated one, so a run state
/// can be replaced wholesale at every step.
///
/// # Example
///
/// ```rust
/// use waypoint::core::{Trace, TraceSegment};
/// use std::time::Duration;
///
/// let trace = Trace::new()
///     .record(TraceSegment::success("a", Duration::ZERO), 2)
///     .record(TraceSegment::success("b", Duration::ZERO), 2)
///     .record(TraceSegment::success("c", Duration::ZERO), 2);
///
/// let path: Vec<&str> = trace.path().map(|id| id.name()).collect();
/// assert_eq!(path, vec!["b", "c"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trace {
    segments: VecDeque<TraceSegment>,
}

impl Trace {
    /// Create a new empty trace.
    pub fn new() -> Self {
        Self {
            segments: VecDeque::new(),
        }
    }

    /// Append a segment, evicting the oldest entries beyond `max`.
    pub fn record(mut self, segment: TraceSegment, max: usize) -> Self {
        self.segments.push_back(segment);
        while self.segments.len() > max {
            self.segments.pop_front();
        }
        self
    }

    /// Drop the oldest entries until at most `max` remain.
    pub fn truncate_to(mut self, max: usize) -> Self {
        while self.segments.len() > max {
            self.segments.pop_front();
        }
        self
    }

    /// Visited state ids, oldest first.
    pub fn path(&self) -> impl Iterator<Item = &StateId> + '_ {
        self.segments.iter().map(|s| &s.state_id)
    }

    /// Sum of all recorded handler durations.
    pub fn total_duration(&self) -> Duration {
        Duration::from_millis(self.segments.iter().map(|s| s.duration_ms).sum())
    }

    pub fn last(&self) -> Option<&TraceSegment> {
        self.segments.back()
    }

    pub fn segments(&self) -> impl Iterator<Item = &TraceSegment> + '_ {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
