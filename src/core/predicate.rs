//! Dispatch predicates over the payload.
//!
//! Predicates are pure boolean functions evaluated against a handler's
//! output to choose the next state.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Pure predicate over a payload.
///
/// Cloning a predicate shares the underlying function; compiling a
/// declaration never wraps or copies a callable predicate, so identity can be
/// checked with [`Predicate::ptr_eq`].
///
/// # Example
///
/// ```rust
/// use waypoint::core::Predicate;
/// use serde_json::json;
///
/// let over_three = Predicate::new(|d| d["count"].as_i64().unwrap_or(0) > 3);
///
/// assert!(over_three.check(&json!({"count": 4})));
/// assert!(!over_three.check(&json!({"count": 1})));
/// assert!(!over_three.check(&json!({})));
/// ```
#[derive(Clone)]
pub struct Predicate {
    check: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
}

impl Predicate {
    /// Create a predicate from a pure function.
    ///
    /// The function must be deterministic and thread-safe (Send + Sync).
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Predicate {
            check: Arc::new(predicate),
        }
    }

    /// A predicate that always holds.
    pub fn always() -> Self {
        Self::new(|_| true)
    }

    /// Evaluate the predicate against a payload.
    pub fn check(&self, data: &Value) -> bool {
        (self.check)(data)
    }

    /// True when both handles share the same underlying function.
    pub fn ptr_eq(&self, other: &Predicate) -> bool {
        Arc::ptr_eq(&self.check, &other.check)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").finish_non_exhaustive()
    }
}
