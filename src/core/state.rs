//! State identifiers.
//!
//! States are addressed by name. Four names are reserved and carry
//! engine-owned meaning: `start`, `end`, `halt` and `error`.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Identifier of a state in a declaration.
///
/// Cheap to clone; serializes as a plain string.
///
/// # Example
///
/// ```rust
/// use waypoint::core::StateId;
///
/// let id = StateId::from("review");
/// assert_eq!(id.name(), "review");
/// assert!(!id.is_reserved());
/// assert!(StateId::end().is_final());
/// assert!(StateId::error().is_error());
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(Arc<str>);

impl StateId {
    /// Initial state of every execution.
    pub const START: &'static str = "start";
    /// Terminal success state.
    pub const END: &'static str = "end";
    /// Pause point; yields a resumable run state.
    pub const HALT: &'static str = "halt";
    /// Terminal failure sink.
    pub const ERROR: &'static str = "error";

    /// Names of all reserved identifiers.
    pub const RESERVED: [&'static str; 4] = [Self::START, Self::END, Self::HALT, Self::ERROR];

    pub fn new(name: impl AsRef<str>) -> Self {
        StateId(Arc::from(name.as_ref()))
    }

    pub fn start() -> Self {
        Self::new(Self::START)
    }

    pub fn end() -> Self {
        Self::new(Self::END)
    }

    pub fn halt() -> Self {
        Self::new(Self::HALT)
    }

    pub fn error() -> Self {
        Self::new(Self::ERROR)
    }

    /// Get the state's name for display/logging.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// True for any of the four reserved identifiers.
    pub fn is_reserved(&self) -> bool {
        Self::RESERVED.contains(&self.name())
    }

    /// True for `end` and `error`, where an execution stops for good.
    pub fn is_final(&self) -> bool {
        matches!(self.name(), Self::END | Self::ERROR)
    }

    /// True for the `error` sink.
    pub fn is_error(&self) -> bool {
        self.name() == Self::ERROR
    }

    pub fn is_halt(&self) -> bool {
        self.name() == Self::HALT
    }

    /// True for states that do not need dispatches: `end`, `halt`, `error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self.name(), Self::END | Self::HALT | Self::ERROR)
    }
}

impl fmt::Debug for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.name())
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for StateId {
    fn from(name: &str) -> Self {
        StateId::new(name)
    }
}

impl From<String> for StateId {
    fn from(name: String) -> Self {
        StateId(Arc::from(name))
    }
}

impl From<&StateId> for StateId {
    fn from(id: &StateId) -> Self {
        id.clone()
    }
}

impl Borrow<str> for StateId {
    fn borrow(&self) -> &str {
        self.name()
    }
}

impl AsRef<str> for StateId {
    fn as_ref(&self) -> &str {
        self.name()
    }
}

impl PartialEq<str> for StateId {
    fn eq(&self, other: &str) -> bool {
        self.name() == other
    }
}

impl PartialEq<&str> for StateId {
    fn eq(&self, other: &&str) -> bool {
        self.name() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_identifiers_are_classified() {
        assert!(StateId::start().is_reserved());
        assert!(!StateId::start().is_terminal());
        assert!(!StateId::start().is_final());

        assert!(StateId::end().is_final());
        assert!(!StateId::end().is_error());

        assert!(StateId::error().is_final());
        assert!(StateId::error().is_error());

        assert!(StateId::halt().is_terminal());
        assert!(!StateId::halt().is_final());
    }

    #[test]
    fn user_states_are_not_reserved() {
        let id = StateId::from("review");
        assert!(!id.is_reserved());
        assert!(!id.is_terminal());
        assert_eq!(id, "review");
    }

    #[test]
    fn state_id_serializes_as_string() {
        let id = StateId::from("review");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"review\"");

        let back: StateId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn state_ids_order_lexicographically() {
        let mut ids = vec![StateId::from("b"), StateId::from("a"), StateId::from("c")];
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
