//! Payload-path subscriptions.
//!
//! A subscription watches one location inside the payload and fires its
//! handler once per observed change, with `(path, old, new)`. Subscriptions
//! run alongside the data flow; they cannot alter the payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Ordered sequence of keys locating a value inside the payload.
///
/// Keys that parse as unsigned integers also index into arrays. A path
/// that leads nowhere reads as `null`.
///
/// # Example
///
/// ```rust
/// use waypoint::core::Path;
/// use serde_json::json;
///
/// let data = json!({"order": {"items": [{"sku": "A1"}]}});
///
/// assert_eq!(Path::from("order.items.0.sku").lookup(&data), json!("A1"));
/// assert_eq!(Path::from(["order", "missing"]).lookup(&data), json!(null));
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<String>);

impl Path {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Path(keys.into_iter().map(Into::into).collect())
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }

    /// Resolve the path against a payload, borrowing the located value.
    pub fn get<'a>(&self, data: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(data, |node, key| match node {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Resolve the path against a payload; missing locations read as `null`.
    pub fn lookup(&self, data: &Value) -> Value {
        self.get(data).cloned().unwrap_or(Value::Null)
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.0).finish()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Dotted form: `"a.b.0"` becomes `["a", "b", "0"]`.
impl From<&str> for Path {
    fn from(dotted: &str) -> Self {
        Path::new(dotted.split('.').filter(|k| !k.is_empty()))
    }
}

impl<const N: usize> From<[&str; N]> for Path {
    fn from(keys: [&str; N]) -> Self {
        Path::new(keys)
    }
}

impl From<Vec<String>> for Path {
    fn from(keys: Vec<String>) -> Self {
        Path(keys)
    }
}

static NULL: Value = Value::Null;

/// Callback fired with `(path, old, new)` when a watched value changes.
pub type SubscriptionHandler = Arc<dyn Fn(&Path, &Value, &Value) + Send + Sync>;

#[derive(Clone)]
struct Subscription {
    last: Value,
    handler: SubscriptionHandler,
}

/// Set of watched payload paths.
///
/// # Example
///
/// ```rust
/// use waypoint::core::Subscriptions;
/// use serde_json::json;
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
///
/// let subs = Subscriptions::new()
///     .watch("status", move |_path, old, new| {
///         sink.lock().unwrap().push((old.clone(), new.clone()));
///     })
///     .arm(&json!({"status": "new"}));
///
/// let subs = subs.observe(&json!({"status": "new"}));
/// let _subs = subs.observe(&json!({"status": "paid"}));
///
/// assert_eq!(*seen.lock().unwrap(), vec![(json!("new"), json!("paid"))]);
/// ```
#[derive(Clone, Default)]
pub struct Subscriptions {
    entries: BTreeMap<Path, Subscription>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch `path`, replacing any earlier watcher on the same path.
    pub fn watch<F>(mut self, path: impl Into<Path>, handler: F) -> Self
    where
        F: Fn(&Path, &Value, &Value) + Send + Sync + 'static,
    {
        self.entries.insert(
            path.into(),
            Subscription {
                last: Value::Null,
                handler: Arc::new(handler),
            },
        );
        self
    }

    /// Take the initial snapshot of every watched path without firing.
    pub fn arm(mut self, data: &Value) -> Self {
        for (path, sub) in self.entries.iter_mut() {
            sub.last = path.lookup(data);
        }
        self
    }

    /// Fire handlers for every path whose value differs from the last
    /// recorded one, then record the new values. Unchanged paths are left
    /// untouched.
    pub fn observe(mut self, data: &Value) -> Self {
        for (path, sub) in self.entries.iter_mut() {
            let current = path.get(data).unwrap_or(&NULL);
            if *current == sub.last {
                continue;
            }
            debug!(path = %path, "subscription fired");
            (sub.handler)(path, &sub.last, current);
            sub.last = current.clone();
        }
        self
    }

    /// Overwrite recorded values for paths that are already watched.
    pub fn restore<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (Path, Value)>,
    {
        for (path, value) in values {
            if let Some(sub) = self.entries.get_mut(&path) {
                sub.last = value;
            }
        }
        self
    }

    /// Watched paths with their last recorded values.
    pub fn watched(&self) -> impl Iterator<Item = (&Path, &Value)> + '_ {
        self.entries.iter().map(|(path, sub)| (path, &sub.last))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.watched()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    type Firings = Arc<Mutex<Vec<(String, Value, Value)>>>;

    fn recorder() -> (Firings, impl Fn(&Path, &Value, &Value) + Send + Sync + 'static) {
        let firings: Firings = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&firings);
        let handler = move |path: &Path, old: &Value, new: &Value| {
            sink.lock()
                .unwrap()
                .push((path.to_string(), old.clone(), new.clone()));
        };
        (firings, handler)
    }

    #[test]
    fn path_lookup_walks_objects_and_arrays() {
        let data = json!({"a": {"b": [10, 20]}});
        assert_eq!(Path::from("a.b.1").lookup(&data), json!(20));
        assert_eq!(Path::from("a.b.7").lookup(&data), Value::Null);
        assert_eq!(Path::from("a.x").lookup(&data), Value::Null);
        assert_eq!(Path::new(Vec::<String>::new()).lookup(&data), data);
    }

    #[test]
    fn path_displays_dotted() {
        assert_eq!(Path::from(["user", "name"]).to_string(), "user.name");
    }

    #[test]
    fn unchanged_value_never_fires() {
        let (firings, handler) = recorder();
        let data = json!({"x": 1});

        let subs = Subscriptions::new().watch("x", handler).arm(&data);
        let _subs = subs.observe(&data).observe(&data);

        assert!(firings.lock().unwrap().is_empty());
    }

    #[test]
    fn change_fires_once_with_old_and_new() {
        let (firings, handler) = recorder();

        let subs = Subscriptions::new().watch("x", handler).arm(&json!({}));
        let _subs = subs
            .observe(&json!({"x": 1}))
            .observe(&json!({"x": 1}))
            .observe(&json!({"x": 1, "y": 2}));

        let firings = firings.lock().unwrap();
        assert_eq!(firings.len(), 1);
        assert_eq!(firings[0], ("x".to_string(), Value::Null, json!(1)));
    }

    #[test]
    fn first_observation_compares_against_initial_snapshot() {
        let (firings, handler) = recorder();

        let subs = Subscriptions::new()
            .watch("x", handler)
            .arm(&json!({"x": "initial"}));
        let _subs = subs.observe(&json!({"x": "initial"}));
        assert!(firings.lock().unwrap().is_empty());
    }

    #[test]
    fn each_path_tracks_independently() {
        let (firings, handler) = recorder();
        let (other_firings, other_handler) = recorder();

        let subs = Subscriptions::new()
            .watch("a", handler)
            .watch("b", other_handler)
            .arm(&json!({"a": 1, "b": 1}));

        let subs = subs.observe(&json!({"a": 2, "b": 1}));
        let _subs = subs.observe(&json!({"a": 2, "b": 3}));

        assert_eq!(firings.lock().unwrap().len(), 1);
        assert_eq!(other_firings.lock().unwrap().len(), 1);
    }

    #[test]
    fn restore_overrides_recorded_values() {
        let (firings, handler) = recorder();

        let subs = Subscriptions::new()
            .watch("x", handler)
            .arm(&json!({}))
            .restore(vec![(Path::from("x"), json!(5)), (Path::from("nope"), json!(1))]);

        assert_eq!(subs.len(), 1);
        let _subs = subs.observe(&json!({"x": 5}));
        assert!(firings.lock().unwrap().is_empty());
    }
}
