//! Declarations: the raw, uncompiled description of a workflow.

use crate::builder::handler::{Continuation, HandlerSpec};
use crate::core::{BoxError, Predicate, RunState, StateId};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// How a dispatch decides whether it applies.
#[derive(Clone, Debug)]
pub enum PredicateForm {
    /// A callable predicate, used as-is after compilation.
    Callable(Predicate),
    /// A data form resolved by an expression evaluator at compile time.
    Expr(Value),
}

/// One transition rule: go to `target` when `predicate` holds on the
/// handler's output.
#[derive(Clone, Debug)]
pub struct Dispatch {
    pub target: StateId,
    pub predicate: PredicateForm,
}

/// Declaration of a single state.
///
/// # Example
///
/// ```rust
/// use waypoint::builder::StateDecl;
/// use serde_json::json;
///
/// let counter: StateDecl<()> = StateDecl::sync(|_res, mut data| {
///     let count = data["count"].as_i64().unwrap_or(0) + 1;
///     data["count"] = json!(count);
///     Ok(data)
/// })
/// .when("end", |d| d["count"].as_i64().unwrap_or(0) > 3)
/// .always("start");
///
/// assert_eq!(counter.dispatches().len(), 2);
/// assert!(!counter.is_async());
/// ```
pub struct StateDecl<R> {
    handler: Option<HandlerSpec<R>>,
    dispatches: Vec<Dispatch>,
}

impl<R> StateDecl<R> {
    /// A state with neither handler nor dispatches.
    pub fn empty() -> Self {
        Self {
            handler: None,
            dispatches: Vec::new(),
        }
    }

    pub fn with_handler(handler: HandlerSpec<R>) -> Self {
        Self {
            handler: Some(handler),
            dispatches: Vec::new(),
        }
    }

    /// A state whose handler returns the new payload directly.
    pub fn sync<F>(handler: F) -> Self
    where
        F: Fn(&R, Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self::with_handler(HandlerSpec::sync(handler))
    }

    /// A state whose handler completes through a [`Continuation`].
    pub fn asynchronous<F>(handler: F) -> Self
    where
        F: Fn(&R, Value, Continuation) + Send + Sync + 'static,
    {
        Self::with_handler(HandlerSpec::asynchronous(handler))
    }

    /// A custom `end` or `error` handler.
    pub fn terminal<F>(handler: F) -> Self
    where
        F: Fn(&R, &RunState<R>) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self::with_handler(HandlerSpec::terminal(handler))
    }

    /// Dispatch to `target` when `predicate` holds.
    pub fn when<F>(self, target: impl Into<StateId>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.when_predicate(target, Predicate::new(predicate))
    }

    /// Dispatch to `target` using an existing predicate handle.
    pub fn when_predicate(self, target: impl Into<StateId>, predicate: Predicate) -> Self {
        self.dispatch(Dispatch {
            target: target.into(),
            predicate: PredicateForm::Callable(predicate),
        })
    }

    /// Dispatch to `target` when the data form evaluates to true.
    pub fn when_expr(self, target: impl Into<StateId>, form: Value) -> Self {
        self.dispatch(Dispatch {
            target: target.into(),
            predicate: PredicateForm::Expr(form),
        })
    }

    /// Unconditional dispatch.
    pub fn always(self, target: impl Into<StateId>) -> Self {
        self.when_predicate(target, Predicate::always())
    }

    pub fn dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatches.push(dispatch);
        self
    }

    pub fn handler(&self) -> Option<&HandlerSpec<R>> {
        self.handler.as_ref()
    }

    /// Dispatch rules in evaluation order.
    pub fn dispatches(&self) -> &[Dispatch] {
        &self.dispatches
    }

    pub fn is_async(&self) -> bool {
        self.handler.as_ref().is_some_and(HandlerSpec::is_async)
    }

    pub(crate) fn into_parts(self) -> (Option<HandlerSpec<R>>, Vec<Dispatch>) {
        (self.handler, self.dispatches)
    }
}

impl<R> Clone for StateDecl<R> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            dispatches: self.dispatches.clone(),
        }
    }
}

impl<R> fmt::Debug for StateDecl<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateDecl")
            .field("handler", &self.handler)
            .field("dispatches", &self.dispatches)
            .finish()
    }
}

/// A workflow declaration: named states, each with a handler and
/// dispatch rules.
///
/// # Example
///
/// ```rust
/// use waypoint::builder::{Declaration, StateDecl};
/// use serde_json::json;
///
/// let decl: Declaration<()> = Declaration::new()
///     .state(
///         "start",
///         StateDecl::sync(|_, mut d| {
///             d["foo"] = json!("bar");
///             Ok(d)
///         })
///         .always("foo"),
///     )
///     .state(
///         "foo",
///         StateDecl::sync(|_, mut d| {
///             d["y"] = json!(2);
///             Ok(d)
///         })
///         .always("end"),
///     );
///
/// assert_eq!(decl.len(), 2);
/// assert!(decl.contains("foo"));
/// ```
pub struct Declaration<R> {
    states: BTreeMap<StateId, StateDecl<R>>,
}

impl<R> Declaration<R> {
    pub fn new() -> Self {
        Self {
            states: BTreeMap::new(),
        }
    }

    /// Declare (or replace) a state.
    pub fn state(mut self, id: impl Into<StateId>, decl: StateDecl<R>) -> Self {
        self.states.insert(id.into(), decl);
        self
    }

    pub fn get(&self, id: &str) -> Option<&StateDecl<R>> {
        self.states.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.states.contains_key(id)
    }

    /// Declared states in identifier order.
    pub fn states(&self) -> impl Iterator<Item = (&StateId, &StateDecl<R>)> + '_ {
        self.states.iter()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub(crate) fn into_states(self) -> BTreeMap<StateId, StateDecl<R>> {
        self.states
    }
}

impl<R> Default for Declaration<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for Declaration<R> {
    fn clone(&self) -> Self {
        Self {
            states: self.states.clone(),
        }
    }
}

impl<R> fmt::Debug for Declaration<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.states.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dispatches_keep_declared_order() {
        let decl: StateDecl<()> = StateDecl::sync(|_, d| Ok(d))
            .when("a", |_| false)
            .when_expr("b", json!(true))
            .always("c");

        let targets: Vec<&str> = decl.dispatches().iter().map(|d| d.target.name()).collect();
        assert_eq!(targets, vec!["a", "b", "c"]);
        assert!(matches!(
            decl.dispatches()[1].predicate,
            PredicateForm::Expr(_)
        ));
    }

    #[test]
    fn when_predicate_keeps_handle() {
        let predicate = Predicate::new(|d| d.is_object());
        let decl: StateDecl<()> =
            StateDecl::sync(|_, d| Ok(d)).when_predicate("end", predicate.clone());

        match &decl.dispatches()[0].predicate {
            PredicateForm::Callable(p) => assert!(p.ptr_eq(&predicate)),
            PredicateForm::Expr(_) => panic!("Expected callable predicate"),
        }
    }

    #[test]
    fn async_flag_follows_handler_kind() {
        let sync: StateDecl<()> = StateDecl::sync(|_, d| Ok(d));
        let asynchronous: StateDecl<()> = StateDecl::asynchronous(|_, d, k| k.succeed(d));
        let empty: StateDecl<()> = StateDecl::empty();

        assert!(!sync.is_async());
        assert!(asynchronous.is_async());
        assert!(!empty.is_async());
        assert!(empty.handler().is_none());
    }

    #[test]
    fn redeclaring_a_state_replaces_it() {
        let decl: Declaration<()> = Declaration::new()
            .state("start", StateDecl::empty())
            .state("start", StateDecl::sync(|_, d| Ok(d)).always("end"));

        assert_eq!(decl.len(), 1);
        assert!(decl.get("start").unwrap().handler().is_some());
    }
}
