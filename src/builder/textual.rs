//! Data-only declarations.
//!
//! A [`TextualDeclaration`] names handlers by identifier and expresses
//! dispatch predicates as data forms. Handlers are supplied separately
//! through a [`HandlerRegistry`] when the declaration is resolved.

use crate::builder::declaration::{Declaration, Dispatch, PredicateForm, StateDecl};
use crate::builder::handler::{Continuation, HandlerSpec};
use crate::compiler::{CompileError, Violation};
use crate::core::{BoxError, RunState, StateId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// One state in textual form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextualState {
    /// Identifier looked up in the handler registry
    #[serde(default)]
    pub handler: Option<String>,

    /// Declared handler kind; checked against the registered handler
    #[serde(default, rename = "async", skip_serializing_if = "Option::is_none")]
    pub is_async: Option<bool>,

    /// `(target, predicate form)` pairs in evaluation order
    #[serde(default)]
    pub dispatches: Vec<(StateId, Value)>,
}

/// A declaration loaded from text.
///
/// # Example
///
/// ```rust
/// use waypoint::builder::{HandlerRegistry, TextualDeclaration};
///
/// let text = TextualDeclaration::from_json(r#"{
///     "start": {"handler": "stamp", "dispatches": [["end", true]]}
/// }"#).unwrap();
///
/// let registry: HandlerRegistry<()> =
///     HandlerRegistry::new().register_sync("stamp", |_, d| Ok(d));
///
/// let decl = text.resolve(&registry).unwrap();
/// assert!(decl.contains("start"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextualDeclaration {
    states: BTreeMap<StateId, TextualState>,
}

impl TextualDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn state(mut self, id: impl Into<StateId>, state: TextualState) -> Self {
        self.states.insert(id.into(), state);
        self
    }

    pub fn states(&self) -> impl Iterator<Item = (&StateId, &TextualState)> + '_ {
        self.states.iter()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Bind every handler identifier through `registry`.
    ///
    /// All unknown identifiers and `async` mismatches are reported together.
    /// Dispatch forms are carried over untouched; they are resolved by the
    /// compiler's expression evaluator.
    pub fn resolve<R>(&self, registry: &HandlerRegistry<R>) -> Result<Declaration<R>, CompileError> {
        let mut decl = Declaration::new();
        let mut checks: Vec<Validation<(), NonEmptyVec<Violation>>> = Vec::new();

        for (id, state) in &self.states {
            let handler = match &state.handler {
                Some(name) => match registry.get(name) {
                    Some(handler) => {
                        checks.push(check_async(id, name, state.is_async, handler));
                        Some(handler.clone())
                    }
                    None => {
                        checks.push(Validation::fail(Violation::UnknownHandler {
                            state: id.clone(),
                            handler: name.clone(),
                        }));
                        None
                    }
                },
                None => None,
            };

            let base = match handler {
                Some(handler) => StateDecl::with_handler(handler),
                None => StateDecl::empty(),
            };
            let state_decl = state
                .dispatches
                .iter()
                .map(|(target, form)| Dispatch {
                    target: target.clone(),
                    predicate: PredicateForm::Expr(form.clone()),
                })
                .fold(base, StateDecl::dispatch);
            decl = decl.state(id.clone(), state_decl);
        }

        match Validation::all_vec(checks).map(|_| ()) {
            Validation::Success(_) => Ok(decl),
            Validation::Failure(errors) => Err(CompileError::from(
                errors.iter().cloned().collect::<Vec<_>>(),
            )),
        }
    }
}

fn check_async<R>(
    id: &StateId,
    name: &str,
    declared: Option<bool>,
    handler: &HandlerSpec<R>,
) -> Validation<(), NonEmptyVec<Violation>> {
    match declared {
        Some(declared) if declared != handler.is_async() => {
            Validation::fail(Violation::AsyncMismatch {
                state: id.clone(),
                handler: name.to_string(),
                declared,
                actual: handler.kind(),
            })
        }
        _ => Validation::success(()),
    }
}

/// Handler identifiers mapped to callables.
pub struct HandlerRegistry<R> {
    handlers: BTreeMap<String, HandlerSpec<R>>,
}

impl<R> HandlerRegistry<R> {
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    pub fn insert(mut self, name: impl Into<String>, handler: HandlerSpec<R>) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn register_sync<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&R, Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.insert(name, HandlerSpec::sync(handler))
    }

    pub fn register_async<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&R, Value, Continuation) + Send + Sync + 'static,
    {
        self.insert(name, HandlerSpec::asynchronous(handler))
    }

    pub fn register_terminal<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&R, &RunState<R>) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.insert(name, HandlerSpec::terminal(handler))
    }

    pub fn get(&self, name: &str) -> Option<&HandlerSpec<R>> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

impl<R> Default for HandlerRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for HandlerRegistry<R> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<R> fmt::Debug for HandlerRegistry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.handlers.iter()).finish()
    }
}
