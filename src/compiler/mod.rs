//! Declaration compiler and validator.
//!
//! Turns a raw [`Declaration`] into an immutable [`CompiledSpec`]:
//!
//! - every structural rule is checked up front, and all violations are
//!   reported together (see [`Violation`])
//! - callable dispatch predicates are kept as-is; data-form predicates are
//!   resolved through an [`ExpressionEvaluator`]
//! - synchronous handlers are normalized to the continuation calling
//!   convention, so the engine only ever sees one handler shape
//!
//! # Example
//!
//! ```rust
//! use waypoint::builder::{Declaration, StateDecl};
//! use waypoint::compiler::{compile, BasicEvaluator, Compiler};
//! use serde_json::json;
//!
//! let decl: Declaration<()> = Declaration::new().state(
//!     "start",
//!     StateDecl::sync(|_, d| Ok(d)).when_expr("end", json!({"exists": "id"})),
//! );
//!
//! // Data-form predicates need an evaluator.
//! assert!(compile(decl.clone()).is_err());
//!
//! let spec = Compiler::new().evaluator(BasicEvaluator).compile(decl).unwrap();
//! assert!(!spec.is_async());
//! ```

mod expr;
mod rules;
mod spec;
mod violations;

pub use expr::{BasicEvaluator, ExpressionError, ExpressionEvaluator};
pub use spec::{CompiledSpec, HandlerPanic};
pub use violations::{CompileError, Violation};

pub(crate) use spec::{CompiledState, Node};

use crate::builder::{
    Declaration, Dispatch, HandlerRegistry, HandlerSpec, PredicateForm, TextualDeclaration,
};
use crate::core::{Predicate, StateId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Configurable compiler.
#[derive(Clone, Default)]
pub struct Compiler {
    evaluator: Option<Arc<dyn ExpressionEvaluator>>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `evaluator` to resolve data-form predicates.
    pub fn evaluator(mut self, evaluator: impl ExpressionEvaluator + 'static) -> Self {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    /// Validate and compile a declaration.
    pub fn compile<R: 'static>(&self, decl: Declaration<R>) -> Result<CompiledSpec<R>, CompileError> {
        let violations = rules::collect(rules::enforce(&decl, self.evaluator.is_some()));
        if !violations.is_empty() {
            warn!(violations = violations.len(), "declaration rejected");
            return Err(CompileError::from(violations));
        }

        let mut nodes = BTreeMap::new();
        let mut violations = Vec::new();

        for (id, state) in decl.into_states() {
            let (handler, dispatches) = state.into_parts();

            if id.is_terminal() {
                // Dispatches on terminals are never evaluated.
                if let Some(HandlerSpec::Terminal(handler)) = handler {
                    let terminal = spec::custom_terminal(id.clone(), handler);
                    nodes.insert(id, Node::Terminal(terminal));
                }
                continue;
            }

            let dispatches = self.resolve_dispatches(&id, dispatches, &mut violations);
            let (handler, is_async) = match handler {
                Some(HandlerSpec::Sync(handler)) => (spec::normalize(handler), false),
                Some(HandlerSpec::Async(handler)) => (handler, true),
                // Rejected by the structural rules.
                Some(HandlerSpec::Terminal(_)) | None => continue,
            };

            nodes.insert(
                id,
                Node::Step(CompiledState {
                    handler,
                    dispatches,
                    is_async,
                }),
            );
        }

        if !violations.is_empty() {
            warn!(violations = violations.len(), "declaration rejected");
            return Err(CompileError::from(violations));
        }

        let spec = CompiledSpec::new(nodes);
        debug!(is_async = spec.is_async(), "declaration compiled");
        Ok(spec)
    }

    /// Resolve a textual declaration's handlers through `registry`, then
    /// compile it.
    pub fn compile_textual<R: 'static>(
        &self,
        text: &TextualDeclaration,
        registry: &HandlerRegistry<R>,
    ) -> Result<CompiledSpec<R>, CompileError> {
        let decl = text.resolve(registry)?;
        self.compile(decl)
    }

    fn resolve_dispatches(
        &self,
        id: &StateId,
        dispatches: Vec<Dispatch>,
        violations: &mut Vec<Violation>,
    ) -> Vec<(StateId, Predicate)> {
        let mut resolved = Vec::with_capacity(dispatches.len());
        for Dispatch { target, predicate } in dispatches {
            let predicate = match predicate {
                PredicateForm::Callable(predicate) => predicate,
                PredicateForm::Expr(form) => {
                    let Some(evaluator) = &self.evaluator else {
                        violations.push(Violation::NoEvaluator {
                            state: id.clone(),
                            target,
                        });
                        continue;
                    };
                    match evaluator.compile(&form) {
                        Ok(predicate) => predicate,
                        Err(err) => {
                            violations.push(Violation::BadExpression {
                                state: id.clone(),
                                target,
                                message: err.to_string(),
                            });
                            continue;
                        }
                    }
                }
            };
            resolved.push((target, predicate));
        }
        resolved
    }
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("evaluator", &self.evaluator.is_some())
            .finish()
    }
}

/// Compile a declaration that uses only callable predicates.
pub fn compile<R: 'static>(decl: Declaration<R>) -> Result<CompiledSpec<R>, CompileError> {
    Compiler::new().compile(decl)
}
