//! Expression evaluator capability for data-form predicates.
//!
//! Declarations loaded from text describe dispatch predicates as data. An
//! [`ExpressionEvaluator`] turns those forms into callable predicates once,
//! at compile time.

use crate::core::{BoxError, Path, Predicate};
use serde_json::{Map, Value};
use thiserror::Error;

/// Compiles data-form predicates into callables.
pub trait ExpressionEvaluator: Send + Sync {
    fn compile(&self, form: &Value) -> Result<Predicate, BoxError>;
}

impl<F> ExpressionEvaluator for F
where
    F: Fn(&Value) -> Result<Predicate, BoxError> + Send + Sync,
{
    fn compile(&self, form: &Value) -> Result<Predicate, BoxError> {
        self(form)
    }
}

/// Errors raised by [`BasicEvaluator`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExpressionError {
    #[error("unsupported expression: {0}")]
    Unsupported(String),

    #[error("operator '{op}' expects {expected}")]
    Arity { op: String, expected: &'static str },

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Small, restricted predicate language over JSON payloads.
///
/// | form | holds when |
/// |------|------------|
/// | `true` / `false` | always / never |
/// | `{"eq": [path, v]}`, `{"ne": [path, v]}` | value at path equals / differs from `v` |
/// | `{"gt"|"gte"|"lt"|"lte": [path, n]}` | numeric comparison; non-numbers never match |
/// | `{"exists": path}` | value at path is present and not null |
/// | `{"not": f}`, `{"and": [f..]}`, `{"or": [f..]}` | boolean combinators |
///
/// A path is an array of keys or a dotted string.
///
/// # Example
///
/// ```rust
/// use waypoint::compiler::{BasicEvaluator, ExpressionEvaluator};
/// use serde_json::json;
///
/// let evaluator = BasicEvaluator;
/// let predicate = evaluator
///     .compile(&json!({"and": [{"exists": ["user"]}, {"gt": ["count", 3]}]}))
///     .unwrap();
///
/// assert!(predicate.check(&json!({"user": "ada", "count": 4})));
/// assert!(!predicate.check(&json!({"count": 4})));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicEvaluator;

impl ExpressionEvaluator for BasicEvaluator {
    fn compile(&self, form: &Value) -> Result<Predicate, BoxError> {
        Ok(compile_form(form)?)
    }
}

fn compile_form(form: &Value) -> Result<Predicate, ExpressionError> {
    match form {
        Value::Bool(b) => {
            let b = *b;
            Ok(Predicate::new(move |_| b))
        }
        Value::Object(map) => compile_operator(map),
        other => Err(ExpressionError::Unsupported(other.to_string())),
    }
}

fn compile_operator(map: &Map<String, Value>) -> Result<Predicate, ExpressionError> {
    let mut entries = map.iter();
    let (Some((op, args)), None) = (entries.next(), entries.next()) else {
        return Err(ExpressionError::Unsupported(Value::Object(map.clone()).to_string()));
    };

    match op.as_str() {
        "eq" | "ne" => {
            let (path, expected) = path_and_operand(op, args)?;
            let negate = op == "ne";
            Ok(Predicate::new(move |d| {
                (path.get(d).unwrap_or(&Value::Null) == &expected) != negate
            }))
        }
        "gt" | "gte" | "lt" | "lte" => {
            let (path, operand) = path_and_operand(op, args)?;
            let bound = operand.as_f64().ok_or_else(|| ExpressionError::Arity {
                op: op.clone(),
                expected: "a numeric operand",
            })?;
            let compare: fn(f64, f64) -> bool = match op.as_str() {
                "gt" => |a, b| a > b,
                "gte" => |a, b| a >= b,
                "lt" => |a, b| a < b,
                _ => |a, b| a <= b,
            };
            Ok(Predicate::new(move |d| {
                path.get(d)
                    .and_then(Value::as_f64)
                    .is_some_and(|v| compare(v, bound))
            }))
        }
        "exists" => {
            let path = parse_path(args)?;
            Ok(Predicate::new(move |d| {
                path.get(d).is_some_and(|v| !v.is_null())
            }))
        }
        "not" => {
            let inner = compile_form(args)?;
            Ok(Predicate::new(move |d| !inner.check(d)))
        }
        "and" | "or" => {
            let forms = args.as_array().ok_or_else(|| ExpressionError::Arity {
                op: op.clone(),
                expected: "an array of forms",
            })?;
            let inner = forms
                .iter()
                .map(compile_form)
                .collect::<Result<Vec<_>, _>>()?;
            if op == "and" {
                Ok(Predicate::new(move |d| inner.iter().all(|p| p.check(d))))
            } else {
                Ok(Predicate::new(move |d| inner.iter().any(|p| p.check(d))))
            }
        }
        _ => Err(ExpressionError::Unsupported(format!("operator '{op}'"))),
    }
}

fn path_and_operand(op: &str, args: &Value) -> Result<(Path, Value), ExpressionError> {
    match args.as_array().map(Vec::as_slice) {
        Some([path, operand]) => Ok((parse_path(path)?, operand.clone())),
        _ => Err(ExpressionError::Arity {
            op: op.to_string(),
            expected: "[path, operand]",
        }),
    }
}

fn parse_path(value: &Value) -> Result<Path, ExpressionError> {
    match value {
        Value::String(dotted) => Ok(Path::from(dotted.as_str())),
        Value::Array(keys) => keys
            .iter()
            .map(|k| match k {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(ExpressionError::InvalidPath(other.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Path::from),
        other => Err(ExpressionError::InvalidPath(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(form: Value) -> Predicate {
        BasicEvaluator.compile(&form).unwrap()
    }

    #[test]
    fn literals_are_constant() {
        assert!(compile(json!(true)).check(&json!({})));
        assert!(!compile(json!(false)).check(&json!({})));
    }

    #[test]
    fn equality_compares_value_at_path() {
        let eq = compile(json!({"eq": [["status"], "paid"]}));
        let ne = compile(json!({"ne": ["status", "paid"]}));

        assert!(eq.check(&json!({"status": "paid"})));
        assert!(!eq.check(&json!({"status": "new"})));
        assert!(ne.check(&json!({})));
    }

    #[test]
    fn comparisons_require_numbers() {
        let gt = compile(json!({"gt": ["count", 3]}));
        assert!(gt.check(&json!({"count": 4})));
        assert!(!gt.check(&json!({"count": 3})));
        assert!(!gt.check(&json!({"count": "many"})));

        let lte = compile(json!({"lte": ["count", 3]}));
        assert!(lte.check(&json!({"count": 3})));
        assert!(!lte.check(&json!({})));
    }

    #[test]
    fn combinators_nest() {
        let p = compile(json!({"or": [{"not": {"exists": "a"}}, {"eq": ["a", 1]}]}));
        assert!(p.check(&json!({})));
        assert!(p.check(&json!({"a": 1})));
        assert!(!p.check(&json!({"a": 2})));
    }

    #[test]
    fn array_paths_index_into_lists() {
        let p = compile(json!({"eq": [["items", 0], "x"]}));
        assert!(p.check(&json!({"items": ["x", "y"]})));
    }

    #[test]
    fn malformed_forms_are_rejected() {
        assert!(BasicEvaluator.compile(&json!("start")).is_err());
        assert!(BasicEvaluator.compile(&json!({"eq": ["only-path"]})).is_err());
        assert!(BasicEvaluator.compile(&json!({"gt": ["a", "b"]})).is_err());
        assert!(BasicEvaluator.compile(&json!({"and": {}})).is_err());
        assert!(BasicEvaluator.compile(&json!({"eq": [["a"], 1], "ne": [["a"], 2]})).is_err());
        assert!(BasicEvaluator.compile(&json!({"matches": ["a", ".*"]})).is_err());
    }

    #[test]
    fn closures_act_as_evaluators() {
        let evaluator = |_: &Value| -> Result<Predicate, BoxError> { Ok(Predicate::always()) };
        assert!(evaluator.compile(&json!("anything")).unwrap().check(&json!(null)));
    }
}
