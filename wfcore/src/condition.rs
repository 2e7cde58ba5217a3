//! Condition expressions gating automatic transitions.
//!
//! An expression is a JSON object with exactly one key, the operator,
//! whose value holds the operand(s):
//!
//! ```json
//! { "and": [
//!     { ">": [{ "var": "amount" }, 50000] },
//!     { "==": [{ "var": "priority" }, "high"] }
//! ] }
//! ```
//!
//! Evaluation never fails.  Unknown operators, operands of the wrong
//! shape and evaluation errors all produce `true`, so a broken
//! condition cannot hold a document in place forever.  Use [`validate`]
//! when authoring to reject such expressions up front.
use serde_json::{
    Map,
    Value,
};
use thiserror::Error;

mod validate;
pub use validate::validate;

#[derive(Debug, Error, PartialEq)]
pub enum ConditionError {
    #[error("expression must be an object with a single operator key")]
    NotAnExpression,
    #[error("unknown operator: {0}")]
    UnknownOperator(String),
    #[error("operator {op} expects {expected}")]
    OperandShape {
        op: String,
        expected: &'static str,
    },
    #[error("variable reference must be a string path, got: {0}")]
    InvalidVar(String),
}

/// A value after variable resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Resolved<'a> {
    /// A variable path that does not exist in the context.
    Undefined,
    Value(&'a Value),
}

/// Evaluate `expression` against `context`.  An absent expression is
/// satisfied.
pub fn evaluate(expression: Option<&Value>, context: &Map<String, Value>) -> bool {
    let Some(expression) = expression else {
        return true;
    };
    match eval(expression, context) {
        Ok(result) => result,
        Err(e) => {
            log::debug!("condition {expression} evaluated to true on error: {e}");
            true
        }
    }
}

fn eval(expression: &Value, context: &Map<String, Value>) -> Result<bool, ConditionError> {
    let (op, operand) = match expression.as_object() {
        Some(obj) if obj.len() == 1 => match obj.iter().next() {
            Some(entry) => entry,
            None => return Ok(true),
        },
        _ => return Ok(true),
    };

    match op.as_str() {
        ">" | ">=" | "<" | "<=" => {
            let Some((left, right)) = binary(operand, context)? else {
                return Ok(true);
            };
            let (left, right) = (to_number(left), to_number(right));
            Ok(match op.as_str() {
                ">" => left > right,
                ">=" => left >= right,
                "<" => left < right,
                _ => left <= right,
            })
        }
        "==" | "===" => Ok(match binary(operand, context)? {
            Some((left, right)) => strict_eq(left, right),
            None => true,
        }),
        "!=" | "!==" => Ok(match binary(operand, context)? {
            Some((left, right)) => !strict_eq(left, right),
            None => true,
        }),
        "and" => match operand.as_array() {
            Some(conditions) => {
                for condition in conditions {
                    if !eval(condition, context)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            None => Ok(true),
        },
        "or" => match operand.as_array() {
            Some(conditions) => {
                for condition in conditions {
                    if eval(condition, context)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            None => Ok(true),
        },
        "not" => match operand {
            Value::Object(_) => Ok(!eval(operand, context)?),
            Value::Array(inner) if inner.len() == 1 => Ok(!eval(&inner[0], context)?),
            _ => Ok(true),
        },
        "in" => Ok(match binary(operand, context)? {
            Some((needle, Resolved::Value(Value::Array(haystack)))) => haystack
                .iter()
                .any(|item| strict_eq(needle, Resolved::Value(item))),
            Some(_) => false,
            None => true,
        }),
        _ => Ok(true),
    }
}

/// Resolves a two element operand list; `None` if the operand is not
/// shaped that way.
fn binary<'a>(
    operand: &'a Value,
    context: &'a Map<String, Value>,
) -> Result<Option<(Resolved<'a>, Resolved<'a>)>, ConditionError> {
    match operand.as_array().map(Vec::as_slice) {
        Some([left, right]) => Ok(Some((
            resolve(left, context)?,
            resolve(right, context)?,
        ))),
        _ => Ok(None),
    }
}

static TRUE: Value = Value::Bool(true);
static FALSE: Value = Value::Bool(false);

/// Operands are literals, variable references, or nested expressions
/// which stand in for their boolean result.
fn resolve<'a>(
    value: &'a Value,
    context: &'a Map<String, Value>,
) -> Result<Resolved<'a>, ConditionError> {
    let Some(obj) = value.as_object() else {
        return Ok(Resolved::Value(value));
    };
    match obj.get("var") {
        Some(Value::String(path)) => Ok(lookup(path, context)),
        Some(Value::Null) | None => Ok(Resolved::Value(
            if eval(value, context)? { &TRUE } else { &FALSE }
        )),
        Some(other) => Err(ConditionError::InvalidVar(other.to_string())),
    }
}

/// Walks a dotted path through the context; array elements may be
/// addressed by index.
fn lookup<'a>(path: &str, context: &'a Map<String, Value>) -> Resolved<'a> {
    let mut segments = path.split('.');
    let mut current = match segments.next().and_then(|key| context.get(key)) {
        Some(value) => value,
        None => return Resolved::Undefined,
    };
    for segment in segments {
        let next = match current {
            Value::Object(obj) => obj.get(segment),
            Value::Array(items) => segment.parse::<usize>()
                .ok()
                .and_then(|idx| items.get(idx)),
            _ => None,
        };
        current = match next {
            Some(value) => value,
            None => return Resolved::Undefined,
        };
    }
    Resolved::Value(current)
}

fn to_number(value: Resolved) -> f64 {
    match value {
        Resolved::Undefined => f64::NAN,
        Resolved::Value(value) => value_to_number(value),
    }
}

fn value_to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => if *b { 1.0 } else { 0.0 },
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .unwrap_or(f64::NAN)
            }
        }
        Value::Array(items) => match items.as_slice() {
            [] => 0.0,
            [item] if !item.is_object() => value_to_number(item),
            _ => f64::NAN,
        },
        Value::Object(_) => f64::NAN,
    }
}

fn strict_eq(left: Resolved, right: Resolved) -> bool {
    match (left, right) {
        (Resolved::Value(Value::Number(a)), Resolved::Value(Value::Number(b))) =>
            a.as_f64() == b.as_f64(),
        (Resolved::Value(a), Resolved::Value(b)) => a == b,
        // an unresolved variable never matches anything
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use serde_json::{
        json,
        Map,
        Value,
    };
    use super::evaluate;

    fn ctx(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("context must be an object"),
        }
    }

    #[test]
    fn absent_and_empty() {
        let context = ctx(json!({}));
        assert!(evaluate(None, &context));
        assert!(evaluate(Some(&json!({})), &context));
        assert!(evaluate(Some(&json!("amount > 5")), &context));
    }

    #[test]
    fn comparisons() {
        let expr = json!({">": [{"var": "amount"}, 1000]});
        assert!(evaluate(Some(&expr), &ctx(json!({"amount": 1500}))));
        assert!(!evaluate(Some(&expr), &ctx(json!({"amount": 500}))));
        // numeric coercion of strings
        assert!(evaluate(Some(&expr), &ctx(json!({"amount": "1500"}))));
        // missing variable is a non-match, not an error
        assert!(!evaluate(Some(&expr), &ctx(json!({}))));

        let expr = json!({">=": [{"var": "amount"}, 1000]});
        assert!(evaluate(Some(&expr), &ctx(json!({"amount": 1000}))));
        let expr = json!({"<": [{"var": "amount"}, 1000]});
        assert!(evaluate(Some(&expr), &ctx(json!({"amount": 999.5}))));
        let expr = json!({"<=": [{"var": "amount"}, 1000]});
        assert!(!evaluate(Some(&expr), &ctx(json!({"amount": 1001}))));
    }

    #[test]
    fn equality() {
        let expr = json!({"==": [{"var": "b"}, "x"]});
        assert!(evaluate(Some(&expr), &ctx(json!({"b": "x"}))));
        assert!(!evaluate(Some(&expr), &ctx(json!({"b": "y"}))));
        assert!(!evaluate(Some(&expr), &ctx(json!({}))));
        // no coercion for equality
        let expr = json!({"==": [{"var": "n"}, "1"]});
        assert!(!evaluate(Some(&expr), &ctx(json!({"n": 1}))));
        let expr = json!({"==": [{"var": "n"}, 1.0]});
        assert!(evaluate(Some(&expr), &ctx(json!({"n": 1}))));
        let expr = json!({"!=": [{"var": "b"}, "x"]});
        assert!(evaluate(Some(&expr), &ctx(json!({"b": "y"}))));
    }

    #[test]
    fn logical() {
        let expr = json!({"and": [
            {">": [{"var": "a"}, 1]},
            {"==": [{"var": "b"}, "x"]},
        ]});
        assert!(evaluate(Some(&expr), &ctx(json!({"a": 2, "b": "x"}))));
        assert!(!evaluate(Some(&expr), &ctx(json!({"a": 0, "b": "x"}))));

        let expr = json!({"or": [
            {">": [{"var": "a"}, 1]},
            {"==": [{"var": "b"}, "x"]},
        ]});
        assert!(evaluate(Some(&expr), &ctx(json!({"a": 0, "b": "x"}))));
        assert!(!evaluate(Some(&expr), &ctx(json!({"a": 0, "b": "y"}))));
        assert!(!evaluate(Some(&json!({"or": []})), &ctx(json!({}))));
        assert!(evaluate(Some(&json!({"and": []})), &ctx(json!({}))));

        let expr = json!({"not": {"==": [{"var": "b"}, "x"]}});
        assert!(evaluate(Some(&expr), &ctx(json!({"b": "y"}))));
    }

    #[test]
    fn membership_and_paths() {
        let expr = json!({"in": [{"var": "doc.status"}, ["pending", "active"]]});
        assert!(evaluate(Some(&expr), &ctx(json!({"doc": {"status": "active"}}))));
        assert!(!evaluate(Some(&expr), &ctx(json!({"doc": {"status": "done"}}))));
        assert!(!evaluate(Some(&expr), &ctx(json!({"doc": null}))));

        let expr = json!({">": [{"var": "lines.1.total"}, 10]});
        assert!(evaluate(
            Some(&expr),
            &ctx(json!({"lines": [{"total": 1}, {"total": 11}]})),
        ));
    }

    #[test]
    fn nested_operands() {
        let expr = json!({"==": [{">": [{"var": "amount"}, 1000]}, true]});
        assert!(evaluate(Some(&expr), &ctx(json!({"amount": 1500}))));
        assert!(!evaluate(Some(&expr), &ctx(json!({"amount": 500}))));
        let expr = json!({"!=": [
            {"==": [{"var": "b"}, "x"]},
            {"in": [{"var": "c"}, [1, 2]]},
        ]});
        assert!(evaluate(Some(&expr), &ctx(json!({"b": "x", "c": 3}))));
        assert!(!evaluate(Some(&expr), &ctx(json!({"b": "x", "c": 2}))));
        // a nested expression counts as 1 or 0 when compared numerically
        let expr = json!({">": [{"<": [{"var": "a"}, 5]}, 0]});
        assert!(evaluate(Some(&expr), &ctx(json!({"a": 1}))));
        // errors inside a nested operand still fail open
        let expr = json!({"==": [{">": [{"var": 7}, 1]}, false]});
        assert!(evaluate(Some(&expr), &ctx(json!({}))));
    }

    #[test]
    fn fail_open() {
        let context = ctx(json!({"a": 1}));
        assert!(evaluate(Some(&json!({"xor": [true, false]})), &context));
        assert!(evaluate(Some(&json!({">": [1]})), &context));
        assert!(evaluate(Some(&json!({"and": {"a": 1}})), &context));
        assert!(evaluate(Some(&json!({">": [1, 2], "<": [2, 1]})), &context));
        // a non-string variable path is an evaluation error; the whole
        // expression gives way, even when nested under a failing branch
        let expr = json!({"and": [
            {"==": [1, 2]},
            {">": [{"var": 5}, 1]},
        ]});
        assert!(!evaluate(Some(&expr), &context));
        let expr = json!({"and": [
            {">": [{"var": 5}, 1]},
            {"==": [1, 2]},
        ]});
        assert!(evaluate(Some(&expr), &context));
    }
}
