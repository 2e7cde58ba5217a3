use serde_json::Value;
use super::ConditionError;

fn shape(op: &str, expected: &'static str) -> ConditionError {
    ConditionError::OperandShape {
        op: op.to_string(),
        expected,
    }
}

/// Variable references must be string paths; any other object operand
/// is a nested expression and must itself be valid.
fn validate_value(value: &Value) -> Result<(), ConditionError> {
    let Some(obj) = value.as_object() else {
        return Ok(());
    };
    match obj.get("var") {
        Some(Value::String(_)) => Ok(()),
        Some(Value::Null) | None => validate(value),
        Some(other) => Err(ConditionError::InvalidVar(other.to_string())),
    }
}

/// Strict check of an expression for use when a condition is authored.
///
/// Unlike [`super::evaluate`], anything that would only evaluate to
/// `true` because it is malformed is reported as an error.
pub fn validate(expression: &Value) -> Result<(), ConditionError> {
    let (op, operand) = match expression.as_object() {
        Some(obj) if obj.len() == 1 => obj.iter()
            .next()
            .ok_or(ConditionError::NotAnExpression)?,
        _ => return Err(ConditionError::NotAnExpression),
    };

    match op.as_str() {
        ">" | ">=" | "<" | "<=" | "==" | "===" | "!=" | "!==" => {
            match operand.as_array().map(Vec::as_slice) {
                Some([left, right]) => {
                    validate_value(left)?;
                    validate_value(right)
                }
                _ => Err(shape(op, "a list of two operands")),
            }
        }
        "in" => match operand.as_array().map(Vec::as_slice) {
            Some([needle, haystack]) => {
                validate_value(needle)?;
                if haystack.is_array() || haystack.get("var").is_some() {
                    validate_value(haystack)
                } else {
                    Err(shape(op, "a list as its second operand"))
                }
            }
            _ => Err(shape(op, "a list of two operands")),
        },
        "and" | "or" => match operand.as_array() {
            Some(conditions) => conditions.iter()
                .try_for_each(validate),
            None => Err(shape(op, "a list of expressions")),
        },
        "not" => match operand {
            Value::Object(_) => validate(operand),
            Value::Array(inner) if inner.len() == 1 => validate(&inner[0]),
            _ => Err(shape(op, "a single expression")),
        },
        _ => Err(ConditionError::UnknownOperator(op.to_string())),
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use crate::condition::ConditionError;
    use super::validate;

    #[test]
    fn accepted() {
        validate(&json!({">": [{"var": "amount"}, 1000]})).unwrap();
        validate(&json!({"and": [
            {">": [{"var": "a"}, 1]},
            {"or": [
                {"==": [{"var": "b"}, "x"]},
                {"not": {"in": [{"var": "c"}, [1, 2]]}},
            ]},
        ]})).unwrap();
        validate(&json!({"in": [{"var": "c"}, {"var": "allowed"}]})).unwrap();
        validate(&json!({"==": [{">": [{"var": "amount"}, 1000]}, true]})).unwrap();
    }

    #[test]
    fn rejected() {
        assert_eq!(
            validate(&json!({"xor": [true, false]})),
            Err(ConditionError::UnknownOperator("xor".into())),
        );
        assert_eq!(
            validate(&json!({})),
            Err(ConditionError::NotAnExpression),
        );
        assert_eq!(
            validate(&json!([1, 2])),
            Err(ConditionError::NotAnExpression),
        );
        assert!(matches!(
            validate(&json!({">": [1]})),
            Err(ConditionError::OperandShape { op, .. }) if op == ">"
        ));
        assert!(matches!(
            validate(&json!({"and": [{">": [{"var": 3}, 1]}]})),
            Err(ConditionError::InvalidVar(_))
        ));
        assert!(matches!(
            validate(&json!({"==": [{"xor": [true, false]}, true]})),
            Err(ConditionError::UnknownOperator(op)) if op == "xor"
        ));
        assert!(matches!(
            validate(&json!({"in": [1, 2]})),
            Err(ConditionError::OperandShape { .. })
        ));
    }
}
