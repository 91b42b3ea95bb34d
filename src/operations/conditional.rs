use std::cmp::Ordering;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, warn};

use super::context::ExecutionContext;
use super::setter::set_value;
use super::{Condition, ConditionOperator, ConditionalTransformOperation, OperationResult};
use crate::error::{NormalizationError, Result};
use crate::model::{Node, Scalar};
use crate::path::Extracted;

/// Writes a literal value to a target path when every condition holds
#[derive(Debug, Clone)]
pub struct ConditionalTransformExecutor {
    ctx: ExecutionContext,
}

impl ConditionalTransformExecutor {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self { ctx }
    }

    pub fn execute(
        &self,
        operation: &ConditionalTransformOperation,
        mut resource: Node,
    ) -> OperationResult {
        let name = &operation.name;

        for condition in &operation.conditions {
            match self.passes(condition, &resource) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(
                        operation = %name,
                        source_path = %condition.source_path,
                        "condition not met"
                    );
                    return OperationResult::success(resource);
                }
                Err(err) => {
                    warn!(
                        operation = %name,
                        resource_type = resource.resource_type(),
                        error = %err,
                        "condition evaluation failed"
                    );
                    return OperationResult::from_error(&err, Some(resource));
                }
            }
        }

        if let Err(err) = self.ctx.evaluator.validate(&operation.target_path) {
            return OperationResult::from_error(&err, Some(resource));
        }
        let value = match target_value(&operation.target_value) {
            Ok(value) => value,
            Err(err) => return OperationResult::from_error(&err, Some(resource)),
        };

        match set_value(&self.ctx, &mut resource, &operation.target_path, &value) {
            Ok(stage) => {
                debug!(
                    operation = %name,
                    target_path = %operation.target_path,
                    ?stage,
                    "transform written"
                );
                OperationResult::success(resource)
            }
            Err(err) => {
                warn!(operation = %name, error = %err, "transform target not written");
                OperationResult::from_error(&err, Some(resource))
            }
        }
    }

    fn passes(&self, condition: &Condition, resource: &Node) -> Result<bool> {
        let path = &condition.source_path;
        self.ctx.evaluator.validate(path)?;

        match condition.operator {
            ConditionOperator::Exists => return Ok(self.ctx.exists(resource, path)),
            ConditionOperator::NotExists => return Ok(!self.ctx.exists(resource, path)),
            _ => {}
        }

        let Some((value, _)) = self.ctx.extract(resource, path) else {
            return Err(NormalizationError::Extraction {
                path: path.clone(),
                resource_type: resource.resource_type().to_string(),
            });
        };
        // Multi-valued sources compare their first value
        let actual = match value {
            Extracted::Scalar(scalar) => scalar,
            Extracted::List(items) => match items.into_iter().next() {
                Some(Extracted::Scalar(scalar)) => scalar,
                _ => return Ok(false),
            },
            Extracted::Structured(_) => return Ok(false),
        };

        let Some(expected) = condition.value.as_ref().and_then(scalar_from_json) else {
            return Ok(false);
        };
        Ok(compare(&actual, &expected, condition.operator))
    }
}

/// Apply `operator` to a source value and a condition value coerced to the
/// source's kind. Unsupported combinations fail the condition.
pub fn compare(actual: &Scalar, expected: &Scalar, operator: ConditionOperator) -> bool {
    let Some(expected) = expected.convert(actual.kind()) else {
        return false;
    };

    let ordering = match (actual, &expected) {
        (Scalar::String(a), Scalar::String(b)) => match operator {
            ConditionOperator::Equal => return a.to_lowercase() == b.to_lowercase(),
            ConditionOperator::NotEqual => return a.to_lowercase() != b.to_lowercase(),
            _ => a.cmp(b),
        },
        (Scalar::Boolean(a), Scalar::Boolean(b)) => {
            return match operator {
                ConditionOperator::Equal => a == b,
                ConditionOperator::NotEqual => a != b,
                _ => false,
            };
        }
        (Scalar::Integer(a), Scalar::Integer(b)) => a.cmp(b),
        (Scalar::Decimal(a), Scalar::Decimal(b)) => a.cmp(b),
        (Scalar::DateTime(a), Scalar::DateTime(b)) => a.cmp(b),
        _ => return false,
    };

    match operator {
        ConditionOperator::Equal => ordering == Ordering::Equal,
        ConditionOperator::NotEqual => ordering != Ordering::Equal,
        ConditionOperator::GreaterThan => ordering == Ordering::Greater,
        ConditionOperator::GreaterThanOrEqual => ordering != Ordering::Less,
        ConditionOperator::LessThan => ordering == Ordering::Less,
        ConditionOperator::LessThanOrEqual => ordering != Ordering::Greater,
        ConditionOperator::Exists | ConditionOperator::NotExists => false,
    }
}

/// Scalar for a JSON literal; numbers without a fraction become integers
pub fn scalar_from_json(value: &Value) -> Option<Scalar> {
    match value {
        Value::String(s) => Some(Scalar::String(s.clone())),
        Value::Bool(b) => Some(Scalar::Boolean(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Scalar::Integer(i)),
            None => Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string()))
                .ok()
                .map(Scalar::Decimal),
        },
        _ => None,
    }
}

fn target_value(value: &Value) -> Result<Extracted> {
    let literal = |item: &Value| {
        scalar_from_json(item).map(Extracted::Scalar).ok_or_else(|| {
            NormalizationError::input(format!("unsupported targetValue literal {item}"))
        })
    };
    match value {
        Value::Array(items) => {
            let mut values = items.iter().map(literal).collect::<Result<Vec<_>>>()?;
            match values.len() {
                0 => Err(NormalizationError::input("targetValue array is empty")),
                1 => Ok(values.remove(0)),
                _ => Ok(Extracted::List(values)),
            }
        }
        single => literal(single),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use serde_json::json;

    fn s(text: &str) -> Scalar {
        Scalar::from(text)
    }

    #[test]
    fn test_string_comparisons() {
        assert!(compare(&s("Final"), &s("final"), ConditionOperator::Equal));
        assert!(!compare(&s("Final"), &s("final"), ConditionOperator::NotEqual));
        assert!(compare(&s("b"), &s("a"), ConditionOperator::GreaterThan));
        // Ordering is ordinal: uppercase sorts first
        assert!(compare(&s("B"), &s("a"), ConditionOperator::LessThan));
    }

    #[test]
    fn test_numeric_comparisons_coerce_condition_value() {
        assert!(compare(&Scalar::Integer(10), &s("9"), ConditionOperator::GreaterThan));
        assert!(compare(
            &Scalar::Integer(10),
            &Scalar::Integer(10),
            ConditionOperator::LessThanOrEqual
        ));
        assert!(compare(
            &Scalar::Decimal(Decimal::new(725, 1)),
            &Scalar::Integer(72),
            ConditionOperator::GreaterThanOrEqual
        ));
        assert!(!compare(&Scalar::Integer(10), &s("ten"), ConditionOperator::Equal));
    }

    #[test]
    fn test_boolean_supports_only_equality() {
        let yes = Scalar::Boolean(true);
        assert!(compare(&yes, &s("TRUE"), ConditionOperator::Equal));
        assert!(!compare(&yes, &Scalar::Boolean(false), ConditionOperator::Equal));
        assert!(!compare(&yes, &Scalar::Boolean(false), ConditionOperator::GreaterThan));
    }

    #[test]
    fn test_date_time_comparisons() {
        let actual =
            Scalar::DateTime(DateTime::parse_from_rfc3339("2024-05-01T08:00:00Z").unwrap());
        assert!(compare(&actual, &s("2024-01-01"), ConditionOperator::GreaterThan));
        assert!(compare(&actual, &s("2024-05-01T10:00:00+02:00"), ConditionOperator::Equal));
    }

    #[test]
    fn test_json_literals() {
        assert_eq!(scalar_from_json(&json!(3)), Some(Scalar::Integer(3)));
        assert_eq!(scalar_from_json(&json!(7.25)), Some(Scalar::Decimal(Decimal::new(725, 2))));
        assert_eq!(scalar_from_json(&json!(null)), None);

        assert_eq!(target_value(&json!(["a"])).unwrap(), Extracted::Scalar(s("a")));
        assert!(matches!(
            target_value(&json!(["a", 1])).unwrap(),
            Extracted::List(items) if items.len() == 2
        ));
        assert!(target_value(&json!([])).is_err());
    }
}
