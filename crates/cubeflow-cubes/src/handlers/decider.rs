use std::str::FromStr;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};

use crate::error::HandlerError;
use crate::handler::{CubeHandler, Params, coerce_number, display_value, merge_params, param};

/// Comparison applied by a decider cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
  Equals,
  NotEquals,
  Contains,
  Greater,
  Less,
  GreaterEquals,
  LessEquals,
  Regex,
}

impl FromStr for Operator {
  type Err = HandlerError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "equals" => Ok(Operator::Equals),
      "not_equals" => Ok(Operator::NotEquals),
      "contains" => Ok(Operator::Contains),
      "greater" => Ok(Operator::Greater),
      "less" => Ok(Operator::Less),
      "greater_equals" => Ok(Operator::GreaterEquals),
      "less_equals" => Ok(Operator::LessEquals),
      "regex" => Ok(Operator::Regex),
      other => Err(HandlerError::UnsupportedOperator {
        operator: other.to_string(),
      }),
    }
  }
}

/// Strict equality. Numbers compare by value regardless of representation.
fn strict_equals(a: &Value, b: &Value) -> bool {
  match (a, b) {
    (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
    _ => a == b,
  }
}

impl Operator {
  /// Apply the operator. Numeric comparisons coerce both sides; a value that
  /// does not coerce compares false.
  pub fn apply(self, left: &Value, right: &Value) -> Result<bool, HandlerError> {
    let numeric = |cmp: fn(f64, f64) -> bool| cmp(coerce_number(left), coerce_number(right));

    Ok(match self {
      Operator::Equals => strict_equals(left, right),
      Operator::NotEquals => !strict_equals(left, right),
      Operator::Contains => match left {
        Value::String(s) => s.contains(&display_value(right)),
        Value::Array(items) => items.iter().any(|item| strict_equals(item, right)),
        _ => false,
      },
      Operator::Greater => numeric(|a, b| a > b),
      Operator::Less => numeric(|a, b| a < b),
      Operator::GreaterEquals => numeric(|a, b| a >= b),
      Operator::LessEquals => numeric(|a, b| a <= b),
      Operator::Regex => match left {
        Value::String(s) => {
          let pattern = display_value(right);
          let regex = Regex::new(&pattern)
            .map_err(|e| HandlerError::invalid("value2", format!("invalid regex: {e}")))?;
          regex.is_match(s)
        }
        _ => false,
      },
    })
  }
}

/// Compares `value1` against `value2` and returns `{decision}`.
pub struct DeciderHandler;

#[async_trait]
impl CubeHandler for DeciderHandler {
  async fn execute(&self, inputs: &Params, config: &Params) -> Result<Value, HandlerError> {
    let params = merge_params(inputs, config);

    let left = param(&params, "value1").ok_or_else(|| HandlerError::missing("value1"))?;
    let right = param(&params, "value2").ok_or_else(|| HandlerError::missing("value2"))?;
    let operator: Operator = match param(&params, "operator") {
      Some(Value::String(op)) => op.parse()?,
      Some(other) => {
        return Err(HandlerError::UnsupportedOperator {
          operator: other.to_string(),
        });
      }
      None => return Err(HandlerError::missing("operator")),
    };

    let decision = operator.apply(left, right)?;
    Ok(json!({ "decision": decision }))
  }
}
