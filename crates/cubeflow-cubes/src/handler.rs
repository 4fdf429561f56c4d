use async_trait::async_trait;
use cubeflow_output::Envelope;
use serde_json::Value;

use crate::error::HandlerError;

/// Named parameters passed to a handler.
pub type Params = serde_json::Map<String, Value>;

/// The work behind one cube type.
///
/// `inputs` already contain the cube's static config overridden by upstream
/// outputs; `config` is the cube's static config on its own. Handlers return a
/// raw value. Wrapping it into an envelope is the executor's job.
#[async_trait]
pub trait CubeHandler: Send + Sync {
  async fn execute(&self, inputs: &Params, config: &Params) -> Result<Value, HandlerError>;
}

/// `config` overridden by `inputs`, with envelope-shaped values unwrapped to
/// their `data`.
pub fn merge_params(inputs: &Params, config: &Params) -> Params {
  config
    .iter()
    .chain(inputs.iter())
    .map(|(key, value)| (key.clone(), Envelope::payload(value).clone()))
    .collect()
}

/// A present, non-null parameter.
pub(crate) fn param<'a>(params: &'a Params, key: &str) -> Option<&'a Value> {
  params.get(key).filter(|v| !v.is_null())
}

/// A parameter rendered as text. Strings are taken verbatim; other values are
/// rendered the way they would print.
pub(crate) fn text_param(params: &Params, key: &str) -> Option<String> {
  param(params, key)
    .map(display_value)
    .filter(|s| !s.is_empty())
}

pub(crate) fn require_text(params: &Params, key: &str) -> Result<String, HandlerError> {
  text_param(params, key).ok_or_else(|| HandlerError::missing(key))
}

/// Render a value as plain text. Integral numbers print without a fraction.
pub(crate) fn display_value(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Number(n) => match n.as_f64() {
      Some(f) if n.is_f64() => cubeflow_output::number_value(f).to_string(),
      _ => n.to_string(),
    },
    other => other.to_string(),
  }
}

/// Loose numeric coercion: numbers as-is, numeric strings parsed, booleans as
/// 0/1, null and empty strings as 0. Anything else is NaN.
pub(crate) fn coerce_number(value: &Value) -> f64 {
  match value {
    Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
    Value::String(s) => {
      let trimmed = s.trim();
      if trimmed.is_empty() {
        0.0
      } else {
        trimmed.parse().unwrap_or(f64::NAN)
      }
    }
    Value::Bool(b) => f64::from(u8::from(*b)),
    Value::Null => 0.0,
    Value::Array(_) | Value::Object(_) => f64::NAN,
  }
}
