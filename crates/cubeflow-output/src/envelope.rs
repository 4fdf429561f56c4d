//! The canonical output envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data_type::{DataType, TypedValue};

/// `{success, data, type, timestamp, metadata?}` wrapper around every cube result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
  pub success: bool,
  pub data: serde_json::Value,
  #[serde(rename = "type")]
  pub data_type: DataType,
  pub timestamp: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Envelope {
  /// A failed result carrying `{error}` as its data.
  pub fn failure(error: impl Into<String>, data_type: DataType) -> Self {
    Self {
      success: false,
      data: serde_json::json!({ "error": error.into() }),
      data_type,
      timestamp: Utc::now(),
      metadata: None,
    }
  }

  /// Serialize into the JSON shape that flows along connections.
  pub fn to_value(&self) -> serde_json::Value {
    serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
  }

  /// Whether a raw value has the envelope shape.
  pub fn is_envelope(value: &serde_json::Value) -> bool {
    value.as_object().is_some_and(|obj| {
      obj.get("success").is_some_and(|v| v.is_boolean())
        && obj.contains_key("data")
        && obj.get("type").is_some_and(|v| v.is_string())
        && obj.contains_key("timestamp")
    })
  }

  /// The payload of an envelope-shaped value, or the value itself otherwise.
  pub fn payload(value: &serde_json::Value) -> &serde_json::Value {
    if Self::is_envelope(value) {
      &value["data"]
    } else {
      value
    }
  }
}

/// The single normalization point for raw handler output.
pub struct OutputFormatter;

impl OutputFormatter {
  /// Wrap a raw value.
  ///
  /// A value that is already envelope-shaped is unwrapped first, so
  /// formatting never nests envelopes.
  pub fn format(output: serde_json::Value, data_type: DataType) -> Envelope {
    Self::format_with_metadata(output, data_type, None)
  }

  pub fn format_with_metadata(
    output: serde_json::Value,
    data_type: DataType,
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
  ) -> Envelope {
    let data = if Envelope::is_envelope(&output) {
      Envelope::payload(&output).clone()
    } else {
      output
    };

    Envelope {
      success: true,
      data,
      data_type,
      timestamp: Utc::now(),
      metadata,
    }
  }

  /// Wrap a value whose kind was declared by its producer.
  pub fn format_typed(value: TypedValue) -> Envelope {
    Self::format(value.value, value.kind)
  }

  pub fn text(text: impl Into<String>) -> Envelope {
    Self::format(serde_json::Value::String(text.into()), DataType::Text)
  }

  pub fn number(value: f64) -> Envelope {
    Self::format(number_value(value), DataType::Number)
  }

  pub fn boolean(value: bool) -> Envelope {
    Self::format(serde_json::Value::Bool(value), DataType::Boolean)
  }

  pub fn json(value: serde_json::Value) -> Envelope {
    Self::format(value, DataType::Json)
  }
}

/// JSON number for a float, using an integer representation when the value is integral.
pub fn number_value(value: f64) -> serde_json::Value {
  const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

  if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
    serde_json::Value::from(value as i64)
  } else {
    serde_json::Number::from_f64(value)
      .map(serde_json::Value::Number)
      .unwrap_or(serde_json::Value::Null)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_format_wraps_value() {
    let env = OutputFormatter::format(json!(4), DataType::Number);
    assert!(env.success);
    assert_eq!(env.data, json!(4));
    assert_eq!(env.data_type, DataType::Number);
    assert!(env.metadata.is_none());
  }

  #[test]
  fn test_format_is_idempotent_on_data() {
    let first = OutputFormatter::format(json!({"decision": true}), DataType::Json);
    let second = OutputFormatter::format(first.data.clone(), first.data_type);
    assert_eq!(first.data, second.data);

    // Re-formatting a whole envelope does not nest it.
    let third = OutputFormatter::format(first.to_value(), DataType::Json);
    assert_eq!(third.data, first.data);
  }

  #[test]
  fn test_serialized_shape() {
    let mut metadata = serde_json::Map::new();
    metadata.insert("cubeType".to_string(), json!("math"));
    let env = OutputFormatter::format_with_metadata(json!(4), DataType::Number, Some(metadata));
    let value = env.to_value();

    assert_eq!(value["success"], json!(true));
    assert_eq!(value["type"], json!("number"));
    assert_eq!(value["data"], json!(4));
    assert!(value["timestamp"].is_string());
    assert_eq!(value["metadata"]["cubeType"], json!("math"));
    assert!(Envelope::is_envelope(&value));
  }

  #[test]
  fn test_payload_passthrough() {
    let raw = json!({"data": 1});
    assert_eq!(Envelope::payload(&raw), &raw);

    let env = OutputFormatter::text("5").to_value();
    assert_eq!(Envelope::payload(&env), &json!("5"));
  }

  #[test]
  fn test_number_value_prefers_integers() {
    assert_eq!(number_value(4.0), json!(4));
    assert_eq!(number_value(-2.0), json!(-2));
    assert_eq!(number_value(2.5), json!(2.5));
    assert_eq!(OutputFormatter::number(4.0).data, json!(4));
  }

  #[test]
  fn test_failure_envelope() {
    let env = Envelope::failure("boom", DataType::Text);
    assert!(!env.success);
    assert_eq!(env.data, json!({"error": "boom"}));
  }
}
