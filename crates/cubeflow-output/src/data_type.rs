//! Semantic type detection for raw cube values.
//!
//! Values that arrive without a declared kind (legacy string payloads, JSON
//! loaded from disk) are classified by shape. Strings are further split into
//! image and audio when they carry a base64 data-URL signature.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static IMAGE_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^data:image/(png|jpg|jpeg|gif|webp);base64,").expect("valid image signature")
});

static AUDIO_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^data:audio/(mp3|wav|ogg|webm);base64,").expect("valid audio signature")
});

/// The semantic type of a cube value.
///
/// `Object` is only ever used as an expected type; detection reports plain
/// objects as `Json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
  Text,
  Json,
  Image,
  Audio,
  Number,
  Boolean,
  Array,
  Object,
}

impl DataType {
  pub fn as_str(self) -> &'static str {
    match self {
      DataType::Text => "text",
      DataType::Json => "json",
      DataType::Image => "image",
      DataType::Audio => "audio",
      DataType::Number => "number",
      DataType::Boolean => "boolean",
      DataType::Array => "array",
      DataType::Object => "object",
    }
  }
}

impl fmt::Display for DataType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataTypeError {
  #[error("data is null")]
  Null,

  #[error("expected type '{expected}' but got '{actual}'")]
  Mismatch { expected: DataType, actual: DataType },
}

/// Classify a raw value.
pub fn detect_type(value: &serde_json::Value) -> Result<DataType, DataTypeError> {
  use serde_json::Value;

  match value {
    Value::Null => Err(DataTypeError::Null),
    Value::String(s) if IMAGE_SIGNATURE.is_match(s) => Ok(DataType::Image),
    Value::String(s) if AUDIO_SIGNATURE.is_match(s) => Ok(DataType::Audio),
    Value::String(_) => Ok(DataType::Text),
    Value::Number(_) => Ok(DataType::Number),
    Value::Bool(_) => Ok(DataType::Boolean),
    Value::Array(_) => Ok(DataType::Array),
    Value::Object(_) => Ok(DataType::Json),
  }
}

/// Whether a value detected as `actual` is acceptable where `expected` is declared.
///
/// Compatibility is keyed by the expected type: base64 carriers are text, an
/// array may stand in for an array-or-json slot, and objects and json are
/// interchangeable.
pub fn is_compatible(actual: DataType, expected: DataType) -> bool {
  let accepted: &[DataType] = match expected {
    DataType::Text => &[DataType::Text],
    DataType::Json | DataType::Object => &[DataType::Json, DataType::Object],
    DataType::Image => &[DataType::Image, DataType::Text],
    DataType::Audio => &[DataType::Audio, DataType::Text],
    DataType::Number => &[DataType::Number],
    DataType::Boolean => &[DataType::Boolean],
    DataType::Array => &[DataType::Array, DataType::Json],
  };
  accepted.contains(&actual)
}

/// Check a value against an expected type, returning the detected type.
pub fn validate(value: &serde_json::Value, expected: DataType) -> Result<DataType, DataTypeError> {
  let actual = detect_type(value)?;
  if actual == expected || is_compatible(actual, expected) {
    Ok(actual)
  } else {
    Err(DataTypeError::Mismatch { expected, actual })
  }
}

/// A value whose kind was declared by its producer rather than guessed.
///
/// The kind always wins over detection: a base64 string declared as `Text`
/// stays text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedValue {
  pub kind: DataType,
  pub value: serde_json::Value,
}

impl TypedValue {
  pub fn new(kind: DataType, value: serde_json::Value) -> Self {
    Self { kind, value }
  }

  /// Tag an untagged value by detection.
  pub fn infer(value: serde_json::Value) -> Result<Self, DataTypeError> {
    let kind = detect_type(&value)?;
    Ok(Self { kind, value })
  }

  /// Whether the value's shape can carry the declared kind.
  pub fn check(&self) -> Result<(), DataTypeError> {
    validate(&self.value, self.kind).map(|_| ())
  }
}
