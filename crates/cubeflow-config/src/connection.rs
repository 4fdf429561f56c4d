use serde::{Deserialize, Serialize};

/// Input slot used when a connection does not name a target handle.
pub const DEFAULT_INPUT_HANDLE: &str = "input";

/// A directed edge carrying the output of one cube into an input slot of another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDef {
  pub id: String,
  pub source_id: String,
  pub target_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source_handle: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target_handle: Option<String>,
}

impl ConnectionDef {
  /// Create a connection without explicit handles.
  pub fn new(
    id: impl Into<String>,
    source_id: impl Into<String>,
    target_id: impl Into<String>,
  ) -> Self {
    Self {
      id: id.into(),
      source_id: source_id.into(),
      target_id: target_id.into(),
      source_handle: None,
      target_handle: None,
    }
  }

  /// Set the input slot on the target cube.
  pub fn with_target_handle(mut self, handle: impl Into<String>) -> Self {
    self.target_handle = Some(handle.into());
    self
  }

  /// The input key this connection writes on its target.
  pub fn input_key(&self) -> &str {
    self
      .target_handle
      .as_deref()
      .unwrap_or(DEFAULT_INPUT_HANDLE)
  }
}
