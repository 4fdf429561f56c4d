use serde::{Deserialize, Serialize};

use crate::enums::{CubeType, UnknownCubeType};

/// Canvas coordinates. Layout metadata only, never read by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
  pub x: f64,
  pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeDef {
  pub id: String,
  /// Type identifier as authored, e.g. `"loader-text"`.
  ///
  /// Kept as a string so that workflows naming an unsupported type still
  /// load; the executor rejects them when the cube is dispatched.
  #[serde(rename = "type")]
  pub cube_type: String,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub config: serde_json::Map<String, serde_json::Value>,
  #[serde(default)]
  pub position: Position,
}

impl CubeDef {
  pub fn new(id: impl Into<String>, cube_type: CubeType) -> Self {
    let id = id.into();
    Self {
      name: id.clone(),
      id,
      cube_type: cube_type.as_str().to_string(),
      config: serde_json::Map::new(),
      position: Position::default(),
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  /// Add a static config entry.
  pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
    self.config.insert(key.into(), value);
    self
  }

  /// Parse the authored type identifier.
  pub fn kind(&self) -> Result<CubeType, UnknownCubeType> {
    self.cube_type.parse()
  }
}
