use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::connection::ConnectionDef;
use crate::cube::CubeDef;

/// A workflow as authored: `{name, description?, cubes, connections}`.
///
/// Identity and ownership fields are optional so that a bare editor payload
/// (which carries neither) deserializes as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDef {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub owner_id: Option<String>,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub cubes: Vec<CubeDef>,
  #[serde(default)]
  pub connections: Vec<ConnectionDef>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_parse_authoring_payload() {
    let payload = json!({
      "name": "Compare",
      "cubes": [
        { "id": "a", "type": "loader-text", "name": "Load", "config": { "content": "5" }, "position": { "x": 0, "y": 0 } },
        { "id": "b", "type": "decider", "name": "Check", "config": { "operator": "greater", "value2": 3 }, "position": { "x": 200, "y": 0 } }
      ],
      "connections": [
        { "id": "c1", "sourceId": "a", "targetId": "b", "targetHandle": "value1" }
      ]
    });

    let def: WorkflowDef = serde_json::from_value(payload).unwrap();
    assert_eq!(def.cubes.len(), 2);
    assert_eq!(def.cubes[1].cube_type, "decider");
    assert_eq!(def.connections[0].input_key(), "value1");
    assert!(def.description.is_none());
  }

  #[test]
  fn test_default_input_key() {
    let conn = ConnectionDef::new("c", "a", "b");
    assert_eq!(conn.input_key(), "input");
  }

  #[test]
  fn test_unknown_type_survives_parsing() {
    let payload = json!({
      "name": "Odd",
      "cubes": [{ "id": "x", "type": "teleport", "name": "X", "config": {} }],
      "connections": []
    });

    let def: WorkflowDef = serde_json::from_value(payload).unwrap();
    assert!(def.cubes[0].kind().is_err());
  }
}
