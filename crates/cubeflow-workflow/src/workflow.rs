use chrono::{DateTime, Utc};
use cubeflow_config::WorkflowDef;
use serde::{Deserialize, Serialize};

use crate::graph::Graph;
use crate::{Connection, Cube};

/// A workflow owned by a user, ready to be validated and run.
///
/// Cubes keep authoring order, which the scheduler uses as its tie-break.
/// Nothing here guarantees structural soundness; run
/// [`WorkflowValidator::validate`](crate::WorkflowValidator::validate) first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
  pub workflow_id: String,
  pub owner_id: String,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub cubes: Vec<Cube>,
  pub connections: Vec<Connection>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Workflow {
  /// Create an empty workflow.
  pub fn new(
    workflow_id: impl Into<String>,
    owner_id: impl Into<String>,
    name: impl Into<String>,
  ) -> Self {
    let now = Utc::now();
    Self {
      workflow_id: workflow_id.into(),
      owner_id: owner_id.into(),
      name: name.into(),
      description: None,
      cubes: Vec::new(),
      connections: Vec::new(),
      created_at: now,
      updated_at: now,
    }
  }

  /// Build a workflow from an authoring payload.
  ///
  /// Identity and ownership carried by the payload win over the fallbacks.
  pub fn from_def(
    def: WorkflowDef,
    fallback_id: impl Into<String>,
    fallback_owner: impl Into<String>,
  ) -> Self {
    let now = Utc::now();
    Self {
      workflow_id: def.id.unwrap_or_else(|| fallback_id.into()),
      owner_id: def.owner_id.unwrap_or_else(|| fallback_owner.into()),
      name: def.name,
      description: def.description,
      cubes: def.cubes,
      connections: def.connections,
      created_at: def.created_at.unwrap_or(now),
      updated_at: def.updated_at.unwrap_or(now),
    }
  }

  /// Convert back to the authoring payload.
  pub fn to_def(&self) -> WorkflowDef {
    WorkflowDef {
      id: Some(self.workflow_id.clone()),
      owner_id: Some(self.owner_id.clone()),
      name: self.name.clone(),
      description: self.description.clone(),
      cubes: self.cubes.clone(),
      connections: self.connections.clone(),
      created_at: Some(self.created_at),
      updated_at: Some(self.updated_at),
    }
  }

  pub fn with_cube(mut self, cube: Cube) -> Self {
    self.cubes.push(cube);
    self
  }

  pub fn with_connection(mut self, connection: Connection) -> Self {
    self.connections.push(connection);
    self
  }

  /// Build the graph structure for traversal.
  pub fn graph(&self) -> Graph {
    Graph::new(&self.cubes, &self.connections)
  }

  /// Get a cube by ID.
  pub fn get_cube(&self, cube_id: &str) -> Option<&Cube> {
    self.cubes.iter().find(|c| c.id == cube_id)
  }

  /// Connections whose target is the given cube, in declaration order.
  pub fn incoming<'a>(&'a self, cube_id: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
    self
      .connections
      .iter()
      .filter(move |conn| conn.target_id == cube_id)
  }
}
