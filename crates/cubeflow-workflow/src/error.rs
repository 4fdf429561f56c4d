use thiserror::Error;

/// A structural defect in a workflow graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
  #[error("workflow must contain at least one cube")]
  Empty,

  #[error("duplicate cube id: {0}")]
  DuplicateCubeId(String),

  #[error("connection '{connection_id}' references non-existent source cube: {cube_id}")]
  UnknownSource {
    connection_id: String,
    cube_id: String,
  },

  #[error("connection '{connection_id}' references non-existent target cube: {cube_id}")]
  UnknownTarget {
    connection_id: String,
    cube_id: String,
  },

  #[error("workflow contains a cycle which would cause infinite execution")]
  Cycle,

  #[error("workflow has no starting point (all cubes have incoming connections)")]
  NoEntryPoints,
}
