//! Error types for cube dispatch and run scheduling.

use thiserror::Error;

/// Why a run stopped before completing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
  /// The workflow failed structural validation; no cube ran.
  #[error("workflow validation failed: {}", errors.join(", "))]
  StructuralValidation { errors: Vec<String> },

  /// A required input was absent or null.
  #[error("input validation failed for cube '{cube_id}': missing required input: {}", missing.join(", "))]
  InputContract { cube_id: String, missing: Vec<String> },

  #[error("unknown cube type '{cube_type}' for cube '{cube_id}'")]
  UnknownCubeType { cube_id: String, cube_type: String },

  /// The handler returned an error or panicked.
  #[error("cube '{cube_id}' failed: {message}")]
  HandlerExecution { cube_id: String, message: String },

  #[error("cube '{cube_id}' timed out after {timeout_ms}ms")]
  Timeout { cube_id: String, timeout_ms: u64 },

  /// Cancelled between cubes.
  #[error("workflow execution cancelled")]
  Cancelled,
}

impl ExecutionError {
  /// The cube the error is attributed to, if any.
  pub fn cube_id(&self) -> Option<&str> {
    match self {
      ExecutionError::InputContract { cube_id, .. }
      | ExecutionError::UnknownCubeType { cube_id, .. }
      | ExecutionError::HandlerExecution { cube_id, .. }
      | ExecutionError::Timeout { cube_id, .. } => Some(cube_id),
      ExecutionError::StructuralValidation { .. } | ExecutionError::Cancelled => None,
    }
  }
}

/// Errors reported by [`TimeoutWatchdog`](crate::TimeoutWatchdog).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchdogError {
  /// The budget elapsed first. The work keeps running detached.
  #[error("operation '{operation_id}' timed out after {timeout_ms}ms")]
  TimedOut {
    operation_id: String,
    timeout_ms: u64,
  },

  #[error("operation '{operation_id}' panicked: {message}")]
  Panicked {
    operation_id: String,
    message: String,
  },
}
