//! Error types for run management.

use cubeflow_runtime::RunStatus;
use cubeflow_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  /// The workflow does not exist or belongs to someone else.
  #[error("workflow '{workflow_id}' not found")]
  WorkflowNotFound { workflow_id: String },

  /// The run does not exist or belongs to someone else.
  #[error("execution '{execution_id}' not found")]
  ExecutionNotFound { execution_id: String },

  #[error("execution '{execution_id}' is not running (status: {status})")]
  NotRunning {
    execution_id: String,
    status: RunStatus,
  },

  #[error("store error: {0}")]
  Store(#[from] StoreError),

  #[error("workflow runner channel closed")]
  RunnerClosed,
}
