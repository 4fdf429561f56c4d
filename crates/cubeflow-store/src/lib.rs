//! Cubeflow Store
//!
//! The [`PersistenceSink`] trait is the engine's only view of durable state:
//! - Reading and saving workflow definitions
//! - Creating run records and appending their log entries as they happen
//! - Finalizing runs with status, results, and error
//! - Querying run history
//!
//! [`MemoryStore`] keeps everything in process memory.

mod memory;
mod types;

pub use cubeflow_runtime::RunStatus as ExecutionStatus;
pub use memory::MemoryStore;
pub use types::{ExecutionRecord, ExecutionUpdate};

use async_trait::async_trait;
use cubeflow_output::LogEntry;
use cubeflow_workflow::Workflow;

/// Error type for storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  #[error("already exists: {0}")]
  AlreadyExists(String),

  /// The backing store could not be reached.
  #[error("store unavailable: {0}")]
  Unavailable(String),
}

/// Storage for workflows and their runs.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
  /// Insert or replace a workflow definition.
  async fn save_workflow(&self, workflow: &Workflow) -> Result<(), StoreError>;

  async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow, StoreError>;

  /// Create a new run record.
  async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, StoreError>;

  /// Append one log entry to a run.
  async fn append_log(&self, execution_id: &str, entry: &LogEntry) -> Result<(), StoreError>;

  /// Update a run's status and, when provided, its end time, results, and error.
  async fn update_execution(
    &self,
    execution_id: &str,
    update: ExecutionUpdate,
  ) -> Result<(), StoreError>;

  /// Runs of a workflow, most recent first.
  async fn list_executions(&self, workflow_id: &str) -> Result<Vec<ExecutionRecord>, StoreError>;
}
