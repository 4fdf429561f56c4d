use std::collections::HashMap;

use async_trait::async_trait;
use cubeflow_output::LogEntry;
use cubeflow_workflow::Workflow;
use tokio::sync::RwLock;

use crate::types::{ExecutionRecord, ExecutionUpdate};
use crate::{PersistenceSink, StoreError};

/// A [`PersistenceSink`] backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
  workflows: RwLock<HashMap<String, Workflow>>,
  executions: RwLock<HashMap<String, ExecutionRecord>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl PersistenceSink for MemoryStore {
  async fn save_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
    self
      .workflows
      .write()
      .await
      .insert(workflow.workflow_id.clone(), workflow.clone());
    Ok(())
  }

  async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow, StoreError> {
    self
      .workflows
      .read()
      .await
      .get(workflow_id)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(format!("workflow {workflow_id}")))
  }

  async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
    let mut executions = self.executions.write().await;
    if executions.contains_key(&record.execution_id) {
      return Err(StoreError::AlreadyExists(format!(
        "execution {}",
        record.execution_id
      )));
    }
    executions.insert(record.execution_id.clone(), record.clone());
    Ok(())
  }

  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, StoreError> {
    self
      .executions
      .read()
      .await
      .get(execution_id)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(format!("execution {execution_id}")))
  }

  async fn append_log(&self, execution_id: &str, entry: &LogEntry) -> Result<(), StoreError> {
    self
      .executions
      .write()
      .await
      .get_mut(execution_id)
      .map(|record| record.logs.push(entry.clone()))
      .ok_or_else(|| StoreError::NotFound(format!("execution {execution_id}")))
  }

  async fn update_execution(
    &self,
    execution_id: &str,
    update: ExecutionUpdate,
  ) -> Result<(), StoreError> {
    self
      .executions
      .write()
      .await
      .get_mut(execution_id)
      .map(|record| record.apply(update))
      .ok_or_else(|| StoreError::NotFound(format!("execution {execution_id}")))
  }

  async fn list_executions(&self, workflow_id: &str) -> Result<Vec<ExecutionRecord>, StoreError> {
    let mut records: Vec<ExecutionRecord> = self
      .executions
      .read()
      .await
      .values()
      .filter(|r| r.workflow_id == workflow_id)
      .cloned()
      .collect();
    records.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    Ok(records)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use cubeflow_output::LogLevel;
  use cubeflow_runtime::RunStatus;

  #[tokio::test]
  async fn test_workflow_roundtrip_and_missing() {
    let store = MemoryStore::new();
    let workflow = Workflow::new("wf-1", "user-1", "Demo");
    store.save_workflow(&workflow).await.unwrap();

    assert_eq!(store.get_workflow("wf-1").await.unwrap().name, "Demo");
    assert_eq!(
      store.get_workflow("nope").await.unwrap_err(),
      StoreError::NotFound("workflow nope".to_string())
    );
  }

  #[tokio::test]
  async fn test_execution_lifecycle() {
    let store = MemoryStore::new();
    let record = ExecutionRecord::running("exec-1", "wf-1", "user-1");
    store.create_execution(&record).await.unwrap();
    assert!(matches!(
      store.create_execution(&record).await,
      Err(StoreError::AlreadyExists(_))
    ));

    store
      .append_log("exec-1", &LogEntry::system("started", LogLevel::Info))
      .await
      .unwrap();
    store
      .update_execution(
        "exec-1",
        ExecutionUpdate::finished(RunStatus::Failed, Default::default(), Some("boom".into())),
      )
      .await
      .unwrap();

    let stored = store.get_execution("exec-1").await.unwrap();
    assert_eq!(stored.status, RunStatus::Failed);
    assert_eq!(stored.logs.len(), 1);
    assert_eq!(stored.error.as_deref(), Some("boom"));
    assert!(stored.end_time.is_some());
  }

  #[tokio::test]
  async fn test_append_log_to_unknown_run() {
    let store = MemoryStore::new();
    let err = store
      .append_log("ghost", &LogEntry::system("x", LogLevel::Info))
      .await
      .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
  }

  #[tokio::test]
  async fn test_list_filters_by_workflow() {
    let store = MemoryStore::new();
    for (id, wf) in [("a", "wf-1"), ("b", "wf-2"), ("c", "wf-1")] {
      store
        .create_execution(&ExecutionRecord::running(id, wf, "u"))
        .await
        .unwrap();
    }
    let mut ids: Vec<_> = store
      .list_executions("wf-1")
      .await
      .unwrap()
      .into_iter()
      .map(|r| r.execution_id)
      .collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "c"]);
  }
}
