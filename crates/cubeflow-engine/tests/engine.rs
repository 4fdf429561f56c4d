use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cubeflow_cubes::{
  AiProvider, CubeHandler, HandlerError, HandlerRegistry, ImageRequest, ImageResponse, Params,
  ProviderError, TextRequest, TextResponse,
};
use cubeflow_engine::{EngineError, ExecutionManager, RunRequest, WorkflowRunner};
use cubeflow_output::LogEntry;
use cubeflow_runtime::{ChannelNotifier, CubeExecutor, ExecutionEvent, RunStatus, RuntimeConfig};
use cubeflow_store::{
  ExecutionRecord, ExecutionUpdate, MemoryStore, PersistenceSink, StoreError,
};
use cubeflow_workflow::{Connection, Cube, CubeType, Workflow};
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

struct NoAi;

#[async_trait]
impl AiProvider for NoAi {
  async fn generate_text(&self, _: TextRequest) -> Result<TextResponse, ProviderError> {
    Err(ProviderError::MissingApiKey)
  }

  async fn generate_image(&self, _: ImageRequest) -> Result<ImageResponse, ProviderError> {
    Err(ProviderError::MissingApiKey)
  }
}

/// Blocks until released, then yields "opened".
struct GateHandler {
  entered: Arc<Notify>,
  release: Arc<Notify>,
}

#[async_trait]
impl CubeHandler for GateHandler {
  async fn execute(&self, _: &Params, _: &Params) -> Result<Value, HandlerError> {
    self.entered.notify_one();
    self.release.notified().await;
    Ok(json!("opened"))
  }
}

/// Delegates to a `MemoryStore` but refuses every log append.
#[derive(Default)]
struct LoglessStore {
  inner: MemoryStore,
}

#[async_trait]
impl PersistenceSink for LoglessStore {
  async fn save_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
    self.inner.save_workflow(workflow).await
  }

  async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow, StoreError> {
    self.inner.get_workflow(workflow_id).await
  }

  async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
    self.inner.create_execution(record).await
  }

  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, StoreError> {
    self.inner.get_execution(execution_id).await
  }

  async fn append_log(&self, _: &str, _: &LogEntry) -> Result<(), StoreError> {
    Err(StoreError::Unavailable("log volume offline".to_string()))
  }

  async fn update_execution(
    &self,
    execution_id: &str,
    update: ExecutionUpdate,
  ) -> Result<(), StoreError> {
    self.inner.update_execution(execution_id, update).await
  }

  async fn list_executions(&self, workflow_id: &str) -> Result<Vec<ExecutionRecord>, StoreError> {
    self.inner.list_executions(workflow_id).await
  }
}

fn executor(registry: HandlerRegistry) -> CubeExecutor {
  CubeExecutor::new(registry, RuntimeConfig::default())
}

fn builtin() -> HandlerRegistry {
  HandlerRegistry::builtin(Arc::new(NoAi), std::env::temp_dir())
}

fn math_workflow() -> Workflow {
  Workflow::new("wf-math", "alice", "math")
    .with_cube(Cube::new("sum", CubeType::Math).with_config("expression", json!("2+2")))
}

async fn manager_with(workflow: &Workflow) -> ExecutionManager {
  let store = Arc::new(MemoryStore::new());
  store.save_workflow(workflow).await.unwrap();
  ExecutionManager::new(store, executor(builtin()))
}

#[tokio::test]
async fn test_run_persists_final_record() {
  let manager = manager_with(&math_workflow()).await;

  let record = manager.run("alice", "wf-math").await.unwrap();
  assert_eq!(record.status, RunStatus::Completed);
  assert_eq!(record.results["sum"].data, json!(4));
  assert!(record.end_time.is_some());
  assert!(record.error.is_none());

  let stored = manager.get("alice", &record.execution_id).await.unwrap();
  assert_eq!(stored.status, RunStatus::Completed);
  assert_eq!(stored.results, record.results);
  // Every log entry reached the store, in order
  assert_eq!(stored.logs, record.logs);
  assert!(!manager.is_active(&record.execution_id));
}

#[tokio::test]
async fn test_other_owner_sees_nothing() {
  let manager = manager_with(&math_workflow()).await;

  let err = manager.run("mallory", "wf-math").await.unwrap_err();
  assert!(matches!(err, EngineError::WorkflowNotFound { .. }));

  let record = manager.run("alice", "wf-math").await.unwrap();
  let err = manager
    .get("mallory", &record.execution_id)
    .await
    .unwrap_err();
  assert!(matches!(err, EngineError::ExecutionNotFound { .. }));
  assert!(manager.list("mallory", "wf-math", 10).await.is_err());
}

#[tokio::test]
async fn test_invalid_workflow_fails_without_logs() {
  let workflow = Workflow::new("wf-empty", "alice", "nothing");
  let manager = manager_with(&workflow).await;

  let record = manager.run("alice", "wf-empty").await.unwrap();
  assert_eq!(record.status, RunStatus::Failed);
  assert!(record.logs.is_empty());
  let error = record.error.unwrap();
  assert!(error.starts_with("workflow validation failed"), "{error}");

  let stored = manager.get("alice", &record.execution_id).await.unwrap();
  assert_eq!(stored.status, RunStatus::Failed);
  assert!(stored.logs.is_empty());
}

#[tokio::test]
async fn test_log_append_failures_do_not_change_outcome() {
  let store = Arc::new(LoglessStore::default());
  store.save_workflow(&math_workflow()).await.unwrap();
  let manager = ExecutionManager::new(store, executor(builtin()));

  let record = manager.run("alice", "wf-math").await.unwrap();
  assert_eq!(record.status, RunStatus::Completed);
  assert!(!record.logs.is_empty());

  let stored = manager.get("alice", &record.execution_id).await.unwrap();
  assert_eq!(stored.status, RunStatus::Completed);
  assert!(stored.logs.is_empty());
}

#[tokio::test]
async fn test_list_is_limited() {
  let manager = manager_with(&math_workflow()).await;
  for _ in 0..3 {
    manager.run("alice", "wf-math").await.unwrap();
  }

  assert_eq!(manager.list("alice", "wf-math", 10).await.unwrap().len(), 3);
  assert_eq!(manager.list("alice", "wf-math", 2).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_cancel_stops_before_next_cube() {
  let entered = Arc::new(Notify::new());
  let release = Arc::new(Notify::new());
  let registry = builtin().with_handler(
    CubeType::LoaderText,
    GateHandler {
      entered: entered.clone(),
      release: release.clone(),
    },
  );

  let workflow = Workflow::new("wf-gate", "alice", "gate")
    .with_cube(Cube::new("gate", CubeType::LoaderText))
    .with_cube(Cube::new("sum", CubeType::Math).with_config("expression", json!("1+1")))
    .with_connection(Connection::new("c1", "gate", "sum").with_target_handle("note"));

  let store = Arc::new(MemoryStore::new());
  store.save_workflow(&workflow).await.unwrap();
  let (sender, mut events) = mpsc::unbounded_channel();
  let manager = ExecutionManager::with_observer(
    store,
    executor(registry),
    Arc::new(ChannelNotifier::new(sender)),
  );

  let execution_id = manager.start("alice", "wf-gate").await.unwrap();
  entered.notified().await;

  let err = manager.cancel("mallory", &execution_id).await.unwrap_err();
  assert!(matches!(err, EngineError::ExecutionNotFound { .. }));

  manager.cancel("alice", &execution_id).await.unwrap();
  assert_eq!(
    manager.get("alice", &execution_id).await.unwrap().status,
    RunStatus::Cancelled
  );
  release.notify_one();

  let finished = tokio::time::timeout(Duration::from_secs(5), async {
    while let Some(event) = events.recv().await {
      if matches!(event, ExecutionEvent::WorkflowCancelled { .. }) {
        return true;
      }
    }
    false
  })
  .await
  .unwrap();
  assert!(finished);

  // The gate's output is kept; the math cube never ran
  let mut record = manager.get("alice", &execution_id).await.unwrap();
  for _ in 0..50 {
    if record.end_time.is_some() {
      break;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
    record = manager.get("alice", &execution_id).await.unwrap();
  }
  assert_eq!(record.status, RunStatus::Cancelled);
  assert_eq!(record.results["gate"].data, json!("opened"));
  assert!(!record.results.contains_key("sum"));

  let err = manager.cancel("alice", &execution_id).await.unwrap_err();
  assert!(matches!(
    err,
    EngineError::NotRunning {
      status: RunStatus::Cancelled,
      ..
    }
  ));
}

#[tokio::test]
async fn test_runner_executes_queued_requests() {
  let manager = manager_with(&math_workflow()).await;
  let runner = WorkflowRunner::new(manager.clone());
  let sender = runner.sender();

  sender.send(RunRequest::new("alice", "wf-math")).await.unwrap();
  sender.send(RunRequest::new("alice", "wf-math")).await.unwrap();
  // Rejected requests are logged and skipped
  sender.send(RunRequest::new("mallory", "wf-math")).await.unwrap();
  drop(sender);

  runner.start(CancellationToken::new()).await.unwrap();

  let runs = manager.list("alice", "wf-math", 10).await.unwrap();
  assert_eq!(runs.len(), 2);
  assert!(runs.iter().all(|r| r.status == RunStatus::Completed));
}

#[tokio::test]
async fn test_runner_stops_on_cancel() {
  let manager = manager_with(&math_workflow()).await;
  let runner = WorkflowRunner::new(manager);
  let _sender = runner.sender();

  let cancel = CancellationToken::new();
  let handle = tokio::spawn(runner.start(cancel.clone()));
  tokio::time::sleep(Duration::from_millis(10)).await;
  cancel.cancel();

  assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_execute_once_bypasses_channel() {
  let manager = manager_with(&math_workflow()).await;
  let runner = WorkflowRunner::new(manager);

  let record = runner
    .execute_once(RunRequest::new("alice", "wf-math"), CancellationToken::new())
    .await
    .unwrap();
  assert_eq!(record.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_run_queues_request() {
  let manager = manager_with(&math_workflow()).await;
  let runner = WorkflowRunner::with_buffer_size(manager, 1);
  runner.run(RunRequest::new("alice", "wf-math")).await.unwrap();
}
