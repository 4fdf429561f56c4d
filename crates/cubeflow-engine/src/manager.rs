//! Run lifecycle on top of a [`PersistenceSink`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use cubeflow_runtime::{
  ChannelNotifier, CubeExecutor, ExecutionContext, ExecutionEvent, ExecutionNotifier,
  NoopNotifier, RunStatus, Scheduler, SchedulerResult,
};
use cubeflow_store::{ExecutionRecord, ExecutionUpdate, PersistenceSink, StoreError};
use cubeflow_workflow::Workflow;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::EngineError;

/// A run that has a record in the store and is ready to be driven.
struct PreparedRun {
  workflow: Workflow,
  context: ExecutionContext,
  cancel: CancellationToken,
}

/// Starts, tracks, and cancels workflow runs.
///
/// Cloning is cheap; clones share the store, the executor, and the table of
/// active runs.
#[derive(Clone)]
pub struct ExecutionManager {
  sink: Arc<dyn PersistenceSink>,
  executor: CubeExecutor,
  observer: Arc<dyn ExecutionNotifier>,
  active: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl ExecutionManager {
  pub fn new(sink: Arc<dyn PersistenceSink>, executor: CubeExecutor) -> Self {
    Self::with_observer(sink, executor, Arc::new(NoopNotifier))
  }

  /// Also forward every execution event to `observer`.
  pub fn with_observer(
    sink: Arc<dyn PersistenceSink>,
    executor: CubeExecutor,
    observer: Arc<dyn ExecutionNotifier>,
  ) -> Self {
    Self {
      sink,
      executor,
      observer,
      active: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  pub fn sink(&self) -> &Arc<dyn PersistenceSink> {
    &self.sink
  }

  /// Create a run record, spawn the run, and return its execution id.
  pub async fn start(&self, owner_id: &str, workflow_id: &str) -> Result<String, EngineError> {
    let prepared = self
      .prepare(owner_id, workflow_id, CancellationToken::new())
      .await?;
    let execution_id = prepared.context.execution_id.clone();

    let manager = self.clone();
    tokio::spawn(async move {
      manager.drive(prepared).await;
    });

    Ok(execution_id)
  }

  /// Run a workflow and wait for its final record.
  pub async fn run(&self, owner_id: &str, workflow_id: &str) -> Result<ExecutionRecord, EngineError> {
    self
      .run_with_cancel(owner_id, workflow_id, CancellationToken::new())
      .await
  }

  /// Like [`ExecutionManager::run`], stopping between cubes once `cancel` trips.
  pub async fn run_with_cancel(
    &self,
    owner_id: &str,
    workflow_id: &str,
    cancel: CancellationToken,
  ) -> Result<ExecutionRecord, EngineError> {
    let prepared = self.prepare(owner_id, workflow_id, cancel).await?;
    Ok(self.drive(prepared).await)
  }

  /// Cancel a running execution owned by `owner_id`.
  ///
  /// The cube in flight finishes; no further cube is dispatched.
  pub async fn cancel(&self, owner_id: &str, execution_id: &str) -> Result<(), EngineError> {
    let record = self.get(owner_id, execution_id).await?;
    let token = self.lock_active().get(execution_id).cloned();
    let Some(token) = token.filter(|_| record.status == RunStatus::Running) else {
      return Err(EngineError::NotRunning {
        execution_id: execution_id.to_string(),
        status: record.status,
      });
    };

    token.cancel();
    info!(execution_id = %execution_id, "execution_cancel_requested");

    if let Err(e) = self
      .sink
      .update_execution(execution_id, ExecutionUpdate::status(RunStatus::Cancelled))
      .await
    {
      warn!(execution_id = %execution_id, error = %e, "execution_update_failed");
    }
    Ok(())
  }

  /// Fetch a run owned by `owner_id`.
  pub async fn get(&self, owner_id: &str, execution_id: &str) -> Result<ExecutionRecord, EngineError> {
    let not_found = || EngineError::ExecutionNotFound {
      execution_id: execution_id.to_string(),
    };
    let record = match self.sink.get_execution(execution_id).await {
      Ok(record) => record,
      Err(StoreError::NotFound(_)) => return Err(not_found()),
      Err(e) => return Err(e.into()),
    };
    if record.owner_id != owner_id {
      return Err(not_found());
    }
    Ok(record)
  }

  /// Most recent runs of a workflow owned by `owner_id`, at most `limit`.
  pub async fn list(
    &self,
    owner_id: &str,
    workflow_id: &str,
    limit: usize,
  ) -> Result<Vec<ExecutionRecord>, EngineError> {
    self.load_workflow(owner_id, workflow_id).await?;
    let mut records = self.sink.list_executions(workflow_id).await?;
    records.truncate(limit);
    Ok(records)
  }

  /// Whether a run is still being driven by this manager.
  pub fn is_active(&self, execution_id: &str) -> bool {
    self.lock_active().contains_key(execution_id)
  }

  fn lock_active(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
    self.active.lock().unwrap_or_else(|e| e.into_inner())
  }

  async fn load_workflow(&self, owner_id: &str, workflow_id: &str) -> Result<Workflow, EngineError> {
    let not_found = || EngineError::WorkflowNotFound {
      workflow_id: workflow_id.to_string(),
    };
    let workflow = match self.sink.get_workflow(workflow_id).await {
      Ok(workflow) => workflow,
      Err(StoreError::NotFound(_)) => return Err(not_found()),
      Err(e) => return Err(e.into()),
    };
    if workflow.owner_id != owner_id {
      return Err(not_found());
    }
    Ok(workflow)
  }

  async fn prepare(
    &self,
    owner_id: &str,
    workflow_id: &str,
    cancel: CancellationToken,
  ) -> Result<PreparedRun, EngineError> {
    let workflow = self.load_workflow(owner_id, workflow_id).await?;
    let execution_id = Uuid::new_v4().to_string();
    let context = ExecutionContext::new(&workflow.workflow_id, &execution_id, owner_id);

    let mut record = ExecutionRecord::running(&execution_id, &workflow.workflow_id, owner_id);
    record.start_time = context.started_at;
    self.sink.create_execution(&record).await?;

    self.lock_active().insert(execution_id, cancel.clone());
    Ok(PreparedRun {
      workflow,
      context,
      cancel,
    })
  }

  #[instrument(
    name = "execution_drive",
    skip(self, run),
    fields(
      execution_id = %run.context.execution_id,
      workflow_id = %run.workflow.workflow_id,
    )
  )]
  async fn drive(&self, run: PreparedRun) -> ExecutionRecord {
    let PreparedRun {
      workflow,
      mut context,
      cancel,
    } = run;
    let execution_id = context.execution_id.clone();

    let (sender, receiver) = mpsc::unbounded_channel();
    let forwarder = tokio::spawn(forward_events(
      self.sink.clone(),
      self.observer.clone(),
      execution_id.clone(),
      receiver,
    ));

    let scheduler = Scheduler::with_notifier(self.executor.clone(), ChannelNotifier::new(sender));
    let result = scheduler
      .execute_with_cancel(&workflow, &mut context, &cancel)
      .await;
    // Closes the channel so the forwarder drains and exits
    drop(scheduler);
    if let Err(e) = forwarder.await {
      warn!(error = %e, "event_forwarder_failed");
    }

    self.lock_active().remove(&execution_id);
    self.executor.watchdog().clear_finished();

    let record = final_record(&context, result);
    let update = ExecutionUpdate {
      status: record.status,
      end_time: record.end_time,
      results: Some(record.results.clone()),
      error: record.error.clone(),
    };
    if let Err(e) = self.sink.update_execution(&execution_id, update).await {
      warn!(error = %e, "execution_update_failed");
    }

    info!(status = %record.status, "execution_finished");
    record
  }
}

/// Persist log entries in order and pass every event to the observer.
async fn forward_events(
  sink: Arc<dyn PersistenceSink>,
  observer: Arc<dyn ExecutionNotifier>,
  execution_id: String,
  mut receiver: mpsc::UnboundedReceiver<ExecutionEvent>,
) {
  while let Some(event) = receiver.recv().await {
    if let ExecutionEvent::Log { entry, .. } = &event {
      if let Err(e) = sink.append_log(&execution_id, entry).await {
        warn!(execution_id = %execution_id, error = %e, "log_append_failed");
      }
    }
    observer.notify(event);
  }
}

fn final_record(context: &ExecutionContext, result: SchedulerResult) -> ExecutionRecord {
  ExecutionRecord {
    execution_id: context.execution_id.clone(),
    workflow_id: context.workflow_id.clone(),
    owner_id: context.owner_id.clone(),
    status: result.status,
    start_time: context.started_at,
    end_time: context.finished_at,
    results: result.results,
    logs: result.logs,
    error: result.error.map(|e| e.to_string()),
  }
}
