//! Workflow runner with channel-based triggering.
//!
//! The `WorkflowRunner` owns an mpsc channel of run requests and drives each
//! one through an [`ExecutionManager`].

use cubeflow_store::ExecutionRecord;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::EngineError;
use crate::manager::ExecutionManager;

/// Ask for one run of a stored workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
  pub owner_id: String,
  pub workflow_id: String,
}

impl RunRequest {
  pub fn new(owner_id: impl Into<String>, workflow_id: impl Into<String>) -> Self {
    Self {
      owner_id: owner_id.into(),
      workflow_id: workflow_id.into(),
    }
  }
}

/// Executes run requests one at a time, in arrival order.
///
/// # Usage
///
/// ```ignore
/// let runner = WorkflowRunner::new(manager);
/// let sender = runner.sender();
///
/// let cancel = CancellationToken::new();
/// tokio::spawn(runner.start(cancel.clone()));
/// sender.send(RunRequest::new("user-1", "wf-1")).await?;
/// ```
pub struct WorkflowRunner {
  sender: mpsc::Sender<RunRequest>,
  receiver: mpsc::Receiver<RunRequest>,
  manager: ExecutionManager,
}

impl WorkflowRunner {
  pub fn new(manager: ExecutionManager) -> Self {
    Self::with_buffer_size(manager, 100)
  }

  pub fn with_buffer_size(manager: ExecutionManager, buffer_size: usize) -> Self {
    let (sender, receiver) = mpsc::channel(buffer_size);
    Self {
      sender,
      receiver,
      manager,
    }
  }

  /// A sender handle for queueing runs.
  pub fn sender(&self) -> mpsc::Sender<RunRequest> {
    self.sender.clone()
  }

  /// Queue a run.
  pub async fn run(&self, request: RunRequest) -> Result<(), EngineError> {
    self
      .sender
      .send(request)
      .await
      .map_err(|_| EngineError::RunnerClosed)
  }

  /// Start the execution loop.
  ///
  /// Returns once `cancel` trips or every sender is dropped. Cancelling also
  /// stops the run in progress before its next cube.
  pub async fn start(mut self, cancel: CancellationToken) -> Result<(), EngineError> {
    info!("workflow_runner_started");
    // Only external senders keep the loop alive
    drop(self.sender);

    loop {
      tokio::select! {
          _ = cancel.cancelled() => {
              info!("workflow_runner_cancelled");
              break;
          }
          request = self.receiver.recv() => {
              let Some(request) = request else {
                  info!("workflow_runner_channel_closed");
                  break;
              };
              Self::handle(&self.manager, request, cancel.child_token()).await;
          }
      }
    }

    Ok(())
  }

  /// Drive a single request inline, bypassing the channel.
  pub async fn execute_once(
    &self,
    request: RunRequest,
    cancel: CancellationToken,
  ) -> Result<ExecutionRecord, EngineError> {
    self
      .manager
      .run_with_cancel(&request.owner_id, &request.workflow_id, cancel)
      .await
  }

  pub fn manager(&self) -> &ExecutionManager {
    &self.manager
  }

  async fn handle(manager: &ExecutionManager, request: RunRequest, cancel: CancellationToken) {
    match manager
      .run_with_cancel(&request.owner_id, &request.workflow_id, cancel)
      .await
    {
      Ok(record) => info!(
        workflow_id = %request.workflow_id,
        execution_id = %record.execution_id,
        status = %record.status,
        "workflow_run_finished"
      ),
      Err(e) => error!(
        workflow_id = %request.workflow_id,
        error = %e,
        "workflow_run_rejected"
      ),
    }
  }
}
