//! Sequential run scheduling with bounded loop-back.

use std::collections::BTreeMap;

use cubeflow_cubes::Params;
use cubeflow_output::{Envelope, LogEntry, LogLevel};
use cubeflow_workflow::{Cube, Workflow, WorkflowValidator};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::context::{ExecutionContext, RUN_LOOP_ID};
use crate::error::ExecutionError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::executor::CubeExecutor;
use crate::loop_control::MAX_LOOP_ITERATIONS;
use crate::status::RunStatus;

/// Result of a complete run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerResult {
  pub success: bool,
  pub status: RunStatus,
  /// Last output envelope per cube, including partial results of a failed run.
  pub results: BTreeMap<String, Envelope>,
  pub logs: Vec<LogEntry>,
  #[serde(serialize_with = "serialize_error")]
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<ExecutionError>,
  /// Number of loop restarts performed.
  pub restarts: u32,
  /// Cube dispatches, counting repeats caused by restarts.
  pub cubes_executed: usize,
}

fn serialize_error<S: serde::Serializer>(
  error: &Option<ExecutionError>,
  serializer: S,
) -> Result<S::Ok, S::Error> {
  match error {
    Some(e) => serializer.serialize_str(&e.to_string()),
    None => serializer.serialize_none(),
  }
}

/// Runs a workflow one cube at a time.
///
/// Generic over `N: ExecutionNotifier`. Use [`Scheduler::new`] to discard
/// events or [`Scheduler::with_notifier`] to observe them.
pub struct Scheduler<N: ExecutionNotifier = NoopNotifier> {
  executor: CubeExecutor,
  notifier: N,
}

impl Scheduler<NoopNotifier> {
  pub fn new(executor: CubeExecutor) -> Self {
    Self::with_notifier(executor, NoopNotifier)
  }
}

/// Run-scoped bookkeeping shared by the step helpers.
struct Run<'a> {
  context: &'a mut ExecutionContext,
  restarts: u32,
  cubes_executed: usize,
}

impl<N: ExecutionNotifier> Scheduler<N> {
  pub fn with_notifier(executor: CubeExecutor, notifier: N) -> Self {
    Self { executor, notifier }
  }

  pub fn executor(&self) -> &CubeExecutor {
    &self.executor
  }

  /// Execute a workflow to completion.
  pub async fn execute(&self, workflow: &Workflow, context: &mut ExecutionContext) -> SchedulerResult {
    self
      .execute_with_cancel(workflow, context, &CancellationToken::new())
      .await
  }

  /// Execute a workflow, checking `cancel` before each cube.
  ///
  /// Cancellation is cooperative: a cube that is already running finishes
  /// and its output is kept.
  #[instrument(
    name = "workflow_execute",
    skip(self, workflow, context, cancel),
    fields(
      execution_id = %context.execution_id,
      workflow_id = %workflow.workflow_id,
    )
  )]
  pub async fn execute_with_cancel(
    &self,
    workflow: &Workflow,
    context: &mut ExecutionContext,
    cancel: &CancellationToken,
  ) -> SchedulerResult {
    let report = WorkflowValidator::validate(workflow);
    if !report.is_valid() {
      let error = ExecutionError::StructuralValidation {
        errors: report.messages(),
      };
      warn!(error = %error, "workflow_invalid");
      context.finish(RunStatus::Failed);
      return Self::result(
        &Run {
          context,
          restarts: 0,
          cubes_executed: 0,
        },
        Some(error),
      );
    }

    let order = WorkflowValidator::execution_order(&workflow.cubes, &workflow.connections);
    let total = order.len();

    context.status = RunStatus::Running;
    info!(total_cubes = total, "workflow_started");
    self.notifier.notify(ExecutionEvent::WorkflowStarted {
      execution_id: context.execution_id.clone(),
      workflow_id: workflow.workflow_id.clone(),
      total_cubes: total,
    });

    let mut run = Run {
      context,
      restarts: 0,
      cubes_executed: 0,
    };
    self.log(
      &mut run,
      LogEntry::system(
        format!("Starting workflow execution with {total} cubes"),
        LogLevel::Info,
      ),
    );

    let mut cursor = 0;
    while cursor < order.len() {
      if cancel.is_cancelled() {
        return self.cancelled(run);
      }

      let Some(cube) = workflow.get_cube(&order[cursor]) else {
        cursor += 1;
        continue;
      };

      match self.step(workflow, cube, &mut run, total).await {
        Ok(true) => cursor = 0,
        Ok(false) => cursor += 1,
        Err(e) => return self.failed(run, e),
      }
    }

    self.log(
      &mut run,
      LogEntry::system("Workflow execution completed successfully", LogLevel::Info),
    );
    run.context.finish(RunStatus::Completed);
    info!(
      cubes_executed = run.cubes_executed,
      restarts = run.restarts,
      "workflow_completed"
    );
    self.notifier.notify(ExecutionEvent::WorkflowCompleted {
      execution_id: run.context.execution_id.clone(),
    });

    Self::result(&run, None)
  }

  /// Run one cube. Returns whether the run should restart from the top.
  async fn step(
    &self,
    workflow: &Workflow,
    cube: &Cube,
    run: &mut Run<'_>,
    total: usize,
  ) -> Result<bool, ExecutionError> {
    let execution_id = run.context.execution_id.clone();
    let iteration = run.context.loop_iteration(RUN_LOOP_ID);
    let inputs = resolve_inputs(workflow, cube, run.context);

    self.notifier.notify(ExecutionEvent::CubeStarted {
      execution_id: execution_id.clone(),
      cube_id: cube.id.clone(),
      iteration,
    });
    self.log(
      run,
      LogEntry::new(
        &cube.id,
        &cube.name,
        format!("Executing cube (iteration {iteration})"),
        LogLevel::Info,
      ),
    );

    let execution = self.executor.execute(cube, &inputs, run.context).await;
    for entry in execution.logs {
      self.log(run, entry);
    }

    run.cubes_executed += 1;
    self.notifier.notify(ExecutionEvent::Progress {
      execution_id: execution_id.clone(),
      completed: run.cubes_executed,
      total,
    });

    let envelope = match execution.outcome {
      Ok(envelope) => envelope,
      Err(e) => {
        self.notifier.notify(ExecutionEvent::CubeFailed {
          execution_id,
          cube_id: cube.id.clone(),
          error: e.to_string(),
        });
        return Err(e);
      }
    };

    self.notifier.notify(ExecutionEvent::CubeCompleted {
      execution_id: execution_id.clone(),
      cube_id: cube.id.clone(),
      data: envelope.to_value(),
    });

    let decided_true = cube.kind().is_ok_and(|kind| kind.is_decision())
      && envelope.data.get("decision") == Some(&serde_json::Value::Bool(true));
    run.context.record_output(&cube.id, envelope);

    if !decided_true {
      return Ok(false);
    }

    let controller = run.context.loop_controller(RUN_LOOP_ID);
    if !controller.can_loop() {
      self.log(
        run,
        LogEntry::system(
          format!(
            "Decision is true but max iterations ({MAX_LOOP_ITERATIONS}) reached, continuing"
          ),
          LogLevel::Warning,
        ),
      );
      return Ok(false);
    }

    controller.increment_iteration();
    let iteration = controller.current_iteration();
    run.restarts += 1;

    info!(cube_id = %cube.id, iteration, "loop_restart");
    self.notifier.notify(ExecutionEvent::LoopRestarted {
      execution_id,
      cube_id: cube.id.clone(),
      iteration,
    });
    self.log(
      run,
      LogEntry::system(
        format!("Decision is true, starting loop iteration {iteration}"),
        LogLevel::Info,
      ),
    );

    Ok(true)
  }

  fn log(&self, run: &mut Run<'_>, entry: LogEntry) {
    run.context.append_log(entry.clone());
    self.notifier.notify(ExecutionEvent::Log {
      execution_id: run.context.execution_id.clone(),
      entry,
    });
  }

  fn failed(&self, mut run: Run<'_>, error: ExecutionError) -> SchedulerResult {
    error!(error = %error, "workflow_failed");
    self.log(
      &mut run,
      LogEntry::system(format!("Workflow execution failed: {error}"), LogLevel::Error),
    );
    run.context.finish(RunStatus::Failed);
    self.notifier.notify(ExecutionEvent::WorkflowFailed {
      execution_id: run.context.execution_id.clone(),
      error: error.to_string(),
    });
    Self::result(&run, Some(error))
  }

  fn cancelled(&self, mut run: Run<'_>) -> SchedulerResult {
    info!("workflow_cancelled");
    self.log(
      &mut run,
      LogEntry::system("Workflow execution cancelled", LogLevel::Warning),
    );
    run.context.finish(RunStatus::Cancelled);
    self.notifier.notify(ExecutionEvent::WorkflowCancelled {
      execution_id: run.context.execution_id.clone(),
    });
    Self::result(&run, Some(ExecutionError::Cancelled))
  }

  fn result(run: &Run<'_>, error: Option<ExecutionError>) -> SchedulerResult {
    SchedulerResult {
      success: error.is_none(),
      status: run.context.status,
      results: run.context.outputs().clone(),
      logs: run.context.logs().to_vec(),
      error,
      restarts: run.restarts,
      cubes_executed: run.cubes_executed,
    }
  }
}

/// Static config overridden by each incoming connection's upstream envelope,
/// keyed by the connection's target handle.
pub(crate) fn resolve_inputs(workflow: &Workflow, cube: &Cube, context: &ExecutionContext) -> Params {
  let mut inputs = cube.config.clone();
  for conn in workflow.incoming(&cube.id) {
    if let Some(envelope) = context.output(&conn.source_id) {
      inputs.insert(conn.input_key().to_string(), envelope.to_value());
    }
  }
  inputs
}
