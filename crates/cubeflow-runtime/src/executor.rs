//! Single-cube dispatch.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use cubeflow_cubes::{HandlerRegistry, Params, missing_inputs, output_type};
use cubeflow_output::{Envelope, LogEntry, LogLevel, OutputFormatter, validate};
use cubeflow_workflow::Cube;
use futures::FutureExt;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::config::RuntimeConfig;
use crate::context::ExecutionContext;
use crate::error::{ExecutionError, WatchdogError};
use crate::watchdog::TimeoutWatchdog;

/// Outcome of one cube dispatch, with the log lines it produced.
#[derive(Debug, Clone)]
pub struct CubeExecution {
  pub outcome: Result<Envelope, ExecutionError>,
  pub logs: Vec<LogEntry>,
}

impl CubeExecution {
  pub fn is_success(&self) -> bool {
    self.outcome.is_ok()
  }

  pub fn output(&self) -> Option<&Envelope> {
    self.outcome.as_ref().ok()
  }

  pub fn error(&self) -> Option<&ExecutionError> {
    self.outcome.as_ref().err()
  }
}

/// Resolves, checks, and runs the handler for a cube.
///
/// Cloning shares the handler table and the watchdog.
#[derive(Clone)]
pub struct CubeExecutor {
  registry: HandlerRegistry,
  watchdog: Arc<TimeoutWatchdog>,
  config: RuntimeConfig,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  payload
    .downcast_ref::<&str>()
    .map(|s| s.to_string())
    .or_else(|| payload.downcast_ref::<String>().cloned())
    .unwrap_or_else(|| "unknown panic".to_string())
}

impl CubeExecutor {
  pub fn new(registry: HandlerRegistry, config: RuntimeConfig) -> Self {
    let watchdog = Arc::new(TimeoutWatchdog::new(config.ai_timeout()));
    Self::with_watchdog(registry, config, watchdog)
  }

  /// Share a watchdog across executors.
  pub fn with_watchdog(
    registry: HandlerRegistry,
    config: RuntimeConfig,
    watchdog: Arc<TimeoutWatchdog>,
  ) -> Self {
    Self {
      registry,
      watchdog,
      config,
    }
  }

  pub fn watchdog(&self) -> &Arc<TimeoutWatchdog> {
    &self.watchdog
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  /// Execute one cube against already-resolved inputs.
  ///
  /// Never panics and never returns early without logs: every failure is
  /// reported through [`CubeExecution::outcome`].
  #[instrument(
    name = "cube_execute",
    skip(self, cube, inputs, context),
    fields(
      execution_id = %context.execution_id,
      cube_id = %cube.id,
      cube_type = %cube.cube_type,
    )
  )]
  pub async fn execute(
    &self,
    cube: &Cube,
    inputs: &Params,
    context: &ExecutionContext,
  ) -> CubeExecution {
    let mut logs = vec![LogEntry::new(
      &cube.id,
      &cube.name,
      format!("Starting execution of cube: {} ({})", cube.name, cube.cube_type),
      LogLevel::Info,
    )];

    info!("cube_started");
    let outcome = self.execute_inner(cube, inputs, context).await;

    match &outcome {
      Ok(envelope) => {
        info!(output_type = %envelope.data_type, "cube_completed");
        logs.push(LogEntry::new(
          &cube.id,
          &cube.name,
          "Cube execution completed successfully",
          LogLevel::Info,
        ));
      }
      Err(e) => {
        error!(error = %e, "cube_failed");
        logs.push(LogEntry::new(
          &cube.id,
          &cube.name,
          format!("Cube execution failed: {e}"),
          LogLevel::Error,
        ));
      }
    }

    CubeExecution { outcome, logs }
  }

  async fn execute_inner(
    &self,
    cube: &Cube,
    inputs: &Params,
    context: &ExecutionContext,
  ) -> Result<Envelope, ExecutionError> {
    let unknown = || ExecutionError::UnknownCubeType {
      cube_id: cube.id.clone(),
      cube_type: cube.cube_type.clone(),
    };
    let kind = cube.kind().map_err(|_| unknown())?;
    let handler = self.registry.get(kind).ok_or_else(unknown)?;

    let missing = missing_inputs(kind, inputs);
    if !missing.is_empty() {
      return Err(ExecutionError::InputContract {
        cube_id: cube.id.clone(),
        missing: missing.into_iter().map(String::from).collect(),
      });
    }

    let started = std::time::Instant::now();
    let raw = if kind.is_ai_backed() {
      let operation_id = format!("{}:{}", context.execution_id, cube.id);
      let inputs = inputs.clone();
      let config = cube.config.clone();
      let work = async move { handler.execute(&inputs, &config).await };

      match self.watchdog.run(&operation_id, work).await {
        Ok(result) => result,
        Err(WatchdogError::TimedOut { timeout_ms, .. }) => {
          return Err(ExecutionError::Timeout {
            cube_id: cube.id.clone(),
            timeout_ms,
          });
        }
        Err(WatchdogError::Panicked { message, .. }) => {
          return Err(ExecutionError::HandlerExecution {
            cube_id: cube.id.clone(),
            message: format!("handler panicked: {message}"),
          });
        }
      }
    } else {
      AssertUnwindSafe(handler.execute(inputs, &cube.config))
        .catch_unwind()
        .await
        .map_err(|payload| ExecutionError::HandlerExecution {
          cube_id: cube.id.clone(),
          message: format!("handler panicked: {}", panic_message(payload.as_ref())),
        })?
    };

    let raw = raw.map_err(|e| ExecutionError::HandlerExecution {
      cube_id: cube.id.clone(),
      message: e.to_string(),
    })?;

    let data_type = output_type(kind);
    if let Err(e) = validate(&raw, data_type) {
      warn!(error = %e, "cube_output_type_mismatch");
    }

    let mut metadata = serde_json::Map::new();
    metadata.insert("cubeType".to_string(), json!(kind.as_str()));
    metadata.insert(
      "executionTimeMs".to_string(),
      json!(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)),
    );

    Ok(OutputFormatter::format_with_metadata(
      raw,
      data_type,
      Some(metadata),
    ))
  }
}
