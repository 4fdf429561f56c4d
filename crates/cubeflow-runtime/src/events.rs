//! Execution events and notifiers.
//!
//! The scheduler emits an event at every step of a run. Consumers decide what
//! to do with them: persist logs, stream progress to a UI, or ignore them.

use cubeflow_output::LogEntry;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
  WorkflowStarted {
    execution_id: String,
    workflow_id: String,
    total_cubes: usize,
  },

  CubeStarted {
    execution_id: String,
    cube_id: String,
    iteration: u32,
  },

  /// `data` is the serialized output envelope.
  CubeCompleted {
    execution_id: String,
    cube_id: String,
    data: serde_json::Value,
  },

  CubeFailed {
    execution_id: String,
    cube_id: String,
    error: String,
  },

  /// A log entry was appended to the run.
  Log {
    execution_id: String,
    entry: LogEntry,
  },

  /// Emitted after every cube. `completed` keeps counting across loop
  /// restarts, so it can exceed `total`.
  Progress {
    execution_id: String,
    completed: usize,
    total: usize,
  },

  LoopRestarted {
    execution_id: String,
    cube_id: String,
    iteration: u32,
  },

  WorkflowCompleted { execution_id: String },

  WorkflowFailed { execution_id: String, error: String },

  WorkflowCancelled { execution_id: String },
}

impl ExecutionEvent {
  /// Progress as a percentage. `None` for every other event.
  pub fn progress_percent(&self) -> Option<f64> {
    match self {
      ExecutionEvent::Progress {
        completed, total, ..
      } if *total > 0 => Some(*completed as f64 / *total as f64 * 100.0),
      _ => None,
    }
  }
}

/// Receives execution events.
///
/// Called inline by the scheduler; implementations must not block.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Forwards events to an unbounded channel.
///
/// Unbounded so a slow consumer never stalls a run; volume is a handful of
/// events per cube.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

/// Calls a closure for every event.
pub struct FnNotifier<F>(F);

impl<F> FnNotifier<F>
where
  F: Fn(ExecutionEvent) + Send + Sync,
{
  pub fn new(f: F) -> Self {
    Self(f)
  }
}

impl<F> ExecutionNotifier for FnNotifier<F>
where
  F: Fn(ExecutionEvent) + Send + Sync,
{
  fn notify(&self, event: ExecutionEvent) {
    (self.0)(event)
  }
}

impl<N: ExecutionNotifier + ?Sized> ExecutionNotifier for std::sync::Arc<N> {
  fn notify(&self, event: ExecutionEvent) {
    (**self).notify(event)
  }
}
