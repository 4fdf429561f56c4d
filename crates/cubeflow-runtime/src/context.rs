use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use cubeflow_output::{Envelope, LogEntry};

use crate::loop_control::LoopController;
use crate::status::RunStatus;

/// Loop identifier the scheduler uses for whole-run restarts.
pub const RUN_LOOP_ID: &str = "run";

/// Mutable state of a single run.
///
/// Outputs are overwritten per cube and never cleared mid-run, including
/// across loop restarts. Logs are append-only.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
  pub workflow_id: String,
  pub execution_id: String,
  pub owner_id: String,
  pub status: RunStatus,
  pub started_at: DateTime<Utc>,
  pub finished_at: Option<DateTime<Utc>>,
  outputs: BTreeMap<String, Envelope>,
  logs: Vec<LogEntry>,
  loops: HashMap<String, LoopController>,
}

impl ExecutionContext {
  pub fn new(
    workflow_id: impl Into<String>,
    execution_id: impl Into<String>,
    owner_id: impl Into<String>,
  ) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      execution_id: execution_id.into(),
      owner_id: owner_id.into(),
      status: RunStatus::Pending,
      started_at: Utc::now(),
      finished_at: None,
      outputs: BTreeMap::new(),
      logs: Vec::new(),
      loops: HashMap::new(),
    }
  }

  pub fn output(&self, cube_id: &str) -> Option<&Envelope> {
    self.outputs.get(cube_id)
  }

  pub fn outputs(&self) -> &BTreeMap<String, Envelope> {
    &self.outputs
  }

  pub(crate) fn record_output(&mut self, cube_id: impl Into<String>, envelope: Envelope) {
    self.outputs.insert(cube_id.into(), envelope);
  }

  pub fn logs(&self) -> &[LogEntry] {
    &self.logs
  }

  pub(crate) fn append_log(&mut self, entry: LogEntry) {
    self.logs.push(entry);
  }

  /// The named loop counter, created on first use.
  pub fn loop_controller(&mut self, loop_id: &str) -> &mut LoopController {
    self.loops.entry(loop_id.to_string()).or_default()
  }

  /// Current iteration of a named loop; zero if it never ran.
  pub fn loop_iteration(&self, loop_id: &str) -> u32 {
    self
      .loops
      .get(loop_id)
      .map(LoopController::current_iteration)
      .unwrap_or(0)
  }

  pub(crate) fn finish(&mut self, status: RunStatus) {
    self.status = status;
    self.finished_at = Some(Utc::now());
  }
}
