use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use cubeflow_output::{Envelope, LogEntry};
use cubeflow_runtime::RunStatus;
use serde::{Deserialize, Serialize};

/// A run as stored, and as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
  pub execution_id: String,
  pub workflow_id: String,
  pub owner_id: String,
  pub status: RunStatus,
  pub start_time: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub end_time: Option<DateTime<Utc>>,
  #[serde(default)]
  pub results: BTreeMap<String, Envelope>,
  #[serde(default)]
  pub logs: Vec<LogEntry>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl ExecutionRecord {
  /// A fresh `running` record with no results or logs.
  pub fn running(
    execution_id: impl Into<String>,
    workflow_id: impl Into<String>,
    owner_id: impl Into<String>,
  ) -> Self {
    Self {
      execution_id: execution_id.into(),
      workflow_id: workflow_id.into(),
      owner_id: owner_id.into(),
      status: RunStatus::Running,
      start_time: Utc::now(),
      end_time: None,
      results: BTreeMap::new(),
      logs: Vec::new(),
      error: None,
    }
  }

  /// Apply an update in place.
  pub fn apply(&mut self, update: ExecutionUpdate) {
    self.status = update.status;
    if update.end_time.is_some() {
      self.end_time = update.end_time;
    }
    if let Some(results) = update.results {
      self.results = results;
    }
    if update.error.is_some() {
      self.error = update.error;
    }
  }
}

/// Partial update of a run record. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionUpdate {
  pub status: RunStatus,
  pub end_time: Option<DateTime<Utc>>,
  pub results: Option<BTreeMap<String, Envelope>>,
  pub error: Option<String>,
}

impl ExecutionUpdate {
  pub fn status(status: RunStatus) -> Self {
    Self {
      status,
      end_time: None,
      results: None,
      error: None,
    }
  }

  /// A terminal update stamped with the current time.
  pub fn finished(
    status: RunStatus,
    results: BTreeMap<String, Envelope>,
    error: Option<String>,
  ) -> Self {
    Self {
      status,
      end_time: Some(Utc::now()),
      results: Some(results),
      error,
    }
  }
}
