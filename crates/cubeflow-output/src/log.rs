//! Execution log records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cube id used for entries emitted by the scheduler itself.
pub const SYSTEM_CUBE_ID: &str = "system";
pub const SYSTEM_CUBE_NAME: &str = "System";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
  Info,
  Warning,
  Error,
}

/// One line of a run's append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
  pub timestamp: DateTime<Utc>,
  pub cube_id: String,
  pub cube_name: String,
  pub message: String,
  pub level: LogLevel,
}

impl LogEntry {
  pub fn new(
    cube_id: impl Into<String>,
    cube_name: impl Into<String>,
    message: impl Into<String>,
    level: LogLevel,
  ) -> Self {
    Self {
      timestamp: Utc::now(),
      cube_id: cube_id.into(),
      cube_name: cube_name.into(),
      message: message.into(),
      level,
    }
  }

  pub fn system(message: impl Into<String>, level: LogLevel) -> Self {
    Self::new(SYSTEM_CUBE_ID, SYSTEM_CUBE_NAME, message, level)
  }

  pub fn is_system(&self) -> bool {
    self.cube_id == SYSTEM_CUBE_ID
  }
}
