use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Budget applied to AI-backed cubes when nothing else is configured.
pub const DEFAULT_AI_TIMEOUT_MS: u64 = 60_000;

/// Runtime settings shared by every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
  /// Time budget for AI-backed cubes, in milliseconds.
  pub ai_timeout_ms: u64,
  /// Root directory saver cubes write under.
  pub output_dir: PathBuf,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      ai_timeout_ms: DEFAULT_AI_TIMEOUT_MS,
      output_dir: PathBuf::from("./uploads"),
    }
  }
}

impl RuntimeConfig {
  pub fn ai_timeout(&self) -> Duration {
    Duration::from_millis(self.ai_timeout_ms)
  }
}
