//! Time budgets for long-running calls.
//!
//! The watchdog reports a timeout but never stops the guarded work: a call
//! that overruns its budget keeps running detached and its result is
//! discarded.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::DEFAULT_AI_TIMEOUT_MS;
use crate::error::WatchdogError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
  Running,
  Completed,
  TimedOut,
  /// The timer was cancelled. The work itself was allowed to finish.
  Cancelled,
}

struct Operation {
  generation: u64,
  status: OperationStatus,
  started_at: Instant,
  timer: CancellationToken,
}

/// Tracks guarded operations by id.
pub struct TimeoutWatchdog {
  default_budget: Duration,
  operations: Mutex<HashMap<String, Operation>>,
  next_generation: AtomicU64,
}

impl Default for TimeoutWatchdog {
  fn default() -> Self {
    Self::new(Duration::from_millis(DEFAULT_AI_TIMEOUT_MS))
  }
}

enum Race<T> {
  Finished(Result<T, tokio::task::JoinError>),
  Expired,
  TimerCancelled,
}

impl TimeoutWatchdog {
  pub fn new(default_budget: Duration) -> Self {
    Self {
      default_budget,
      operations: Mutex::new(HashMap::new()),
      next_generation: AtomicU64::new(0),
    }
  }

  pub fn default_budget(&self) -> Duration {
    self.default_budget
  }

  /// Run `work` under the default budget.
  pub async fn run<F, T>(&self, operation_id: &str, work: F) -> Result<T, WatchdogError>
  where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
  {
    self
      .run_with_budget(operation_id, self.default_budget, work)
      .await
  }

  /// Run `work`, racing it against `budget`.
  ///
  /// Starting an id that is already tracked cancels the earlier timer and
  /// replaces it. When a timer is cancelled the caller simply waits for the
  /// work to finish.
  pub async fn run_with_budget<F, T>(
    &self,
    operation_id: &str,
    budget: Duration,
    work: F,
  ) -> Result<T, WatchdogError>
  where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
  {
    let (generation, timer) = self.start(operation_id);
    let mut handle = tokio::spawn(work);

    let race = tokio::select! {
      joined = &mut handle => Race::Finished(joined),
      _ = tokio::time::sleep(budget) => Race::Expired,
      _ = timer.cancelled() => Race::TimerCancelled,
    };

    let joined = match race {
      Race::Finished(joined) => joined,
      Race::Expired => {
        self.finish(operation_id, generation, OperationStatus::TimedOut);
        let timeout_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        warn!(operation_id, timeout_ms, "operation_timed_out");
        // Dropping the handle detaches the task; it is not aborted.
        return Err(WatchdogError::TimedOut {
          operation_id: operation_id.to_string(),
          timeout_ms,
        });
      }
      Race::TimerCancelled => {
        debug!(operation_id, "operation_timer_cancelled");
        handle.await
      }
    };

    self.finish(operation_id, generation, OperationStatus::Completed);

    joined.map_err(|e| WatchdogError::Panicked {
      operation_id: operation_id.to_string(),
      message: e.to_string(),
    })
  }

  fn start(&self, operation_id: &str) -> (u64, CancellationToken) {
    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
    let timer = CancellationToken::new();
    let previous = self.lock().insert(
      operation_id.to_string(),
      Operation {
        generation,
        status: OperationStatus::Running,
        started_at: Instant::now(),
        timer: timer.clone(),
      },
    );

    if let Some(previous) = previous {
      if previous.status == OperationStatus::Running {
        debug!(operation_id, "operation_replaced");
        previous.timer.cancel();
      }
    }

    (generation, timer)
  }

  /// Record a terminal status, unless the entry was replaced or already settled.
  fn finish(&self, operation_id: &str, generation: u64, status: OperationStatus) {
    if let Some(op) = self.lock().get_mut(operation_id) {
      if op.generation == generation && op.status == OperationStatus::Running {
        op.status = status;
      }
    }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Operation>> {
    // The map holds no invariants a panic could break.
    self
      .operations
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
  }

  pub fn status(&self, operation_id: &str) -> Option<OperationStatus> {
    self.lock().get(operation_id).map(|op| op.status)
  }

  /// Time since a running operation started.
  pub fn elapsed(&self, operation_id: &str) -> Option<Duration> {
    self
      .lock()
      .get(operation_id)
      .filter(|op| op.status == OperationStatus::Running)
      .map(|op| op.started_at.elapsed())
  }

  /// Ids of operations whose timer is still armed.
  pub fn running_operations(&self) -> Vec<String> {
    let mut ids: Vec<String> = self
      .lock()
      .iter()
      .filter(|(_, op)| op.status == OperationStatus::Running)
      .map(|(id, _)| id.clone())
      .collect();
    ids.sort();
    ids
  }

  /// Cancel the timer of a running operation. Returns whether one was running.
  pub fn cancel(&self, operation_id: &str) -> bool {
    match self.lock().get_mut(operation_id) {
      Some(op) if op.status == OperationStatus::Running => {
        op.status = OperationStatus::Cancelled;
        op.timer.cancel();
        true
      }
      _ => false,
    }
  }

  /// Cancel every running timer. Returns how many were cancelled.
  pub fn cancel_all(&self) -> usize {
    let mut operations = self.lock();
    let mut cancelled = 0;
    for op in operations.values_mut() {
      if op.status == OperationStatus::Running {
        op.status = OperationStatus::Cancelled;
        op.timer.cancel();
        cancelled += 1;
      }
    }
    cancelled
  }

  /// Forget operations that are no longer running.
  pub fn clear_finished(&self) {
    self
      .lock()
      .retain(|_, op| op.status == OperationStatus::Running);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::sync::atomic::AtomicBool;

  #[tokio::test(start_paused = true)]
  async fn test_completes_within_budget() {
    let watchdog = TimeoutWatchdog::default();
    let value = watchdog
      .run_with_budget("op", Duration::from_secs(5), async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        42
      })
      .await
      .unwrap();

    assert_eq!(value, 42);
    assert_eq!(watchdog.status("op"), Some(OperationStatus::Completed));
    assert!(watchdog.running_operations().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_timeout_leaves_work_running() {
    let watchdog = TimeoutWatchdog::default();
    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();

    let err = watchdog
      .run_with_budget("slow", Duration::from_secs(1), async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        flag.store(true, Ordering::SeqCst);
      })
      .await
      .unwrap_err();

    assert_eq!(
      err,
      WatchdogError::TimedOut {
        operation_id: "slow".to_string(),
        timeout_ms: 1000
      }
    );
    assert_eq!(watchdog.status("slow"), Some(OperationStatus::TimedOut));
    assert!(!finished.load(Ordering::SeqCst));

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(finished.load(Ordering::SeqCst));
  }

  #[tokio::test(start_paused = true)]
  async fn test_restart_replaces_prior_timer() {
    let watchdog = Arc::new(TimeoutWatchdog::default());

    let first = {
      let watchdog = watchdog.clone();
      tokio::spawn(async move {
        watchdog
          .run_with_budget("same", Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            "first"
          })
          .await
      })
    };
    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = watchdog
      .run_with_budget("same", Duration::from_secs(10), async { "second" })
      .await
      .unwrap();
    assert_eq!(second, "second");

    // The first call lost its timer and waits for its work instead of timing out.
    assert_eq!(first.await.unwrap().unwrap(), "first");
    assert_eq!(watchdog.status("same"), Some(OperationStatus::Completed));
  }

  #[tokio::test(start_paused = true)]
  async fn test_cancel_disarms_timer() {
    let watchdog = Arc::new(TimeoutWatchdog::default());

    let guarded = {
      let watchdog = watchdog.clone();
      tokio::spawn(async move {
        watchdog
          .run_with_budget("op", Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            7
          })
          .await
      })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(watchdog.running_operations(), vec!["op".to_string()]);
    assert!(watchdog.cancel("op"));
    assert!(!watchdog.cancel("op"));

    assert_eq!(guarded.await.unwrap().unwrap(), 7);
    assert_eq!(watchdog.status("op"), Some(OperationStatus::Cancelled));

    watchdog.clear_finished();
    assert_eq!(watchdog.status("op"), None);
  }

  #[tokio::test]
  async fn test_panic_is_reported() {
    let watchdog = TimeoutWatchdog::default();
    let err = watchdog
      .run("boom", async {
        if true {
          panic!("handler exploded");
        }
      })
      .await
      .unwrap_err();
    assert!(matches!(err, WatchdogError::Panicked { .. }));
  }

  #[test]
  fn test_cancel_all_on_idle_watchdog() {
    let watchdog = TimeoutWatchdog::default();
    assert_eq!(watchdog.cancel_all(), 0);
  }
}
