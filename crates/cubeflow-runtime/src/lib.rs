//! Cubeflow Runtime
//!
//! Executes a validated workflow one cube at a time.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Scheduler                           │
//! │  - validate, order once, cursor over the order              │
//! │  - wire upstream envelopes into inputs                      │
//! │  - decider true → LoopController → restart from the top     │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        CubeExecutor                         │
//! │  - resolve handler, check input contract                    │
//! │  - AI-backed cubes run under the TimeoutWatchdog            │
//! │  - OutputFormatter normalizes the raw result                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Runs never unwind: every failure becomes an [`ExecutionError`] on the
//! returned [`SchedulerResult`].

mod config;
mod context;
mod error;
mod events;
mod executor;
mod loop_control;
mod scheduler;
mod status;
mod watchdog;

pub use config::{DEFAULT_AI_TIMEOUT_MS, RuntimeConfig};
pub use context::{ExecutionContext, RUN_LOOP_ID};
pub use error::{ExecutionError, WatchdogError};
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, FnNotifier, NoopNotifier};
pub use executor::{CubeExecution, CubeExecutor};
pub use loop_control::{LoopController, MAX_LOOP_ITERATIONS};
pub use scheduler::{Scheduler, SchedulerResult};
pub use status::RunStatus;
pub use watchdog::{OperationStatus, TimeoutWatchdog};
