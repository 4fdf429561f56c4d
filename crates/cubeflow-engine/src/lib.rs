//! Cubeflow Engine
//!
//! Ties the scheduler to persistence: loads workflows, records runs, streams
//! their logs to the store, and supports cancellation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkflowRunner                         │
//! │  - owns mpsc channel of RunRequest                          │
//! │  - start(cancel) executes requests one at a time            │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ExecutionManager                         │
//! │  - start / run / cancel / get / list                        │
//! │  - forwards log events to the PersistenceSink               │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Scheduler                            │
//! │  - validation, ordering, loop-back, per-cube dispatch       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let manager = ExecutionManager::new(Arc::new(MemoryStore::new()), executor);
//! let execution_id = manager.start("user-1", "wf-1").await?;
//! let record = manager.get("user-1", &execution_id).await?;
//! ```

mod error;
mod manager;
mod runner;

pub use error::EngineError;
pub use manager::ExecutionManager;
pub use runner::{RunRequest, WorkflowRunner};
