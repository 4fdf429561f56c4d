//! Cubeflow Output
//!
//! Every cube result is normalized into an [`Envelope`] before it is stored
//! in the run context or handed to a downstream cube. This crate owns that
//! envelope, the closed set of semantic [`DataType`]s an envelope can carry,
//! and the [`LogEntry`] records a run accumulates.

mod data_type;
mod envelope;
mod log;

pub use data_type::{DataType, DataTypeError, TypedValue, detect_type, is_compatible, validate};
pub use envelope::{Envelope, OutputFormatter, number_value};
pub use log::{LogEntry, LogLevel, SYSTEM_CUBE_ID, SYSTEM_CUBE_NAME};
