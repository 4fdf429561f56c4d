//! Cubeflow Config
//!
//! This crate contains the serializable workflow payload types for cubeflow.
//! These types represent workflows as authored by an editor, before they are
//! validated and scheduled by the runtime.
//!
//! Payloads can be loaded from:
//! - JSON files (via the CLI)
//! - A persistence sink (as JSON documents)
//!
//! Field names follow the authoring format (`sourceId`, `targetHandle`, ...),
//! so a payload produced by the editor deserializes without translation.

mod connection;
mod cube;
mod enums;
mod workflow;

pub use connection::{ConnectionDef, DEFAULT_INPUT_HANDLE};
pub use cube::{CubeDef, Position};
pub use enums::{CubeType, UnknownCubeType};
pub use workflow::WorkflowDef;
