//! Cubeflow Workflow
//!
//! This crate provides the runtime workflow representation for cubeflow and
//! the structural checks that gate every run.
//!
//! Key differences from `cubeflow-config`:
//! - Identity and ownership are always present
//! - The declared connection set is analysed as a graph (entry points,
//!   in-degrees, cycles)
//! - A validated workflow can be ordered for sequential execution
//!
//! Loop-back is not modelled here. The declared connections must stay
//! acyclic; repeating part of a run is a scheduler decision made at runtime.

mod error;
mod graph;
mod validator;
mod workflow;

pub use cubeflow_config::{ConnectionDef as Connection, CubeDef as Cube, CubeType};
pub use error::WorkflowError;
pub use graph::Graph;
pub use validator::{ValidationReport, WorkflowValidator};
pub use workflow::Workflow;
