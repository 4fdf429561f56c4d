//! Cubeflow Cubes
//!
//! The work each cube type performs. A [`HandlerRegistry`] maps the closed
//! set of [`CubeType`]s to [`CubeHandler`] implementations; the runtime looks
//! a handler up, checks the type's input contract, and awaits it.
//!
//! AI-backed handlers reach the outside world only through the
//! [`AiProvider`] trait. [`OpenAiCompatibleClient`] talks to any
//! OpenAI-compatible HTTP endpoint (OpenRouter by default).

mod contract;
mod error;
mod handler;
pub mod handlers;
mod provider;
mod registry;

pub use contract::{missing_inputs, output_type, required_inputs};
pub use cubeflow_config::CubeType;
pub use error::HandlerError;
pub use handler::{CubeHandler, Params, merge_params};
pub use provider::{
  AiProvider, AiProviderConfig, ImageRequest, ImageResponse, OpenAiCompatibleClient, ProviderError,
  TextRequest, TextResponse, Usage,
};
pub use registry::HandlerRegistry;
