//! Built-in handlers for every [`CubeType`](cubeflow_config::CubeType).

mod decider;
mod generate;
mod loader;
mod math;
mod recognition;
mod saver;

pub use decider::{DeciderHandler, Operator};
pub use generate::{ImageHandler, TextHandler};
pub use loader::{LoaderImageHandler, LoaderJsonHandler, LoaderTextHandler};
pub use math::{MathHandler, evaluate_expression};
pub use recognition::{RecognitionHearingHandler, RecognitionSeeingHandler};
pub use saver::{SaverHandler, SaverKind};
