//! Static input contracts and declared output types per cube type.

use cubeflow_config::CubeType;
use cubeflow_output::{DataType, Envelope};

use crate::handler::Params;

/// Input keys that must be present and non-null before a handler runs.
pub fn required_inputs(cube_type: CubeType) -> &'static [&'static str] {
  match cube_type {
    CubeType::LoaderText | CubeType::LoaderJson | CubeType::LoaderImage => &[],
    CubeType::RecognitionSeeing => &["image"],
    CubeType::RecognitionHearing => &["audio"],
    CubeType::Math => &["expression"],
    CubeType::Decider => &["value1", "operator", "value2"],
    CubeType::Text | CubeType::Image => &["prompt"],
    CubeType::SaverText => &["content"],
    CubeType::SaverImage => &["imageData"],
    CubeType::SaverTable | CubeType::SaverJson => &["data"],
  }
}

/// The semantic type a cube type's output is declared as.
pub fn output_type(cube_type: CubeType) -> DataType {
  match cube_type {
    CubeType::LoaderText => DataType::Text,
    CubeType::LoaderJson => DataType::Json,
    CubeType::LoaderImage => DataType::Image,
    CubeType::RecognitionSeeing | CubeType::RecognitionHearing => DataType::Text,
    CubeType::Math => DataType::Number,
    CubeType::Decider => DataType::Json,
    CubeType::Text => DataType::Text,
    CubeType::Image => DataType::Image,
    CubeType::SaverText | CubeType::SaverImage | CubeType::SaverTable | CubeType::SaverJson => {
      DataType::Json
    }
  }
}

/// Required keys that are absent or null in `inputs`, in contract order.
///
/// An upstream envelope whose `data` is null counts as missing.
pub fn missing_inputs(cube_type: CubeType, inputs: &Params) -> Vec<&'static str> {
  required_inputs(cube_type)
    .iter()
    .copied()
    .filter(|key| {
      inputs
        .get(*key)
        .is_none_or(|value| Envelope::payload(value).is_null())
    })
    .collect()
}
