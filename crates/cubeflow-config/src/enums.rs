use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of cube kinds the engine knows how to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CubeType {
  LoaderText,
  LoaderJson,
  LoaderImage,
  RecognitionSeeing,
  RecognitionHearing,
  Math,
  Decider,
  Text,
  Image,
  SaverText,
  SaverImage,
  SaverTable,
  SaverJson,
}

impl CubeType {
  pub const ALL: [CubeType; 13] = [
    CubeType::LoaderText,
    CubeType::LoaderJson,
    CubeType::LoaderImage,
    CubeType::RecognitionSeeing,
    CubeType::RecognitionHearing,
    CubeType::Math,
    CubeType::Decider,
    CubeType::Text,
    CubeType::Image,
    CubeType::SaverText,
    CubeType::SaverImage,
    CubeType::SaverTable,
    CubeType::SaverJson,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      CubeType::LoaderText => "loader-text",
      CubeType::LoaderJson => "loader-json",
      CubeType::LoaderImage => "loader-image",
      CubeType::RecognitionSeeing => "recognition-seeing",
      CubeType::RecognitionHearing => "recognition-hearing",
      CubeType::Math => "math",
      CubeType::Decider => "decider",
      CubeType::Text => "text",
      CubeType::Image => "image",
      CubeType::SaverText => "saver-text",
      CubeType::SaverImage => "saver-image",
      CubeType::SaverTable => "saver-table",
      CubeType::SaverJson => "saver-json",
    }
  }

  /// Whether this kind calls out to an AI provider and runs under a time budget.
  pub fn is_ai_backed(self) -> bool {
    matches!(
      self,
      CubeType::RecognitionSeeing | CubeType::RecognitionHearing | CubeType::Text | CubeType::Image
    )
  }

  /// Whether this kind produces the boolean that drives loop-back.
  pub fn is_decision(self) -> bool {
    matches!(self, CubeType::Decider)
  }
}

impl fmt::Display for CubeType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Returned when a type identifier is not part of [`CubeType`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown cube type: {0}")]
pub struct UnknownCubeType(pub String);

impl FromStr for CubeType {
  type Err = UnknownCubeType;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    CubeType::ALL
      .into_iter()
      .find(|kind| kind.as_str() == s)
      .ok_or_else(|| UnknownCubeType(s.to_string()))
  }
}
