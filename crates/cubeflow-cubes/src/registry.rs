use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use cubeflow_config::CubeType;

use crate::handler::CubeHandler;
use crate::handlers::{
  DeciderHandler, ImageHandler, LoaderImageHandler, LoaderJsonHandler, LoaderTextHandler,
  MathHandler, RecognitionHearingHandler, RecognitionSeeingHandler, SaverHandler, SaverKind,
  TextHandler,
};
use crate::provider::AiProvider;

/// Maps each cube type to the handler that runs it.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
  handlers: HashMap<CubeType, Arc<dyn CubeHandler>>,
}

impl HandlerRegistry {
  /// A registry with no handlers.
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry with a built-in handler for every cube type.
  pub fn builtin(provider: Arc<dyn AiProvider>, output_dir: impl Into<PathBuf>) -> Self {
    let output_dir = output_dir.into();

    Self::new()
      .with_handler(CubeType::LoaderText, LoaderTextHandler)
      .with_handler(CubeType::LoaderJson, LoaderJsonHandler)
      .with_handler(CubeType::LoaderImage, LoaderImageHandler)
      .with_handler(
        CubeType::RecognitionSeeing,
        RecognitionSeeingHandler::new(provider.clone()),
      )
      .with_handler(
        CubeType::RecognitionHearing,
        RecognitionHearingHandler::new(provider.clone()),
      )
      .with_handler(CubeType::Math, MathHandler)
      .with_handler(CubeType::Decider, DeciderHandler)
      .with_handler(CubeType::Text, TextHandler::new(provider.clone()))
      .with_handler(CubeType::Image, ImageHandler::new(provider))
      .with_handler(
        CubeType::SaverText,
        SaverHandler::new(SaverKind::Text, output_dir.clone()),
      )
      .with_handler(
        CubeType::SaverImage,
        SaverHandler::new(SaverKind::Image, output_dir.clone()),
      )
      .with_handler(
        CubeType::SaverTable,
        SaverHandler::new(SaverKind::Table, output_dir.clone()),
      )
      .with_handler(
        CubeType::SaverJson,
        SaverHandler::new(SaverKind::Json, output_dir),
      )
  }

  /// Register a handler, replacing any existing one for the type.
  pub fn register(&mut self, cube_type: CubeType, handler: Arc<dyn CubeHandler>) {
    self.handlers.insert(cube_type, handler);
  }

  pub fn with_handler(mut self, cube_type: CubeType, handler: impl CubeHandler + 'static) -> Self {
    self.register(cube_type, Arc::new(handler));
    self
  }

  pub fn get(&self, cube_type: CubeType) -> Option<Arc<dyn CubeHandler>> {
    self.handlers.get(&cube_type).cloned()
  }

  pub fn contains(&self, cube_type: CubeType) -> bool {
    self.handlers.contains_key(&cube_type)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::provider::{AiProviderConfig, OpenAiCompatibleClient};

  #[test]
  fn test_builtin_covers_every_type() {
    let provider = Arc::new(OpenAiCompatibleClient::new(AiProviderConfig::default()));
    let registry = HandlerRegistry::builtin(provider, "uploads");
    for cube_type in CubeType::ALL {
      assert!(registry.contains(cube_type), "missing handler for {cube_type}");
    }
  }

  #[test]
  fn test_empty_registry() {
    let registry = HandlerRegistry::new();
    assert!(registry.get(CubeType::Math).is_none());
  }
}
