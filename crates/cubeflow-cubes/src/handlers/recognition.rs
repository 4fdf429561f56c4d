use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::HandlerError;
use crate::handler::{CubeHandler, Params, merge_params, require_text, text_param};
use crate::provider::{AiProvider, TextRequest};

const SEEING_PROMPT: &str =
  "Analyze this image and describe what you see in detail. Extract any text present.";
const HEARING_PROMPT: &str = "Transcribe this audio to text accurately.";

/// Characters of the image reference forwarded with a vision prompt.
const IMAGE_PREVIEW_CHARS: usize = 100;

/// Describes the `image` input through the AI provider.
pub struct RecognitionSeeingHandler {
  provider: Arc<dyn AiProvider>,
}

impl RecognitionSeeingHandler {
  pub fn new(provider: Arc<dyn AiProvider>) -> Self {
    Self { provider }
  }
}

#[async_trait]
impl CubeHandler for RecognitionSeeingHandler {
  async fn execute(&self, inputs: &Params, config: &Params) -> Result<Value, HandlerError> {
    let params = merge_params(inputs, config);
    let image = require_text(&params, "image")?;
    let instruction = text_param(&params, "prompt").unwrap_or_else(|| SEEING_PROMPT.to_string());

    let preview: String = image.chars().take(IMAGE_PREVIEW_CHARS).collect();
    let request =
      TextRequest::new(format!("{instruction}\n\nImage data: {preview}")).with_max_tokens(1000);

    let response = self.provider.generate_text(request).await?;
    Ok(Value::String(response.text))
  }
}

/// Transcribes the `audio` input through the AI provider.
pub struct RecognitionHearingHandler {
  provider: Arc<dyn AiProvider>,
}

impl RecognitionHearingHandler {
  pub fn new(provider: Arc<dyn AiProvider>) -> Self {
    Self { provider }
  }
}

#[async_trait]
impl CubeHandler for RecognitionHearingHandler {
  async fn execute(&self, inputs: &Params, config: &Params) -> Result<Value, HandlerError> {
    let params = merge_params(inputs, config);
    require_text(&params, "audio")?;
    let instruction = text_param(&params, "prompt").unwrap_or_else(|| HEARING_PROMPT.to_string());

    let request = TextRequest::new(format!(
      "{instruction}\n\nAudio data provided. Please transcribe."
    ))
    .with_max_tokens(2000);

    let response = self.provider.generate_text(request).await?;
    Ok(Value::String(response.text))
  }
}
