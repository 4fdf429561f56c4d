use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::HandlerError;
use crate::handler::{
  CubeHandler, Params, coerce_number, display_value, merge_params, param, require_text, text_param,
};
use crate::provider::{AiProvider, ImageRequest, TextRequest};

/// Generates text from `prompt`, optionally grounded by `context`.
pub struct TextHandler {
  provider: Arc<dyn AiProvider>,
}

impl TextHandler {
  pub fn new(provider: Arc<dyn AiProvider>) -> Self {
    Self { provider }
  }
}

/// Build the provider request for a text cube.
fn text_request(params: &Params) -> Result<TextRequest, HandlerError> {
  let prompt = require_text(params, "prompt")?;

  let mut request = TextRequest::new(match param(params, "context") {
    Some(context) => format!("Context: {}\n\n{prompt}", display_value(context)),
    None => prompt,
  });
  request.system_prompt = text_param(params, "systemPrompt");
  request.model = text_param(params, "model");

  if let Some(value) = param(params, "maxTokens") {
    let max_tokens = coerce_number(value);
    if !(max_tokens.is_finite() && max_tokens >= 1.0) {
      return Err(HandlerError::invalid("maxTokens", "must be a positive number"));
    }
    request.max_tokens = max_tokens as u32;
  }
  if let Some(value) = param(params, "temperature") {
    let temperature = coerce_number(value);
    if !temperature.is_finite() {
      return Err(HandlerError::invalid("temperature", "must be a number"));
    }
    request.temperature = temperature as f32;
  }

  Ok(request)
}

#[async_trait]
impl CubeHandler for TextHandler {
  async fn execute(&self, inputs: &Params, config: &Params) -> Result<Value, HandlerError> {
    let request = text_request(&merge_params(inputs, config))?;
    let response = self.provider.generate_text(request).await?;
    Ok(Value::String(response.text))
  }
}

/// Generates an image from `prompt`; returns its URL or data URL.
pub struct ImageHandler {
  provider: Arc<dyn AiProvider>,
}

impl ImageHandler {
  pub fn new(provider: Arc<dyn AiProvider>) -> Self {
    Self { provider }
  }
}

#[async_trait]
impl CubeHandler for ImageHandler {
  async fn execute(&self, inputs: &Params, config: &Params) -> Result<Value, HandlerError> {
    let params = merge_params(inputs, config);

    let mut request = ImageRequest::new(require_text(&params, "prompt")?);
    if let Some(size) = text_param(&params, "size") {
      request.size = size;
    }
    request.model = text_param(&params, "model");

    let response = self.provider.generate_image(request).await?;
    Ok(Value::String(response.url))
  }
}
