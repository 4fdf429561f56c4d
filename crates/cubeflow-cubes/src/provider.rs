//! AI provider seam and an OpenAI-compatible HTTP client.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_TEXT_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";

#[derive(Debug, Error)]
pub enum ProviderError {
  #[error("ai provider api key not configured")]
  MissingApiKey,

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("ai provider returned status {status}: {body}")]
  Status { status: u16, body: String },

  #[error("ai provider returned no content")]
  EmptyResponse,
}

/// A chat-style text generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
  pub prompt: String,
  pub system_prompt: Option<String>,
  pub max_tokens: u32,
  pub temperature: f32,
  /// Overrides the client's default text model.
  pub model: Option<String>,
}

impl TextRequest {
  pub fn new(prompt: impl Into<String>) -> Self {
    Self {
      prompt: prompt.into(),
      system_prompt: None,
      max_tokens: 2000,
      temperature: 0.7,
      model: None,
    }
  }

  pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
    self.max_tokens = max_tokens;
    self
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
  #[serde(default)]
  pub prompt_tokens: u32,
  #[serde(default)]
  pub completion_tokens: u32,
  #[serde(default)]
  pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextResponse {
  pub text: String,
  pub model: String,
  pub usage: Option<Usage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
  pub prompt: String,
  pub size: String,
  pub model: Option<String>,
}

impl ImageRequest {
  pub fn new(prompt: impl Into<String>) -> Self {
    Self {
      prompt: prompt.into(),
      size: "1024x1024".to_string(),
      model: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageResponse {
  /// A URL or a `data:image/...;base64,` string.
  pub url: String,
  pub model: String,
}

/// Opaque async AI calls used by AI-backed handlers.
#[async_trait]
pub trait AiProvider: Send + Sync {
  async fn generate_text(&self, request: TextRequest) -> Result<TextResponse, ProviderError>;

  async fn generate_image(&self, request: ImageRequest) -> Result<ImageResponse, ProviderError>;
}

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiProviderConfig {
  pub base_url: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub api_key: Option<String>,
  pub text_model: String,
  pub image_model: String,
}

impl Default for AiProviderConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_string(),
      api_key: None,
      text_model: DEFAULT_TEXT_MODEL.to_string(),
      image_model: DEFAULT_IMAGE_MODEL.to_string(),
    }
  }
}

/// Client for OpenAI-compatible APIs (OpenRouter, OpenAI, Ollama, vLLM).
pub struct OpenAiCompatibleClient {
  http: Client,
  config: AiProviderConfig,
}

impl OpenAiCompatibleClient {
  pub fn new(config: AiProviderConfig) -> Self {
    Self {
      http: Client::new(),
      config,
    }
  }

  pub fn config(&self) -> &AiProviderConfig {
    &self.config
  }

  fn endpoint(&self, path: &str) -> String {
    format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn api_key(&self) -> Result<&str, ProviderError> {
    self
      .config
      .api_key
      .as_deref()
      .filter(|key| !key.is_empty())
      .ok_or(ProviderError::MissingApiKey)
  }

  async fn post<B: Serialize, R: DeserializeOwned>(
    &self,
    path: &str,
    body: &B,
  ) -> Result<R, ProviderError> {
    let response = self
      .http
      .post(self.endpoint(path))
      .bearer_auth(self.api_key()?)
      .json(body)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(ProviderError::Status {
        status: status.as_u16(),
        body,
      });
    }

    Ok(response.json().await?)
  }
}

// Request types
#[derive(Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  messages: Vec<ChatMessage<'a>>,
  max_tokens: u32,
  temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
  role: &'static str,
  content: &'a str,
}

#[derive(Serialize)]
struct ImageGenerationRequest<'a> {
  model: &'a str,
  prompt: &'a str,
  size: &'a str,
  n: u32,
}

// Response types
#[derive(Deserialize)]
struct ChatResponse {
  #[serde(default)]
  model: Option<String>,
  #[serde(default)]
  choices: Vec<ChatChoice>,
  #[serde(default)]
  usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
  message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
  #[serde(default)]
  content: Option<String>,
}

#[derive(Deserialize)]
struct ImageGenerationResponse {
  #[serde(default)]
  data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
  #[serde(default)]
  url: Option<String>,
  #[serde(default)]
  b64_json: Option<String>,
}

#[async_trait]
impl AiProvider for OpenAiCompatibleClient {
  async fn generate_text(&self, request: TextRequest) -> Result<TextResponse, ProviderError> {
    let model = request
      .model
      .as_deref()
      .unwrap_or(&self.config.text_model);

    let mut messages = Vec::with_capacity(2);
    if let Some(system) = request.system_prompt.as_deref() {
      messages.push(ChatMessage {
        role: "system",
        content: system,
      });
    }
    messages.push(ChatMessage {
      role: "user",
      content: &request.prompt,
    });

    debug!(model, max_tokens = request.max_tokens, "ai_text_request");

    let response: ChatResponse = self
      .post(
        "chat/completions",
        &ChatRequest {
          model,
          messages,
          max_tokens: request.max_tokens,
          temperature: request.temperature,
        },
      )
      .await?;

    let text = response
      .choices
      .into_iter()
      .next()
      .and_then(|choice| choice.message.content)
      .ok_or(ProviderError::EmptyResponse)?;

    Ok(TextResponse {
      text,
      model: response.model.unwrap_or_else(|| model.to_string()),
      usage: response.usage,
    })
  }

  async fn generate_image(&self, request: ImageRequest) -> Result<ImageResponse, ProviderError> {
    let model = request
      .model
      .as_deref()
      .unwrap_or(&self.config.image_model);

    debug!(model, size = %request.size, "ai_image_request");

    let response: ImageGenerationResponse = self
      .post(
        "images/generations",
        &ImageGenerationRequest {
          model,
          prompt: &request.prompt,
          size: &request.size,
          n: 1,
        },
      )
      .await?;

    let image = response
      .data
      .into_iter()
      .next()
      .ok_or(ProviderError::EmptyResponse)?;

    let url = match (image.url, image.b64_json) {
      (Some(url), _) => url,
      (None, Some(b64)) => format!("data:image/png;base64,{b64}"),
      (None, None) => return Err(ProviderError::EmptyResponse),
    };

    Ok(ImageResponse {
      url,
      model: model.to_string(),
    })
  }
}
