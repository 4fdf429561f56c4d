use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cubeflow_cubes::{
  AiProvider, CubeType, HandlerRegistry, ImageRequest, ImageResponse, Params, ProviderError,
  TextRequest, TextResponse,
};
use cubeflow_output::OutputFormatter;
use serde_json::{Value, json};

/// Records every request and answers with canned content.
#[derive(Default)]
struct RecordingProvider {
  text_requests: Mutex<Vec<TextRequest>>,
  image_requests: Mutex<Vec<ImageRequest>>,
}

#[async_trait]
impl AiProvider for RecordingProvider {
  async fn generate_text(&self, request: TextRequest) -> Result<TextResponse, ProviderError> {
    let text = format!("echo: {}", request.prompt);
    self.text_requests.lock().unwrap().push(request);
    Ok(TextResponse {
      text,
      model: "mock".to_string(),
      usage: None,
    })
  }

  async fn generate_image(&self, request: ImageRequest) -> Result<ImageResponse, ProviderError> {
    self.image_requests.lock().unwrap().push(request);
    Ok(ImageResponse {
      url: "https://images.example/1.png".to_string(),
      model: "mock".to_string(),
    })
  }
}

struct FailingProvider;

#[async_trait]
impl AiProvider for FailingProvider {
  async fn generate_text(&self, _: TextRequest) -> Result<TextResponse, ProviderError> {
    Err(ProviderError::EmptyResponse)
  }

  async fn generate_image(&self, _: ImageRequest) -> Result<ImageResponse, ProviderError> {
    Err(ProviderError::MissingApiKey)
  }
}

fn params(value: Value) -> Params {
  value.as_object().cloned().unwrap()
}

async fn run(registry: &HandlerRegistry, cube_type: CubeType, inputs: Value, config: Value) -> Value {
  registry
    .get(cube_type)
    .unwrap()
    .execute(&params(inputs), &params(config))
    .await
    .unwrap()
}

#[tokio::test]
async fn test_text_cube_uses_upstream_prompt() {
  let provider = Arc::new(RecordingProvider::default());
  let registry = HandlerRegistry::builtin(provider.clone(), "unused");

  let out = run(
    &registry,
    CubeType::Text,
    json!({ "prompt": OutputFormatter::text("Write a haiku").to_value() }),
    json!({ "prompt": "ignored", "systemPrompt": "You are a poet" }),
  )
  .await;

  assert_eq!(out, json!("echo: Write a haiku"));
  let requests = provider.text_requests.lock().unwrap();
  assert_eq!(requests.len(), 1);
  assert_eq!(requests[0].system_prompt.as_deref(), Some("You are a poet"));
}

#[tokio::test]
async fn test_recognition_cubes_forward_default_prompts() {
  let provider = Arc::new(RecordingProvider::default());
  let registry = HandlerRegistry::builtin(provider.clone(), "unused");

  let image = format!("data:image/png;base64,{}", "A".repeat(500));
  run(&registry, CubeType::RecognitionSeeing, json!({ "image": image }), json!({})).await;
  run(&registry, CubeType::RecognitionHearing, json!({ "audio": "data:audio/wav;base64,UklGRg==" }), json!({})).await;

  let requests = provider.text_requests.lock().unwrap();
  assert!(requests[0].prompt.starts_with("Analyze this image"));
  // Only a preview of the image reference is forwarded.
  assert!(requests[0].prompt.len() < 300);
  assert_eq!(requests[0].max_tokens, 1000);
  assert!(requests[1].prompt.starts_with("Transcribe this audio"));
}

#[tokio::test]
async fn test_image_cube_returns_url() {
  let provider = Arc::new(RecordingProvider::default());
  let registry = HandlerRegistry::builtin(provider.clone(), "unused");

  let out = run(&registry, CubeType::Image, json!({}), json!({ "prompt": "a red cube", "size": "512x512" })).await;
  assert_eq!(out, json!("https://images.example/1.png"));
  assert_eq!(provider.image_requests.lock().unwrap()[0].size, "512x512");
}

#[tokio::test]
async fn test_provider_failure_surfaces_as_handler_error() {
  let registry = HandlerRegistry::builtin(Arc::new(FailingProvider), "unused");
  let err = registry
    .get(CubeType::Text)
    .unwrap()
    .execute(&params(json!({ "prompt": "hi" })), &Params::new())
    .await
    .unwrap_err();
  assert_eq!(err.to_string(), "ai provider error: ai provider returned no content");
}

#[tokio::test]
async fn test_savers_write_under_output_dir() {
  let dir = tempfile::tempdir().unwrap();
  let registry = HandlerRegistry::builtin(Arc::new(FailingProvider), dir.path());

  let out = run(
    &registry,
    CubeType::SaverText,
    json!({ "content": OutputFormatter::text("hello").to_value() }),
    json!({ "filename": "greeting.txt" }),
  )
  .await;
  let path = dir.path().join("text").join("greeting.txt");
  assert_eq!(out, json!({ "filePath": path.to_string_lossy() }));
  assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "hello");

  let out = run(
    &registry,
    CubeType::SaverJson,
    json!({ "data": { "decision": true } }),
    json!({ "destination": "results", "filename": "out.json" }),
  )
  .await;
  let path = dir.path().join("results").join("out.json");
  assert_eq!(out["filePath"], json!(path.to_string_lossy()));
  let written: Value = serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
  assert_eq!(written, json!({ "decision": true }));

  let out = run(
    &registry,
    CubeType::SaverTable,
    json!({ "data": [{ "a": 1, "b": "x" }] }),
    json!({}),
  )
  .await;
  let saved = out["filePath"].as_str().unwrap();
  assert!(saved.ends_with(".csv"));
  assert_eq!(tokio::fs::read_to_string(saved).await.unwrap(), "\"a\",\"b\"\n\"1\",\"x\"");
}

#[tokio::test]
async fn test_saver_rejects_escaping_filenames() {
  let dir = tempfile::tempdir().unwrap();
  let registry = HandlerRegistry::builtin(Arc::new(FailingProvider), dir.path());

  let err = registry
    .get(CubeType::SaverText)
    .unwrap()
    .execute(
      &params(json!({ "content": "x" })),
      &params(json!({ "filename": "../escape.txt" })),
    )
    .await
    .unwrap_err();
  assert!(err.to_string().contains("filename"));
}
