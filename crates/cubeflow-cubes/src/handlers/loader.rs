use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::HandlerError;
use crate::handler::{CubeHandler, Params, merge_params, param, text_param};

async fn read_file(path: &str) -> Result<String, HandlerError> {
  tokio::fs::read_to_string(path)
    .await
    .map_err(|source| HandlerError::Read {
      path: PathBuf::from(path),
      source,
    })
}

/// Produces text from `content`, or from the file at `filePath`.
pub struct LoaderTextHandler;

#[async_trait]
impl CubeHandler for LoaderTextHandler {
  async fn execute(&self, inputs: &Params, config: &Params) -> Result<Value, HandlerError> {
    let params = merge_params(inputs, config);

    if let Some(content) = text_param(&params, "content") {
      return Ok(Value::String(content));
    }
    if let Some(path) = text_param(&params, "filePath") {
      return Ok(Value::String(read_file(&path).await?));
    }

    Err(HandlerError::invalid(
      "content",
      "either content or filePath must be provided",
    ))
  }
}

/// Produces JSON from `content` (a value or a JSON string), or from `filePath`.
pub struct LoaderJsonHandler;

#[async_trait]
impl CubeHandler for LoaderJsonHandler {
  async fn execute(&self, inputs: &Params, config: &Params) -> Result<Value, HandlerError> {
    let params = merge_params(inputs, config);

    let (field, raw) = match param(&params, "content") {
      Some(Value::String(s)) => ("content", s.clone()),
      Some(other) => return Ok(other.clone()),
      None => match text_param(&params, "filePath") {
        Some(path) => ("filePath", read_file(&path).await?),
        None => {
          return Err(HandlerError::invalid(
            "content",
            "either content or filePath must be provided",
          ));
        }
      },
    };

    serde_json::from_str(&raw)
      .map_err(|e| HandlerError::invalid(field, format!("invalid JSON format: {e}")))
  }
}

/// Produces an image reference from `imageUrl` or `imageData`.
pub struct LoaderImageHandler;

#[async_trait]
impl CubeHandler for LoaderImageHandler {
  async fn execute(&self, inputs: &Params, config: &Params) -> Result<Value, HandlerError> {
    let params = merge_params(inputs, config);

    text_param(&params, "imageUrl")
      .or_else(|| text_param(&params, "imageData"))
      .map(Value::String)
      .ok_or_else(|| {
        HandlerError::invalid("imageUrl", "either imageUrl or imageData must be provided")
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn config(value: Value) -> Params {
    value.as_object().cloned().unwrap()
  }

  #[tokio::test]
  async fn test_loader_text_content() {
    let out = LoaderTextHandler
      .execute(&Params::new(), &config(json!({ "content": "5" })))
      .await
      .unwrap();
    assert_eq!(out, json!("5"));
  }

  #[tokio::test]
  async fn test_loader_text_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("note.txt");
    tokio::fs::write(&path, "from disk").await.unwrap();

    let out = LoaderTextHandler
      .execute(
        &Params::new(),
        &config(json!({ "filePath": path.to_string_lossy() })),
      )
      .await
      .unwrap();
    assert_eq!(out, json!("from disk"));
  }

  #[tokio::test]
  async fn test_loader_text_requires_a_source() {
    let err = LoaderTextHandler
      .execute(&Params::new(), &Params::new())
      .await
      .unwrap_err();
    assert!(matches!(err, HandlerError::InvalidInput { .. }));
  }

  #[tokio::test]
  async fn test_loader_json_parses_strings() {
    let out = LoaderJsonHandler
      .execute(&Params::new(), &config(json!({ "content": "{\"a\": [1, 2]}" })))
      .await
      .unwrap();
    assert_eq!(out, json!({ "a": [1, 2] }));

    let out = LoaderJsonHandler
      .execute(&Params::new(), &config(json!({ "content": { "b": true } })))
      .await
      .unwrap();
    assert_eq!(out, json!({ "b": true }));
  }

  #[tokio::test]
  async fn test_loader_json_rejects_malformed() {
    let err = LoaderJsonHandler
      .execute(&Params::new(), &config(json!({ "content": "{not json" })))
      .await
      .unwrap_err();
    assert!(err.to_string().contains("invalid JSON format"));
  }

  #[tokio::test]
  async fn test_loader_image_prefers_url() {
    let out = LoaderImageHandler
      .execute(
        &Params::new(),
        &config(json!({ "imageUrl": "https://x/y.png", "imageData": "data:image/png;base64,AA" })),
      )
      .await
      .unwrap();
    assert_eq!(out, json!("https://x/y.png"));
  }
}
