use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::HandlerError;
use crate::handler::{CubeHandler, Params, display_value, merge_params, param, text_param};

/// What a saver writes and where it writes it by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaverKind {
  Text,
  Image,
  Table,
  Json,
}

impl SaverKind {
  fn input_key(self) -> &'static str {
    match self {
      SaverKind::Text => "content",
      SaverKind::Image => "imageData",
      SaverKind::Table | SaverKind::Json => "data",
    }
  }

  fn default_destination(self) -> &'static str {
    match self {
      SaverKind::Text => "text",
      SaverKind::Image => "images",
      SaverKind::Table => "tables",
      SaverKind::Json => "json",
    }
  }

  fn default_filename(self) -> String {
    let millis = Utc::now().timestamp_millis();
    match self {
      SaverKind::Text => format!("text_{millis}.txt"),
      SaverKind::Image => format!("image_{millis}.png"),
      SaverKind::Table => format!("table_{millis}.csv"),
      SaverKind::Json => format!("data_{millis}.json"),
    }
  }

  fn encode(self, value: &Value) -> Result<Vec<u8>, HandlerError> {
    let field = self.input_key();
    match self {
      SaverKind::Text => Ok(display_value(value).into_bytes()),
      SaverKind::Image => {
        let Value::String(data) = value else {
          return Err(HandlerError::invalid(field, "expected a base64 string"));
        };
        let encoded = match data.strip_prefix("data:") {
          Some(rest) => rest.split_once(',').map(|(_, b64)| b64).unwrap_or_default(),
          None => data.as_str(),
        };
        STANDARD
          .decode(encoded.trim())
          .map_err(|e| HandlerError::invalid(field, format!("invalid base64: {e}")))
      }
      SaverKind::Table => to_csv(value).map(String::into_bytes),
      SaverKind::Json => serde_json::to_vec_pretty(value)
        .map_err(|e| HandlerError::invalid(field, e.to_string())),
    }
  }
}

fn quote(cell: &str) -> String {
  format!("\"{}\"", cell.replace('"', "\"\""))
}

/// Render an array of objects as CSV. Columns come from the first row in
/// authored key order; every header and cell is quoted.
fn to_csv(value: &Value) -> Result<String, HandlerError> {
  let Value::Array(rows) = value else {
    return Err(HandlerError::invalid("data", "table data must be an array"));
  };
  let Some(first) = rows.first() else {
    return Ok(String::new());
  };
  let Value::Object(first) = first else {
    return Err(HandlerError::invalid("data", "table rows must be objects"));
  };

  let headers: Vec<&String> = first.keys().collect();
  let mut lines = vec![
    headers
      .iter()
      .map(|h| quote(h))
      .collect::<Vec<_>>()
      .join(","),
  ];

  for row in rows {
    let Value::Object(row) = row else {
      return Err(HandlerError::invalid("data", "table rows must be objects"));
    };
    let cells: Vec<String> = headers
      .iter()
      .map(|h| quote(&row.get(h.as_str()).map(display_value).unwrap_or_default()))
      .collect();
    lines.push(cells.join(","));
  }

  Ok(lines.join("\n"))
}

/// A single relative path segment; rejects anything that could leave the
/// output directory.
fn safe_segment<'a>(field: &str, value: &'a str) -> Result<&'a Path, HandlerError> {
  let path = Path::new(value);
  let mut components = path.components();
  match (components.next(), components.next()) {
    (Some(Component::Normal(_)), None) => Ok(path),
    _ => Err(HandlerError::invalid(
      field,
      format!("'{value}' must be a plain file or directory name"),
    )),
  }
}

/// Writes its input under `output_dir/<destination>/<filename>` and returns
/// `{filePath}`.
pub struct SaverHandler {
  kind: SaverKind,
  output_dir: PathBuf,
}

impl SaverHandler {
  pub fn new(kind: SaverKind, output_dir: impl Into<PathBuf>) -> Self {
    Self {
      kind,
      output_dir: output_dir.into(),
    }
  }
}

#[async_trait]
impl CubeHandler for SaverHandler {
  async fn execute(&self, inputs: &Params, config: &Params) -> Result<Value, HandlerError> {
    let params = merge_params(inputs, config);
    let field = self.kind.input_key();

    let value = param(&params, field).ok_or_else(|| HandlerError::missing(field))?;
    let bytes = self.kind.encode(value)?;

    let destination =
      text_param(&params, "destination").unwrap_or_else(|| self.kind.default_destination().into());
    let filename = text_param(&params, "filename").unwrap_or_else(|| self.kind.default_filename());

    let dir = self
      .output_dir
      .join(safe_segment("destination", &destination)?);
    let path = dir.join(safe_segment("filename", &filename)?);

    tokio::fs::create_dir_all(&dir)
      .await
      .map_err(|source| HandlerError::Write {
        path: dir.clone(),
        source,
      })?;
    tokio::fs::write(&path, &bytes)
      .await
      .map_err(|source| HandlerError::Write {
        path: path.clone(),
        source,
      })?;

    debug!(path = %path.display(), bytes = bytes.len(), "cube_output_saved");

    Ok(json!({ "filePath": path.to_string_lossy() }))
  }
}
