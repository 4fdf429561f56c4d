use std::path::PathBuf;

use thiserror::Error;

use crate::provider::ProviderError;

/// Errors a cube handler can report.
#[derive(Debug, Error)]
pub enum HandlerError {
  /// Missing required input field.
  #[error("missing required input: {field}")]
  MissingInput { field: String },

  /// Invalid input value.
  #[error("invalid input '{field}': {message}")]
  InvalidInput { field: String, message: String },

  #[error("unsupported operator: {operator}")]
  UnsupportedOperator { operator: String },

  /// Expression could not be parsed or did not produce a finite number.
  #[error("math evaluation failed: {message}")]
  Evaluation { message: String },

  #[error("ai provider error: {0}")]
  Provider(#[from] ProviderError),

  #[error("failed to read '{}': {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write '{}': {source}", path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl HandlerError {
  pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
    HandlerError::InvalidInput {
      field: field.into(),
      message: message.into(),
    }
  }

  pub(crate) fn missing(field: impl Into<String>) -> Self {
    HandlerError::MissingInput {
      field: field.into(),
    }
  }
}
