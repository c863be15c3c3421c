//! Error types for quiz generation, the session state machine, and the saved-quiz store.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Json, Response},
};
use serde_json::json;

/// Shown to the end user for every server-side generation failure.
/// The concrete cause only goes to the logs.
pub const GENERIC_GENERATION_FAILURE: &str = "Failed to generate quiz";

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
  #[error("Invalid input: {0}")]
  InvalidInput(String),

  /// Service unreachable or non-success status. `body` is the raw upstream text, for logs only.
  #[error("Upstream error (status {status:?}): {message}")]
  Upstream {
    status: Option<u16>,
    message: String,
    body: String,
  },

  #[error("Parse error: {0}")]
  Parse(String),

  #[error("Schema error: {0}")]
  Schema(String),
}

impl GenerationError {
  pub fn status(&self) -> StatusCode {
    match self {
      GenerationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Message safe to show to the end user.
  pub fn public_message(&self) -> String {
    match self {
      GenerationError::InvalidInput(msg) => msg.clone(),
      _ => GENERIC_GENERATION_FAILURE.to_string(),
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      GenerationError::InvalidInput(_) => "invalid_input",
      GenerationError::Upstream { .. } => "upstream",
      GenerationError::Parse(_) => "parse",
      GenerationError::Schema(_) => "schema",
    }
  }
}

impl IntoResponse for GenerationError {
  fn into_response(self) -> Response {
    let body = Json(json!({ "error": self.public_message() }));
    (self.status(), body).into_response()
  }
}

/// Rejected state-machine transitions.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
  #[error("{operation} is not allowed while {phase}")]
  WrongPhase {
    operation: &'static str,
    phase: &'static str,
  },

  #[error("Topic is required")]
  EmptyTopic,

  #[error("A quiz is already being generated")]
  AlreadyGenerating,

  #[error("{0}")]
  GenerationFailed(String),

  #[error("Select an answer before moving on")]
  Unanswered,

  #[error("Answer index {0} is out of range")]
  InvalidOption(usize),

  #[error("No quiz is loaded")]
  NoQuiz,

  #[error("Saved quiz not found: {0}")]
  NotFound(String),

  #[error("Could not persist saved quizzes: {0}")]
  Store(String),
}

/// Persistence failures of the saved-quiz slot.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("IO error on {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("storage slot lock poisoned")]
  Poisoned,
}

impl From<StoreError> for SessionError {
  fn from(err: StoreError) -> Self {
    SessionError::Store(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn invalid_input_is_400_and_keeps_its_message() {
    let e = GenerationError::InvalidInput("Topic is required".into());
    assert_eq!(e.status(), StatusCode::BAD_REQUEST);
    assert_eq!(e.public_message(), "Topic is required");
  }

  #[test]
  fn upstream_body_never_reaches_the_user() {
    let e = GenerationError::Upstream {
      status: Some(502),
      message: "model not found".into(),
      body: "{\"error\":\"model 'x' not found\"}".into(),
    };
    assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!e.public_message().contains("model"));
    // Upstream and parse failures look the same from the outside.
    assert_eq!(e.public_message(), GenerationError::Parse("x".into()).public_message());
  }
}
