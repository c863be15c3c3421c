//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs basic result info.

use std::sync::Arc;

use axum::{
  extract::{rejection::JsonRejection, State},
  response::IntoResponse,
  Json,
};
use tracing::{error, info, instrument};

use crate::error::GenerationError;
use crate::logic::generate_questions;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_generate_quiz(
  State(state): State<Arc<AppState>>,
  body: Result<Json<GenerateQuizIn>, JsonRejection>,
) -> Result<Json<GenerateQuizOut>, GenerationError> {
  let Json(body) = body.map_err(|e| {
    info!(target: "quiz", error = %e, "Rejected generate-quiz body");
    GenerationError::InvalidInput("Topic is required".into())
  })?;

  match generate_questions(&state, body.topic_str()).await {
    Ok(questions) => {
      info!(target: "quiz", count = questions.len(), "HTTP generate-quiz served");
      Ok(Json(GenerateQuizOut { questions }))
    }
    Err(e) => {
      error!(target: "quiz", kind = e.kind(), error = %e, "HTTP generate-quiz failed");
      Err(e)
    }
  }
}
