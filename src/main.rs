//! Quizgen · AI Quiz Backend
//!
//! - `POST /generate-quiz`: topic in, five sanitized multiple-choice questions out
//! - `GET /ws`: one timed quiz session per connection (play, review, save, share)
//! - Local Ollama as the generation service
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   OLLAMA_BASE_URL     : default "http://localhost:11434"
//!   OLLAMA_MODEL        : default "llama3.2:3b"
//!   QUIZ_CONFIG_PATH    : path to TOML config (prompt, generation params, countdown, storage)
//!   SAVED_QUIZZES_PATH  : saved-quiz slot, default "./data/savedQuizzes.json"
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use quizgen_backend::routes::build_router;
use quizgen_backend::state::AppState;
use quizgen_backend::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (generator, saved quizzes, config).
  let state = Arc::new(AppState::from_env()?);

  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "quiz_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "quiz_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "quiz_backend", "Shutdown signal received");
}
