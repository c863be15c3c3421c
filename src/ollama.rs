//! Minimal Ollama client for our use-case.
//!
//! We only call `/api/generate` with `stream: false` and return the raw `response` text.
//! The text is untrusted: turning it into questions is the sanitizer's job.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).

use std::time::{Duration, Instant};

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::error::GenerationError;
use crate::util::trunc_for_log;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2:3b";

#[derive(Clone)]
pub struct Ollama {
  pub client: reqwest::Client,
  pub base_url: String,
  pub model: String,
}

impl Ollama {
  /// Read OLLAMA_BASE_URL / OLLAMA_MODEL, falling back to the local defaults.
  pub fn from_env(timeout: Duration) -> Result<Self, reqwest::Error> {
    let base_url = std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
    Self::new(base_url, model, timeout)
  }

  pub fn new(base_url: String, model: String, timeout: Duration) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let base_url = base_url.trim_end_matches('/').to_string();
    Ok(Self { client, base_url, model })
  }

  /// Single non-streaming completion. Any non-success status is an `Upstream` error
  /// carrying the raw body for diagnostics.
  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
  pub async fn generate(
    &self,
    prompt: &str,
    temperature: f32,
    max_tokens: u32,
  ) -> Result<String, GenerationError> {
    let url = format!("{}/api/generate", self.base_url);
    let req = GenerateRequest {
      model: &self.model,
      prompt,
      stream: false,
      options: GenerateOptions { temperature, num_predict: max_tokens },
    };

    let start = Instant::now();
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "quizgen-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&req)
      .send()
      .await
      .map_err(|e| {
        error!(target: "quiz", error = %e, %url, "Generation service unreachable");
        GenerationError::Upstream { status: None, message: e.to_string(), body: String::new() }
      })?;

    let status = res.status();
    if !status.is_success() {
      let body = res.text().await.unwrap_or_default();
      let message = extract_ollama_error(&body).unwrap_or_else(|| format!("HTTP {}", status));
      error!(target: "quiz", status = status.as_u16(), body = %trunc_for_log(&body, 500), "Generation service API error");
      return Err(GenerationError::Upstream { status: Some(status.as_u16()), message, body });
    }

    let body: GenerateResponse = res.json().await.map_err(|e| {
      error!(target: "quiz", error = %e, "Generation service returned an unreadable body");
      GenerationError::Upstream { status: Some(status.as_u16()), message: e.to_string(), body: String::new() }
    })?;

    info!(
      elapsed = ?start.elapsed(),
      response_len = body.response.len(),
      eval_count = ?body.eval_count,
      "Model response received"
    );
    Ok(body.response)
  }
}

// --- Generate DTOs ---

#[derive(Serialize)]
struct GenerateRequest<'a> {
  model: &'a str,
  prompt: &'a str,
  stream: bool,
  options: GenerateOptions,
}
#[derive(Serialize)]
struct GenerateOptions {
  temperature: f32,
  num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
  #[serde(default)]
  response: String,
  #[serde(default)]
  eval_count: Option<u32>,
}

/// Ollama reports failures as `{"error": "..."}`.
fn extract_ollama_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: String,
  }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error)
}
