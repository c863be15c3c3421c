//! Loading quiz configuration (prompt template + generation and session knobs) from TOML.
//!
//! Every section is optional; missing keys fall back to the defaults below.
//! See `QuizConfig` for the expected schema:
//!
//! ```toml
//! [prompts]
//! quiz_template = "... {topic} ... {count} ..."
//!
//! [generation]
//! temperature = 0.7
//! max_tokens = 2000
//! question_count = 5
//!
//! [session]
//! countdown_secs = 300
//!
//! [storage]
//! saved_quizzes_path = "./data/savedQuizzes.json"
//! ```

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct QuizConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub generation: GenerationParams,
  #[serde(default)]
  pub session: SessionParams,
  #[serde(default)]
  pub storage: StorageParams,
}

/// Prompt sent to the generation service. `{topic}` and `{count}` are substituted.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub quiz_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      quiz_template: r#"Generate a JSON response with {count} multiple-choice quiz questions about "{topic}".
The response must be valid JSON with this exact structure:
{
  "questions": [
    {
      "id": 1,
      "question": "Your question text here",
      "options": ["Option A", "Option B", "Option C", "Option D"],
      "correctAnswer": 0,
      "explanation": "Brief explanation of why this is correct"
    }
  ]
}

Requirements:
- Generate {count} questions about the topic "{topic}"
- Each question must have exactly 4 options
- Make questions educational and accurate
- correctAnswer should be 0, 1, 2, or 3 (index of correct option)
- Provide clear explanations for each correct answer
- Return ONLY valid JSON, no markdown formatting, no code blocks

Respond with valid JSON only:"#
        .into(),
    }
  }
}

/// Bounded sampling parameters for the single generation call.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
  pub temperature: f32,
  pub max_tokens: u32,
  pub question_count: usize,
  pub timeout_secs: u64,
}

impl Default for GenerationParams {
  fn default() -> Self {
    Self { temperature: 0.7, max_tokens: 2000, question_count: 5, timeout_secs: 120 }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionParams {
  pub countdown_secs: u32,
}

impl Default for SessionParams {
  fn default() -> Self {
    Self { countdown_secs: 300 }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StorageParams {
  pub saved_quizzes_path: String,
}

impl Default for StorageParams {
  fn default() -> Self {
    Self { saved_quizzes_path: "./data/savedQuizzes.json".into() }
  }
}

impl QuizConfig {
  /// Defaults, overlaid with QUIZ_CONFIG_PATH (if readable) and then SAVED_QUIZZES_PATH.
  pub fn from_env() -> Self {
    let mut cfg = load_quiz_config_from_env().unwrap_or_default();
    if let Ok(path) = std::env::var("SAVED_QUIZZES_PATH") {
      cfg.storage.saved_quizzes_path = path;
    }
    cfg
  }
}

/// Attempt to load `QuizConfig` from QUIZ_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_quiz_config_from_env() -> Option<QuizConfig> {
  let path = std::env::var("QUIZ_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<QuizConfig>(&s) {
      Ok(cfg) => {
        info!(target: "quiz_backend", %path, "Loaded quiz config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "quiz_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "quiz_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg: QuizConfig = toml::from_str("[session]\ncountdown_secs = 60\n").unwrap();
    assert_eq!(cfg.session.countdown_secs, 60);
    assert_eq!(cfg.generation.question_count, 5);
    assert_eq!(cfg.generation.max_tokens, 2000);
    assert!(cfg.prompts.quiz_template.contains("{topic}"));
  }

  #[test]
  fn generation_section_overrides_single_keys() {
    let cfg: QuizConfig = toml::from_str("[generation]\ntemperature = 0.2\n").unwrap();
    assert!((cfg.generation.temperature - 0.2).abs() < f32::EPSILON);
    assert_eq!(cfg.generation.timeout_secs, 120);
  }
}
