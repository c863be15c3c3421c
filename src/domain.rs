//! Domain models: questions and quizzes as they travel over the wire and into storage.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Every question carries exactly this many options.
pub const OPTION_COUNT: usize = 4;

/// Options used when the model did not provide exactly four strings.
pub const PLACEHOLDER_OPTIONS: [&str; OPTION_COUNT] = ["Option A", "Option B", "Option C", "Option D"];

/// One multiple-choice question.
/// `options` is a fixed-size array so the "exactly four" rule cannot be broken after coercion.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  pub id: u32,
  pub question: String,
  pub options: [String; OPTION_COUNT],
  pub correct_answer: u8,
  #[serde(default)]
  pub explanation: String,
}

impl Question {
  /// Fully-defaulted question at 1-based `position`.
  pub fn placeholder(position: u32, topic: &str) -> Self {
    Self {
      id: position,
      question: format!("Question about {}", topic),
      options: PLACEHOLDER_OPTIONS.map(String::from),
      correct_answer: 0,
      explanation: String::new(),
    }
  }

  pub fn option_text(&self, index: u8) -> Option<&str> {
    self.options.get(index as usize).map(String::as_str)
  }

  pub fn correct_text(&self) -> &str {
    self.option_text(self.correct_answer).unwrap_or_default()
  }
}

/// A generated quiz. Immutable once built; sessions share it by `Arc`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
  pub id: String,
  pub topic: String,
  pub questions: Vec<Question>,
  /// Epoch milliseconds.
  pub created_at: i64,
}

impl Quiz {
  pub fn new(topic: &str, questions: Vec<Question>) -> Arc<Self> {
    Arc::new(Self {
      id: Uuid::new_v4().to_string(),
      topic: topic.to_string(),
      questions,
      created_at: chrono::Utc::now().timestamp_millis(),
    })
  }

  pub fn len(&self) -> usize {
    self.questions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.questions.is_empty()
  }
}
