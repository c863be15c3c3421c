//! Prompt/response sanitizer: turns a topic into a prompt and the model's free text into questions.
//!
//! Pipeline over the raw completion text, each stage tolerant of the previous one:
//!   1. strip code fences (```` ```json ```` and bare ```` ``` ````) and surrounding whitespace
//!   2. direct JSON parse
//!   3. fallback: parse the first `{ ... }` span found in the text
//!   4. require a `questions` array, then coerce every entry field by field
//!
//! Coercion never fails. Only an unparseable payload or a missing `questions` array is an error.

use std::future::Future;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{GenerationParams, Prompts};
use crate::domain::{Question, OPTION_COUNT};
use crate::error::GenerationError;
use crate::ollama::Ollama;
use crate::util::{fill_template, trunc_for_log};

static JSON_OBJECT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid brace pattern"));

/// Anything that can produce a validated question list for a topic.
pub trait QuizGenerator {
  fn generate(&self, topic: &str) -> impl Future<Output = Result<Vec<Question>, GenerationError>> + Send;
}

/// Outcome of parsing the cleaned completion text.
#[derive(Debug)]
pub enum ParsedPayload {
  Questions(Vec<Value>),
  ParseFailure(String),
  SchemaFailure(String),
}

/// The production generator: prompt + Ollama call + sanitizing.
#[derive(Clone)]
pub struct QuizService {
  pub ollama: Ollama,
  pub prompts: Prompts,
  pub params: GenerationParams,
}

impl QuizService {
  pub fn new(ollama: Ollama, prompts: Prompts, params: GenerationParams) -> Self {
    Self { ollama, prompts, params }
  }

  /// Validate the topic, call the model once, sanitize the answer.
  #[instrument(level = "info", skip(self), fields(model = %self.ollama.model))]
  pub async fn generate_quiz(&self, topic: &str) -> Result<Vec<Question>, GenerationError> {
    let topic = validate_topic(topic)?;
    let prompt = build_prompt(&self.prompts, topic, self.params.question_count);
    let raw = self
      .ollama
      .generate(&prompt, self.params.temperature, self.params.max_tokens)
      .await?;
    let questions = sanitize_response(&raw, topic, self.params.question_count)?;
    info!(target: "quiz", %topic, count = questions.len(), "Quiz generated");
    Ok(questions)
  }
}

impl QuizGenerator for QuizService {
  fn generate(&self, topic: &str) -> impl Future<Output = Result<Vec<Question>, GenerationError>> + Send {
    self.generate_quiz(topic)
  }
}

/// Reject empty or whitespace-only topics before anything goes upstream.
pub fn validate_topic(topic: &str) -> Result<&str, GenerationError> {
  let t = topic.trim();
  if t.is_empty() {
    return Err(GenerationError::InvalidInput("Topic is required".into()));
  }
  Ok(t)
}

pub fn build_prompt(prompts: &Prompts, topic: &str, count: usize) -> String {
  fill_template(&prompts.quiz_template, &[("topic", topic), ("count", &count.to_string())])
}

pub fn strip_fences(raw: &str) -> String {
  raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Direct parse first, then the first-brace-to-last-brace span.
pub fn parse_payload(cleaned: &str) -> ParsedPayload {
  let value = match serde_json::from_str::<Value>(cleaned) {
    Ok(v) => v,
    Err(direct_err) => {
      warn!(target: "quiz", error = %direct_err, text = %trunc_for_log(cleaned, 300), "Direct parse failed; trying brace extraction");
      let Some(m) = JSON_OBJECT.find(cleaned) else {
        return ParsedPayload::ParseFailure("no JSON object in response".into());
      };
      match serde_json::from_str::<Value>(m.as_str()) {
        Ok(v) => v,
        Err(e) => return ParsedPayload::ParseFailure(format!("extracted object is not JSON: {}", e)),
      }
    }
  };

  match value {
    Value::Object(mut map) => match map.remove("questions") {
      Some(Value::Array(items)) => ParsedPayload::Questions(items),
      Some(_) => ParsedPayload::SchemaFailure("`questions` is not an array".into()),
      None => ParsedPayload::SchemaFailure("missing `questions` field".into()),
    },
    _ => ParsedPayload::SchemaFailure("top-level value is not an object".into()),
  }
}

/// Per-field defaulting. `position` is 1-based.
pub fn coerce_question(raw: &Value, position: u32, topic: &str) -> Question {
  let fallback = Question::placeholder(position, topic);

  let id = raw
    .get("id")
    .and_then(Value::as_u64)
    .filter(|n| *n > 0)
    .and_then(|n| u32::try_from(n).ok())
    .unwrap_or(fallback.id);

  let question = raw
    .get("question")
    .and_then(Value::as_str)
    .filter(|s| !s.is_empty())
    .map(String::from)
    .unwrap_or(fallback.question);

  let options = raw
    .get("options")
    .and_then(Value::as_array)
    .filter(|arr| arr.len() == OPTION_COUNT)
    .and_then(|arr| arr.iter().map(|o| o.as_str().map(String::from)).collect::<Option<Vec<_>>>())
    .and_then(|v| <[String; OPTION_COUNT]>::try_from(v).ok())
    .unwrap_or(fallback.options);

  let correct_answer = raw
    .get("correctAnswer")
    .and_then(Value::as_u64)
    .filter(|n| (*n as usize) < OPTION_COUNT)
    .map(|n| n as u8)
    .unwrap_or(fallback.correct_answer);

  let explanation = raw
    .get("explanation")
    .and_then(Value::as_str)
    .map(String::from)
    .unwrap_or_default();

  Question { id, question, options, correct_answer, explanation }
}

/// Full post-processing of one completion into exactly `count` questions.
/// Surplus entries are dropped, missing ones padded with placeholders.
pub fn sanitize_response(raw: &str, topic: &str, count: usize) -> Result<Vec<Question>, GenerationError> {
  let cleaned = strip_fences(raw);
  let items = match parse_payload(&cleaned) {
    ParsedPayload::Questions(items) => items,
    ParsedPayload::ParseFailure(reason) => {
      error!(target: "quiz", %reason, text = %trunc_for_log(&cleaned, 500), "Failed to parse model response");
      return Err(GenerationError::Parse(reason));
    }
    ParsedPayload::SchemaFailure(reason) => {
      error!(target: "quiz", %reason, "Invalid quiz structure from model");
      return Err(GenerationError::Schema(reason));
    }
  };

  if items.is_empty() {
    error!(target: "quiz", "Model returned an empty question list");
    return Err(GenerationError::Schema("empty `questions` array".into()));
  }
  if items.len() != count {
    debug!(target: "quiz", got = items.len(), want = count, "Normalizing question count");
  }

  let questions = (0..count)
    .map(|i| {
      let position = (i + 1) as u32;
      match items.get(i) {
        Some(raw) => coerce_question(raw, position, topic),
        None => Question::placeholder(position, topic),
      }
    })
    .collect();
  Ok(questions)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn five_questions() -> Value {
    let qs: Vec<Value> = (1..=5)
      .map(|i| {
        json!({
          "id": i,
          "question": format!("Q{}?", i),
          "options": ["a", "b", "c", "d"],
          "correctAnswer": (i % 4),
          "explanation": format!("because {}", i)
        })
      })
      .collect();
    json!({ "questions": qs })
  }

  fn assert_shape(questions: &[Question]) {
    assert_eq!(questions.len(), 5);
    for q in questions {
      assert_eq!(q.options.len(), 4);
      assert!(q.correct_answer < 4);
      assert!(q.id >= 1);
    }
  }

  #[test]
  fn well_formed_json_is_kept_as_is() {
    let raw = five_questions().to_string();
    let qs = sanitize_response(&raw, "Astronomy", 5).unwrap();
    assert_shape(&qs);
    assert_eq!(qs[2].question, "Q3?");
    assert_eq!(qs[2].correct_answer, 3);
    assert_eq!(qs[4].explanation, "because 5");
    assert_eq!(qs[1].options[1], "b");
  }

  #[test]
  fn fenced_json_parses_the_same() {
    let body = five_questions().to_string();
    let plain = sanitize_response(&body, "t", 5).unwrap();
    let fenced = sanitize_response(&format!("```json\n{}\n```", body), "t", 5).unwrap();
    let bare = sanitize_response(&format!("```\n{}\n```", body), "t", 5).unwrap();
    assert_eq!(plain, fenced);
    assert_eq!(plain, bare);
  }

  #[test]
  fn chatty_fenced_output_is_recovered() {
    let raw = format!("Sure! ```json\n{}\n```", five_questions());
    let qs = sanitize_response(&raw, "Astronomy", 5).unwrap();
    assert_shape(&qs);
    assert_eq!(qs[0].question, "Q1?");
  }

  #[test]
  fn json_inside_prose_uses_extraction_fallback() {
    let raw = format!("Here is your quiz:\n{}\nHope you enjoy it!", five_questions());
    assert!(matches!(parse_payload(&strip_fences(&raw)), ParsedPayload::Questions(ref v) if v.len() == 5));
    assert_shape(&sanitize_response(&raw, "t", 5).unwrap());
  }

  #[test]
  fn non_json_text_is_a_parse_error() {
    let err = sanitize_response("I cannot help with that.", "t", 5).unwrap_err();
    assert!(matches!(err, GenerationError::Parse(_)));
    let err = sanitize_response("almost {json: nope}", "t", 5).unwrap_err();
    assert!(matches!(err, GenerationError::Parse(_)));
  }

  #[test]
  fn missing_or_wrong_questions_field_is_a_schema_error() {
    for raw in [r#"{"items": []}"#, r#"{"questions": "none"}"#, "[1,2,3]", r#"{"questions": []}"#] {
      let err = sanitize_response(raw, "t", 5).unwrap_err();
      assert!(matches!(err, GenerationError::Schema(_)), "{raw}");
    }
  }

  #[test]
  fn every_field_defaults_independently() {
    let raw = json!({
      "questions": [
        {},
        { "id": 0, "question": "", "options": ["a", "b", "c"], "correctAnswer": 4 },
        { "id": "7", "question": "Real?", "options": ["a", "b", "c", 4], "correctAnswer": -1 },
        { "id": 9, "options": ["w", "x", "y", "z"], "correctAnswer": 2.5, "explanation": null },
        { "question": "Last", "correctAnswer": 3, "explanation": "ok" }
      ]
    })
    .to_string();
    let qs = sanitize_response(&raw, "Bees", 5).unwrap();
    assert_shape(&qs);

    assert_eq!(qs[0], Question::placeholder(1, "Bees"));
    assert_eq!(qs[1].id, 2);
    assert_eq!(qs[1].question, "Question about Bees");
    assert_eq!(qs[1].options[0], "Option A");
    assert_eq!(qs[1].correct_answer, 0);

    assert_eq!(qs[2].id, 3);
    assert_eq!(qs[2].question, "Real?");
    assert_eq!(qs[2].options[3], "Option D");
    assert_eq!(qs[2].correct_answer, 0);

    assert_eq!(qs[3].id, 9);
    assert_eq!(qs[3].options[2], "y");
    assert_eq!(qs[3].correct_answer, 0);
    assert_eq!(qs[3].explanation, "");

    assert_eq!(qs[4].question, "Last");
    assert_eq!(qs[4].correct_answer, 3);
    assert_eq!(qs[4].explanation, "ok");
  }

  #[test]
  fn question_text_is_kept_verbatim() {
    let raw = json!({
      "questions": [{ "question": "  What is a *nebula*?\n", "options": ["a", "b", "c", "d"], "correctAnswer": 1 }]
    })
    .to_string();
    let qs = sanitize_response(&raw, "Astronomy", 5).unwrap();
    assert_eq!(qs[0].question, "  What is a *nebula*?\n");
    assert_eq!(qs[1], Question::placeholder(2, "Astronomy"));
  }

  #[test]
  fn non_object_entries_become_placeholders() {
    let raw = r#"{"questions": [42, "text", null, [], true]}"#;
    let qs = sanitize_response(raw, "X", 5).unwrap();
    for (i, q) in qs.iter().enumerate() {
      assert_eq!(*q, Question::placeholder((i + 1) as u32, "X"));
    }
  }

  #[test]
  fn count_is_normalized() {
    let mut long = five_questions();
    let extra = long["questions"][0].clone();
    long["questions"].as_array_mut().unwrap().push(extra);
    assert_eq!(sanitize_response(&long.to_string(), "t", 5).unwrap().len(), 5);

    let short = json!({ "questions": [{ "question": "Only one", "options": ["a","b","c","d"], "correctAnswer": 1 }] });
    let qs = sanitize_response(&short.to_string(), "t", 5).unwrap();
    assert_shape(&qs);
    assert_eq!(qs[0].question, "Only one");
    assert_eq!(qs[4], Question::placeholder(5, "t"));
  }

  #[test]
  fn prompt_embeds_topic_count_and_raw_json_instruction() {
    let p = build_prompt(&Prompts::default(), "Volcanoes", 5);
    assert!(p.contains("\"Volcanoes\""));
    assert!(p.contains("5 multiple-choice"));
    assert!(p.contains("correctAnswer"));
    assert!(p.contains("no markdown formatting"));
    assert!(!p.contains("{topic}"));
  }

  #[test]
  fn blank_topic_is_invalid_input() {
    assert!(matches!(validate_topic("   "), Err(GenerationError::InvalidInput(_))));
    assert_eq!(validate_topic("  Rust ").unwrap(), "Rust");
  }
}
