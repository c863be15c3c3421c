//! Quiz session state machine.
//!
//! One `QuizSession` is one client's play-through context:
//!
//! ```text
//!   Home --submit--> Generating --ok--> Playing --last advance / countdown 0--> Results
//!    ^                   |                 |                                     |  |
//!    +------failure------+                 +--------------go_home----------------+  |
//!    ^                                                                              |
//!    +--------------------------------------go_home---------------------------------+
//!                                     Playing <------------restart------------------+
//! ```
//!
//! All mutation goes through the methods below. The countdown is owned by the session
//! and tagged with an epoch: every transition out of `Playing` stops it before returning,
//! and a tick carrying an old epoch is ignored, so a late tick can never touch a newer
//! play-through.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::domain::{Question, Quiz, OPTION_COUNT};
use crate::error::{GenerationError, SessionError};
use crate::sanitizer::QuizGenerator;
use crate::saved::SavedQuizzes;
use crate::share::{self, SharePayload, ShareOutcome, ShareTarget};
use crate::util::format_clock;

/// Seconds a fresh countdown starts with unless configured otherwise.
pub const DEFAULT_COUNTDOWN_SECS: u32 = 300;

/// At or below this many seconds the client should warn the player.
pub const HURRY_THRESHOLD_SECS: u32 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Home,
  Generating,
  Playing,
  Results,
}

impl Phase {
  pub fn name(self) -> &'static str {
    match self {
      Phase::Home => "home",
      Phase::Generating => "generating",
      Phase::Playing => "playing",
      Phase::Results => "results",
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
  /// Stale epoch, stopped countdown, or not playing.
  Ignored,
  Running(u32),
  /// Reached zero; the session has been scored and moved to `Results`.
  Expired,
}

#[derive(Clone, Debug)]
pub struct Countdown {
  budget: u32,
  remaining: u32,
  epoch: u64,
  running: bool,
}

impl Countdown {
  pub fn new(budget: u32) -> Self {
    Self { budget, remaining: budget, epoch: 0, running: false }
  }

  /// Reset to the full budget under a new epoch.
  fn start(&mut self) -> u64 {
    self.epoch += 1;
    self.remaining = self.budget;
    self.running = true;
    self.epoch
  }

  fn stop(&mut self) {
    self.running = false;
  }

  fn tick(&mut self, epoch: u64) -> Tick {
    if !self.running || epoch != self.epoch {
      return Tick::Ignored;
    }
    self.remaining = self.remaining.saturating_sub(1);
    if self.remaining == 0 {
      self.running = false;
      Tick::Expired
    } else {
      Tick::Running(self.remaining)
    }
  }

  pub fn remaining(&self) -> u32 {
    self.remaining
  }

  pub fn epoch(&self) -> u64 {
    self.epoch
  }

  pub fn is_running(&self) -> bool {
    self.running
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
  Moved(usize),
  Finished(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
  Perfect,
  Great,
  Good,
  KeepPracticing,
}

impl Verdict {
  pub fn from_score(score: usize, total: usize) -> Self {
    if total > 0 && score == total {
      Verdict::Perfect
    } else if score * 10 >= total * 7 {
      Verdict::Great
    } else if score * 2 >= total {
      Verdict::Good
    } else {
      Verdict::KeepPracticing
    }
  }

  pub fn message(self) -> &'static str {
    match self {
      Verdict::Perfect => "Perfect score! You're an expert! 🏆",
      Verdict::Great => "Great job! You know your stuff! 🌟",
      Verdict::Good => "Good effort! Keep learning! 📚",
      Verdict::KeepPracticing => "Keep practicing! You'll get there! 💪",
    }
  }
}

/// One row of the post-quiz review.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
  pub number: usize,
  pub question: String,
  pub your_answer: Option<String>,
  pub correct_answer: String,
  pub is_correct: bool,
  pub explanation: String,
}

/// A question as shown while playing: no correct answer, no explanation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
  pub id: u32,
  pub question: String,
  pub options: Vec<String>,
}

impl From<&Question> for QuestionView {
  fn from(q: &Question) -> Self {
    Self { id: q.id, question: q.question.clone(), options: q.options.to_vec() }
  }
}

/// Serializable view of the whole session for the client.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
  pub phase: Phase,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub quiz_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub topic: Option<String>,
  pub question_index: usize,
  pub total_questions: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub progress: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub question: Option<QuestionView>,
  pub selected: Option<u8>,
  pub can_advance: bool,
  pub can_retreat: bool,
  pub is_last_question: bool,
  pub time_left: u32,
  pub clock: String,
  pub hurry: bool,
  pub is_saved: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub score: Option<usize>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub verdict: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub review: Option<Vec<ReviewItem>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

pub struct QuizSession {
  phase: Phase,
  quiz: Option<Arc<Quiz>>,
  index: usize,
  answers: Vec<Option<u8>>,
  score: Option<usize>,
  countdown: Countdown,
  pending_topic: Option<String>,
  last_error: Option<String>,
}

impl Default for QuizSession {
  fn default() -> Self {
    Self::new(DEFAULT_COUNTDOWN_SECS)
  }
}

impl QuizSession {
  pub fn new(countdown_secs: u32) -> Self {
    Self {
      phase: Phase::Home,
      quiz: None,
      index: 0,
      answers: Vec::new(),
      score: None,
      countdown: Countdown::new(countdown_secs),
      pending_topic: None,
      last_error: None,
    }
  }

  // --- accessors ---

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn quiz(&self) -> Option<&Arc<Quiz>> {
    self.quiz.as_ref()
  }

  pub fn index(&self) -> usize {
    self.index
  }

  pub fn answers(&self) -> &[Option<u8>] {
    &self.answers
  }

  /// Only meaningful in `Results`.
  pub fn score(&self) -> Option<usize> {
    self.score
  }

  pub fn countdown(&self) -> &Countdown {
    &self.countdown
  }

  pub fn last_error(&self) -> Option<&str> {
    self.last_error.as_deref()
  }

  pub fn current_question(&self) -> Option<&Question> {
    self.quiz.as_ref().and_then(|q| q.questions.get(self.index))
  }

  fn require(&self, phase: Phase, operation: &'static str) -> Result<(), SessionError> {
    if self.phase != phase {
      return Err(SessionError::WrongPhase { operation, phase: self.phase.name() });
    }
    Ok(())
  }

  // --- generation ---

  /// Home -> Generating. Returns the trimmed topic to hand to the generator.
  #[instrument(level = "info", skip(self), fields(phase = self.phase.name()))]
  pub fn begin_generation(&mut self, topic: &str) -> Result<String, SessionError> {
    if self.phase == Phase::Generating {
      return Err(SessionError::AlreadyGenerating);
    }
    self.require(Phase::Home, "submit_topic")?;
    let topic = topic.trim();
    if topic.is_empty() {
      return Err(SessionError::EmptyTopic);
    }
    self.phase = Phase::Generating;
    self.pending_topic = Some(topic.to_string());
    self.last_error = None;
    Ok(topic.to_string())
  }

  /// Generating -> Playing on success, back to Home with a visible error on failure.
  #[instrument(level = "info", skip(self, result), fields(ok = result.is_ok()))]
  pub fn complete_generation(
    &mut self,
    result: Result<Vec<Question>, GenerationError>,
  ) -> Result<Arc<Quiz>, SessionError> {
    self.require(Phase::Generating, "complete_generation")?;
    let topic = self.pending_topic.take().unwrap_or_default();
    match result {
      Ok(questions) if !questions.is_empty() => {
        let quiz = Quiz::new(&topic, questions);
        info!(target: "session", quiz_id = %quiz.id, %topic, "Quiz ready");
        self.start_play(quiz.clone());
        Ok(quiz)
      }
      Ok(_) => self.fail_generation(&topic, "Generated quiz had no questions. Please try again.".into()),
      Err(e) => {
        warn!(target: "session", %topic, kind = e.kind(), error = %e, "Quiz generation failed");
        let message = match e {
          GenerationError::InvalidInput(msg) => msg,
          _ => "Failed to generate quiz. Please make sure the model service is running and try again.".into(),
        };
        self.fail_generation(&topic, message)
      }
    }
  }

  fn fail_generation(&mut self, topic: &str, message: String) -> Result<Arc<Quiz>, SessionError> {
    debug!(target: "session", %topic, "Back to home after failed generation");
    self.phase = Phase::Home;
    self.last_error = Some(message.clone());
    Err(SessionError::GenerationFailed(message))
  }

  /// Whole submit path in one call: guard, generate, transition.
  pub async fn submit_topic<G: QuizGenerator>(
    &mut self,
    generator: &G,
    topic: &str,
  ) -> Result<Arc<Quiz>, SessionError> {
    let topic = self.begin_generation(topic)?;
    let result = generator.generate(&topic).await;
    self.complete_generation(result)
  }

  /// Fresh answers and a fresh countdown against `quiz`.
  fn start_play(&mut self, quiz: Arc<Quiz>) {
    self.answers = vec![None; quiz.len()];
    self.quiz = Some(quiz);
    self.index = 0;
    self.score = None;
    self.last_error = None;
    let epoch = self.countdown.start();
    self.phase = Phase::Playing;
    debug!(target: "session", epoch, "Countdown started");
  }

  // --- playing ---

  pub fn select_answer(&mut self, option: usize) -> Result<(), SessionError> {
    self.require(Phase::Playing, "select_answer")?;
    if option >= OPTION_COUNT {
      return Err(SessionError::InvalidOption(option));
    }
    if let Some(slot) = self.answers.get_mut(self.index) {
      *slot = Some(option as u8);
    }
    Ok(())
  }

  pub fn advance(&mut self) -> Result<Advance, SessionError> {
    self.require(Phase::Playing, "advance")?;
    if self.answers.get(self.index).copied().flatten().is_none() {
      return Err(SessionError::Unanswered);
    }
    if self.index + 1 < self.answers.len() {
      self.index += 1;
      Ok(Advance::Moved(self.index))
    } else {
      Ok(Advance::Finished(self.finish()))
    }
  }

  /// Previous question; a no-op at the first one. Recorded answers are kept.
  pub fn retreat(&mut self) -> Result<usize, SessionError> {
    self.require(Phase::Playing, "retreat")?;
    self.index = self.index.saturating_sub(1);
    Ok(self.index)
  }

  /// Score by exact index equality; unanswered never counts. Stops the countdown.
  pub fn score_and_finish(&mut self) -> Result<usize, SessionError> {
    self.require(Phase::Playing, "finish")?;
    Ok(self.finish())
  }

  #[instrument(level = "info", skip(self))]
  fn finish(&mut self) -> usize {
    self.countdown.stop();
    let score = match &self.quiz {
      Some(quiz) => quiz
        .questions
        .iter()
        .zip(&self.answers)
        .filter(|(q, a)| **a == Some(q.correct_answer))
        .count(),
      None => 0,
    };
    self.score = Some(score);
    self.phase = Phase::Results;
    info!(target: "session", score, total = self.answers.len(), "Quiz finished");
    score
  }

  /// One countdown second. At zero the session is scored with whatever was answered.
  pub fn tick(&mut self, epoch: u64) -> Tick {
    if self.phase != Phase::Playing {
      self.countdown.stop();
      return Tick::Ignored;
    }
    let outcome = self.countdown.tick(epoch);
    if outcome == Tick::Expired {
      info!(target: "session", "Time is up");
      self.finish();
    }
    outcome
  }

  /// Countdown is live and should be ticking under `epoch`.
  pub fn active_countdown(&self) -> Option<u64> {
    (self.phase == Phase::Playing && self.countdown.is_running()).then(|| self.countdown.epoch())
  }

  // --- leaving results / abandoning ---

  /// Results -> Playing on the same quiz with fresh answers and countdown.
  pub fn restart(&mut self) -> Result<(), SessionError> {
    self.require(Phase::Results, "restart")?;
    let quiz = self.quiz.clone().ok_or(SessionError::NoQuiz)?;
    self.start_play(quiz);
    Ok(())
  }

  /// Playing/Results -> Home. Drops the quiz and stops the countdown.
  pub fn go_home(&mut self) -> Result<(), SessionError> {
    match self.phase {
      Phase::Playing | Phase::Results => {
        self.countdown.stop();
        self.quiz = None;
        self.answers.clear();
        self.index = 0;
        self.score = None;
        self.phase = Phase::Home;
        Ok(())
      }
      Phase::Home => Ok(()),
      Phase::Generating => Err(SessionError::WrongPhase { operation: "new_quiz", phase: self.phase.name() }),
    }
  }

  // --- saved quizzes ---

  /// Idempotent. `Ok(false)` when the quiz was already saved.
  pub async fn save_current_quiz(&self, saved: &mut SavedQuizzes) -> Result<bool, SessionError> {
    let quiz = self.quiz.clone().ok_or(SessionError::NoQuiz)?;
    Ok(saved.save(quiz).await?)
  }

  pub fn load_saved_quiz(&mut self, saved: &SavedQuizzes, id: &str) -> Result<Arc<Quiz>, SessionError> {
    self.require(Phase::Home, "load_saved")?;
    let quiz = saved.get(id).ok_or_else(|| SessionError::NotFound(id.to_string()))?;
    self.start_play(quiz.clone());
    Ok(quiz)
  }

  /// `Ok(false)` when nothing matched.
  pub async fn delete_saved_quiz(&self, saved: &mut SavedQuizzes, id: &str) -> Result<bool, SessionError> {
    Ok(saved.delete(id).await?)
  }

  // --- results ---

  pub fn share_result(&self, target: &mut dyn ShareTarget, url: &str) -> Result<ShareOutcome, SessionError> {
    self.require(Phase::Results, "share")?;
    let quiz = self.quiz.as_ref().ok_or(SessionError::NoQuiz)?;
    let payload = SharePayload::for_result(self.score.unwrap_or(0), quiz.len(), &quiz.topic, url);
    Ok(share::share(target, &payload))
  }

  pub fn verdict(&self) -> Option<Verdict> {
    let quiz = self.quiz.as_ref()?;
    let score = self.score?;
    (self.phase == Phase::Results).then(|| Verdict::from_score(score, quiz.len()))
  }

  pub fn review(&self) -> Option<Vec<ReviewItem>> {
    if self.phase != Phase::Results {
      return None;
    }
    let quiz = self.quiz.as_ref()?;
    let items = quiz
      .questions
      .iter()
      .zip(&self.answers)
      .enumerate()
      .map(|(i, (q, answer))| ReviewItem {
        number: i + 1,
        question: q.question.clone(),
        your_answer: answer.and_then(|a| q.option_text(a)).map(String::from),
        correct_answer: q.correct_text().to_string(),
        is_correct: *answer == Some(q.correct_answer),
        explanation: q.explanation.clone(),
      })
      .collect();
    Some(items)
  }

  pub fn snapshot(&self, is_saved: bool) -> SessionSnapshot {
    let total = self.quiz.as_ref().map(|q| q.len()).unwrap_or(0);
    let playing = self.phase == Phase::Playing;
    let selected = self.answers.get(self.index).copied().flatten();
    let remaining = self.countdown.remaining();
    SessionSnapshot {
      phase: self.phase,
      quiz_id: self.quiz.as_ref().map(|q| q.id.clone()),
      topic: self.quiz.as_ref().map(|q| q.topic.clone()).or_else(|| self.pending_topic.clone()),
      question_index: self.index,
      total_questions: total,
      progress: playing.then(|| format!("Question {} of {}", self.index + 1, total)),
      question: if playing { self.current_question().map(QuestionView::from) } else { None },
      selected: if playing { selected } else { None },
      can_advance: playing && selected.is_some(),
      can_retreat: playing && self.index > 0,
      is_last_question: playing && self.index + 1 == total,
      time_left: remaining,
      clock: format_clock(remaining),
      hurry: playing && remaining <= HURRY_THRESHOLD_SECS,
      is_saved,
      score: if self.phase == Phase::Results { self.score } else { None },
      verdict: self.verdict().map(|v| v.message().to_string()),
      review: self.review(),
      error: self.last_error.clone(),
    }
  }
}
