//! Core behaviors shared by the HTTP and WebSocket handlers.
//!
//! This includes:
//!   - topic validation + quiz generation for `POST /generate-quiz`
//!   - applying one client message to that client's session
//!   - completing a generation request and rendering ticks/snapshots
//!
//! Nothing here touches a socket; the WebSocket loop sends whatever comes back.

use tracing::{debug, info, instrument, warn};

use crate::domain::Question;
use crate::error::{GenerationError, SessionError};
use crate::protocol::{ClientWsMessage, SavedQuizOut, ServerWsMessage};
use crate::sanitizer::validate_topic;
use crate::session::{Advance, QuizSession, HURRY_THRESHOLD_SECS};
use crate::share::{SharePayload, ShareTarget};
use crate::state::AppState;
use crate::util::format_clock;

/// What the WebSocket loop should do after a client message.
#[derive(Debug, Default)]
pub struct Dispatch {
  pub replies: Vec<ServerWsMessage>,
  /// Set when the session entered `Generating`; the loop owns the request.
  pub generate: Option<String>,
}

impl Dispatch {
  fn reply(msg: ServerWsMessage) -> Self {
    Self { replies: vec![msg], generate: None }
  }
}

#[instrument(level = "info", skip(state))]
pub async fn generate_questions(state: &AppState, topic: Option<&str>) -> Result<Vec<Question>, GenerationError> {
  let topic = topic.ok_or_else(|| GenerationError::InvalidInput("Topic is required".into()))?;
  let topic = validate_topic(topic)?;
  state.generator.generate_quiz(topic).await
}

/// Share requests are relayed to the browser, which performs the platform action.
pub struct ClientShare {
  pub can_share: bool,
  pub outbox: Vec<ServerWsMessage>,
}

impl ShareTarget for ClientShare {
  fn native_share(&mut self, payload: &SharePayload) -> Result<(), String> {
    if !self.can_share {
      return Err("native share not supported by client".into());
    }
    self.outbox.push(ServerWsMessage::NativeShare {
      title: payload.title.clone(),
      text: payload.text.clone(),
      url: payload.url.clone(),
    });
    Ok(())
  }

  fn copy_to_clipboard(&mut self, text: &str) -> Result<(), String> {
    self.outbox.push(ServerWsMessage::CopyToClipboard { text: text.to_string() });
    Ok(())
  }
}

pub async fn snapshot_msg(state: &AppState, session: &QuizSession) -> ServerWsMessage {
  let is_saved = match session.quiz() {
    Some(q) => state.saved.read().await.contains(&q.id),
    None => false,
  };
  ServerWsMessage::Session(session.snapshot(is_saved))
}

pub async fn saved_msg(state: &AppState) -> ServerWsMessage {
  let saved = state.saved.read().await;
  ServerWsMessage::Saved { quizzes: saved.list().iter().map(|q| SavedQuizOut::from(q.as_ref())).collect() }
}

pub fn tick_msg(session: &QuizSession) -> ServerWsMessage {
  let time_left = session.countdown().remaining();
  ServerWsMessage::Tick { time_left, clock: format_clock(time_left), hurry: time_left <= HURRY_THRESHOLD_SECS }
}

fn error_msg(e: &SessionError) -> ServerWsMessage {
  ServerWsMessage::Error { message: e.to_string() }
}

/// Apply one client message. Rejected transitions become `error` replies; the session is unchanged.
#[instrument(level = "debug", skip(state, session), fields(phase = session.phase().name()))]
pub async fn handle_client_message(state: &AppState, session: &mut QuizSession, msg: ClientWsMessage) -> Dispatch {
  let result: Result<Dispatch, SessionError> = match msg {
    ClientWsMessage::Ping => Ok(Dispatch::reply(ServerWsMessage::Pong)),

    ClientWsMessage::SubmitTopic { topic } => session.begin_generation(&topic).map(|topic| {
      info!(target: "session", %topic, "Generation requested");
      Dispatch { replies: vec![], generate: Some(topic) }
    }),

    ClientWsMessage::SelectAnswer { index } => session.select_answer(index).map(|_| Dispatch::default()),

    ClientWsMessage::Advance => session.advance().map(|step| {
      if let Advance::Finished(score) = step {
        debug!(target: "session", score, "Finished by advancing past the last question");
      }
      Dispatch::default()
    }),

    ClientWsMessage::Retreat => session.retreat().map(|_| Dispatch::default()),

    ClientWsMessage::Restart => session.restart().map(|_| Dispatch::default()),

    ClientWsMessage::NewQuiz => session.go_home().map(|_| Dispatch::default()),

    ClientWsMessage::SaveQuiz => {
      let saved = {
        let mut store = state.saved.write().await;
        session.save_current_quiz(&mut store).await
      };
      match saved {
        Ok(true) => Ok(Dispatch::reply(ServerWsMessage::Notice { message: "Quiz saved for later.".into() })),
        Ok(false) => Ok(Dispatch::reply(ServerWsMessage::Notice { message: "Quiz is already saved.".into() })),
        Err(e) => Err(e),
      }
    }

    ClientWsMessage::LoadSaved { quiz_id } => {
      let store = state.saved.read().await;
      session.load_saved_quiz(&store, &quiz_id).map(|_| Dispatch::default())
    }

    ClientWsMessage::DeleteSaved { quiz_id } => {
      let deleted = {
        let mut store = state.saved.write().await;
        session.delete_saved_quiz(&mut store, &quiz_id).await
      };
      if let Ok(false) = deleted {
        debug!(target: "session", %quiz_id, "Delete of unknown saved quiz ignored");
      }
      match deleted {
        Ok(_) => Ok(Dispatch::reply(saved_msg(state).await)),
        Err(e) => Err(e),
      }
    }

    ClientWsMessage::ListSaved => Ok(Dispatch::reply(saved_msg(state).await)),

    ClientWsMessage::Share { can_share, url } => {
      let mut target = ClientShare { can_share, outbox: Vec::new() };
      session.share_result(&mut target, &url).map(|outcome| {
        let mut replies = target.outbox;
        replies.push(ServerWsMessage::Notice { message: outcome.user_message() });
        Dispatch { replies, generate: None }
      })
    }
  };

  match result {
    Ok(mut d) => {
      // Every state-changing message is followed by a fresh snapshot.
      if d.generate.is_some() || !matches!(d.replies.first(), Some(ServerWsMessage::Pong | ServerWsMessage::Saved { .. })) {
        d.replies.push(snapshot_msg(state, session).await);
      }
      d
    }
    Err(e) => {
      warn!(target: "session", error = %e, "Client message rejected");
      Dispatch::reply(error_msg(&e))
    }
  }
}

/// Feed a finished generation request back into the session.
pub async fn finish_generation(
  state: &AppState,
  session: &mut QuizSession,
  result: Result<Vec<Question>, GenerationError>,
) -> Vec<ServerWsMessage> {
  let mut out = Vec::new();
  if let Err(e) = session.complete_generation(result) {
    out.push(error_msg(&e));
  }
  out.push(snapshot_msg(state, session).await);
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::QuizConfig;
  use crate::ollama::Ollama;
  use crate::saved::MemorySlot;
  use crate::session::Phase;
  use std::time::Duration;

  fn state() -> AppState {
    // Nothing listens here; these tests never reach the network.
    let ollama = Ollama::new("http://127.0.0.1:9".into(), "m".into(), Duration::from_secs(1)).unwrap();
    AppState::new(QuizConfig::default(), ollama, Box::new(MemorySlot::default()))
  }

  fn questions() -> Vec<Question> {
    (1..=5).map(|i| Question::placeholder(i, "Bees")).collect()
  }

  async fn playing(state: &AppState) -> QuizSession {
    let mut s = state.new_session();
    let d = handle_client_message(state, &mut s, ClientWsMessage::SubmitTopic { topic: "Bees".into() }).await;
    assert_eq!(d.generate.as_deref(), Some("Bees"));
    finish_generation(state, &mut s, Ok(questions())).await;
    s
  }

  #[tokio::test]
  async fn submit_asks_loop_to_generate_and_reports_generating() {
    let st = state();
    let mut s = st.new_session();
    let d = handle_client_message(&st, &mut s, ClientWsMessage::SubmitTopic { topic: " Bees ".into() }).await;
    assert_eq!(d.generate.as_deref(), Some("Bees"));
    assert!(matches!(d.replies.last(), Some(ServerWsMessage::Session(snap)) if snap.phase == Phase::Generating));

    let again = handle_client_message(&st, &mut s, ClientWsMessage::SubmitTopic { topic: "Wasps".into() }).await;
    assert!(again.generate.is_none());
    assert!(matches!(again.replies[0], ServerWsMessage::Error { .. }));
  }

  #[tokio::test]
  async fn failed_generation_reports_error_and_home_snapshot() {
    let st = state();
    let mut s = st.new_session();
    handle_client_message(&st, &mut s, ClientWsMessage::SubmitTopic { topic: "Bees".into() }).await;
    let out = finish_generation(&st, &mut s, Err(GenerationError::Schema("x".into()))).await;
    assert!(matches!(out[0], ServerWsMessage::Error { .. }));
    assert!(matches!(&out[1], ServerWsMessage::Session(snap) if snap.phase == Phase::Home && snap.error.is_some()));
  }

  #[tokio::test]
  async fn save_then_list_then_delete() {
    let st = state();
    let mut s = playing(&st).await;
    let d = handle_client_message(&st, &mut s, ClientWsMessage::SaveQuiz).await;
    assert!(matches!(&d.replies[0], ServerWsMessage::Notice { message } if message.contains("saved")));
    assert!(matches!(d.replies.last(), Some(ServerWsMessage::Session(snap)) if snap.is_saved));

    let d = handle_client_message(&st, &mut s, ClientWsMessage::ListSaved).await;
    let id = match &d.replies[0] {
      ServerWsMessage::Saved { quizzes } => {
        assert_eq!(quizzes.len(), 1);
        quizzes[0].id.clone()
      }
      other => panic!("unexpected {:?}", other),
    };

    let d = handle_client_message(&st, &mut s, ClientWsMessage::DeleteSaved { quiz_id: "nope".into() }).await;
    assert!(matches!(&d.replies[0], ServerWsMessage::Saved { quizzes } if quizzes.len() == 1));
    let d = handle_client_message(&st, &mut s, ClientWsMessage::DeleteSaved { quiz_id: id }).await;
    assert!(matches!(&d.replies[0], ServerWsMessage::Saved { quizzes } if quizzes.is_empty()));
  }

  #[tokio::test]
  async fn share_without_native_support_copies_to_clipboard() {
    let st = state();
    let mut s = playing(&st).await;
    s.score_and_finish().unwrap();
    let d = handle_client_message(&st, &mut s, ClientWsMessage::Share { can_share: false, url: "http://quiz".into() }).await;
    assert!(matches!(&d.replies[0], ServerWsMessage::CopyToClipboard { text } if text.contains("Play here: http://quiz")));

    let d = handle_client_message(&st, &mut s, ClientWsMessage::Share { can_share: true, url: String::new() }).await;
    assert!(matches!(&d.replies[0], ServerWsMessage::NativeShare { text, .. } if text.contains("on the \"Bees\" quiz")));
  }

  #[tokio::test]
  async fn unanswered_advance_is_an_error_reply() {
    let st = state();
    let mut s = playing(&st).await;
    let d = handle_client_message(&st, &mut s, ClientWsMessage::Advance).await;
    assert!(matches!(&d.replies[0], ServerWsMessage::Error { message } if message.contains("Select an answer")));
    assert_eq!(s.index(), 0);
  }

  #[tokio::test]
  async fn http_path_rejects_missing_topic_before_upstream() {
    let st = state();
    assert!(matches!(generate_questions(&st, None).await, Err(GenerationError::InvalidInput(_))));
    assert!(matches!(generate_questions(&st, Some("  ")).await, Err(GenerationError::InvalidInput(_))));
  }
}
