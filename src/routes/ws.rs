//! WebSocket upgrade + per-client event loop.
//!
//! Each connection owns one `QuizSession`. A single `select!` loop serializes the three
//! event sources: client messages, countdown ticks, and the one outstanding generation
//! request. Ticks are only polled while the session reports a live countdown, and the
//! ticker is re-armed whenever a new countdown epoch starts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument};

use crate::domain::Question;
use crate::error::GenerationError;
use crate::logic::{finish_generation, handle_client_message, saved_msg, snapshot_msg, tick_msg};
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::session::Tick;
use crate::state::AppState;

type Generation = Result<Vec<Question>, GenerationError>;

enum Event {
  Client(Option<String>),
  Tick,
  Generated(Result<Generation, JoinError>),
}

/// One client connection as the session loop sees it: text frames in, protocol messages out.
#[async_trait]
pub trait Transport: Send {
  /// Next text frame; `None` once the client is gone. Must be cancel safe.
  async fn recv_text(&mut self) -> Option<String>;
  /// `false` once the client can no longer be reached.
  async fn send(&mut self, msg: &ServerWsMessage) -> bool;
}

#[async_trait]
impl Transport for WebSocket {
  async fn recv_text(&mut self) -> Option<String> {
    loop {
      match self.recv().await {
        Some(Ok(Message::Text(txt))) => return Some(txt),
        Some(Ok(Message::Close(_))) | None => return None,
        Some(Err(e)) => {
          error!(target: "quiz_backend", error = %e, "WS receive error");
          return None;
        }
        // Pings are answered by axum itself.
        Some(Ok(_)) => continue,
      }
    }
  }

  async fn send(&mut self, msg: &ServerWsMessage) -> bool {
    let out = serde_json::to_string(msg).unwrap_or_else(|e| {
      serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
    });
    match WebSocket::send(self, Message::Text(out)).await {
      Ok(()) => true,
      Err(e) => {
        error!(target: "quiz_backend", error = %e, "WS send error");
        false
      }
    }
  }
}

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "quiz_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| run_session(socket, state))
}

async fn wait_generation(pending: &mut Option<JoinHandle<Generation>>) -> Result<Generation, JoinError> {
  match pending {
    Some(handle) => handle.await,
    None => std::future::pending().await,
  }
}

async fn send_all<T: Transport>(conn: &mut T, msgs: Vec<ServerWsMessage>) -> bool {
  for msg in &msgs {
    if !conn.send(msg).await {
      return false;
    }
  }
  true
}

/// Drive one session until the client leaves. A pending generation is aborted on exit.
#[instrument(level = "info", skip(conn, state))]
pub async fn run_session<T: Transport>(mut conn: T, state: Arc<AppState>) {
  info!(target: "quiz_backend", "WebSocket connected");
  let mut session = state.new_session();
  let mut pending: Option<JoinHandle<Generation>> = None;
  let mut ticker = tokio::time::interval(Duration::from_secs(1));
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
  let mut armed: Option<u64> = None;

  let hello = vec![snapshot_msg(&state, &session).await, saved_msg(&state).await];
  if !send_all(&mut conn, hello).await {
    return;
  }

  loop {
    let active = session.active_countdown();
    if active != armed {
      if active.is_some() {
        ticker.reset();
      }
      armed = active;
    }

    let event = tokio::select! {
      msg = conn.recv_text() => Event::Client(msg),
      _ = ticker.tick(), if armed.is_some() => Event::Tick,
      res = wait_generation(&mut pending), if pending.is_some() => Event::Generated(res),
    };

    let replies = match event {
      Event::Client(None) => break,
      Event::Client(Some(txt)) => match serde_json::from_str::<ClientWsMessage>(&txt) {
        Ok(incoming) => {
          debug!(target: "quiz_backend", "WS received: {:?}", &incoming);
          let dispatch = handle_client_message(&state, &mut session, incoming).await;
          if let Some(topic) = dispatch.generate {
            let generator = state.generator.clone();
            pending = Some(tokio::spawn(async move { generator.generate_quiz(&topic).await }));
          }
          dispatch.replies
        }
        Err(e) => vec![ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }],
      },

      Event::Tick => match armed {
        Some(epoch) => match session.tick(epoch) {
          Tick::Ignored => continue,
          Tick::Running(_) => vec![tick_msg(&session)],
          Tick::Expired => vec![tick_msg(&session), snapshot_msg(&state, &session).await],
        },
        None => continue,
      },

      Event::Generated(res) => {
        pending = None;
        let result = res.unwrap_or_else(|e| {
          error!(target: "quiz_backend", error = %e, "Generation task failed");
          Err(GenerationError::Upstream { status: None, message: e.to_string(), body: String::new() })
        });
        finish_generation(&state, &mut session, result).await
      }
    };

    if !send_all(&mut conn, replies).await {
      break;
    }
  }

  if let Some(handle) = pending.take() {
    handle.abort();
  }
  info!(target: "quiz_backend", "WebSocket disconnected");
}
