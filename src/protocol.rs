//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Question, Quiz};
use crate::session::SessionSnapshot;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    SubmitTopic {
        topic: String,
    },
    SelectAnswer {
        index: usize,
    },
    Advance,
    Retreat,
    Restart,
    NewQuiz,
    SaveQuiz,
    LoadSaved {
        #[serde(rename = "quizId")]
        quiz_id: String,
    },
    DeleteSaved {
        #[serde(rename = "quizId")]
        quiz_id: String,
    },
    ListSaved,
    Share {
        #[serde(rename = "canShare", default)]
        can_share: bool,
        #[serde(default)]
        url: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session(SessionSnapshot),
    Tick {
        #[serde(rename = "timeLeft")]
        time_left: u32,
        clock: String,
        hurry: bool,
    },
    Saved {
        quizzes: Vec<SavedQuizOut>,
    },
    NativeShare {
        title: String,
        text: String,
        url: String,
    },
    CopyToClipboard {
        text: String,
    },
    Notice {
        message: String,
    },
    Error {
        message: String,
    },
}

/// Saved-quiz list entry (the home screen only needs a summary).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuizOut {
    pub id: String,
    pub topic: String,
    pub question_count: usize,
    pub created_at: i64,
}

impl From<&Quiz> for SavedQuizOut {
    fn from(q: &Quiz) -> Self {
        Self {
            id: q.id.clone(),
            topic: q.topic.clone(),
            question_count: q.len(),
            created_at: q.created_at,
        }
    }
}

//
// HTTP request/response DTOs
//

/// `topic` is kept loose so a non-string value is an input error, not a body rejection.
#[derive(Debug, Deserialize)]
pub struct GenerateQuizIn {
    #[serde(default)]
    pub topic: Option<Value>,
}

impl GenerateQuizIn {
    pub fn topic_str(&self) -> Option<&str> {
        self.topic.as_ref().and_then(Value::as_str)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateQuizOut {
    pub questions: Vec<Question>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_type_tags() {
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"select_answer","index":2}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::SelectAnswer { index: 2 }));
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"load_saved","quizId":"abc"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::LoadSaved { ref quiz_id } if quiz_id == "abc"));
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"share"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::Share { can_share: false, .. }));
    }

    #[test]
    fn tick_serializes_camel_case() {
        let out = serde_json::to_value(ServerWsMessage::Tick { time_left: 59, clock: "0:59".into(), hurry: true }).unwrap();
        assert_eq!(out["type"], "tick");
        assert_eq!(out["timeLeft"], 59);
    }

    #[test]
    fn topic_must_be_a_string() {
        let body: GenerateQuizIn = serde_json::from_str(r#"{"topic": 42}"#).unwrap();
        assert_eq!(body.topic_str(), None);
        let body: GenerateQuizIn = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(body.topic_str(), None);
        let body: GenerateQuizIn = serde_json::from_str(r#"{"topic": "Bees"}"#).unwrap();
        assert_eq!(body.topic_str(), Some("Bees"));
    }
}
