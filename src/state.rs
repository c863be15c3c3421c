//! Application state shared by every handler.
//!
//! This module owns:
//!   - the quiz generator (prompt template + Ollama client + sanitizer)
//!   - the saved-quiz collection, loaded once at startup
//!   - the configuration the sessions are created with

use std::{sync::Arc, time::Duration};

use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::config::QuizConfig;
use crate::ollama::Ollama;
use crate::sanitizer::QuizService;
use crate::saved::{FileSlot, MemorySlot, SavedQuizzes, Slot};
use crate::session::QuizSession;

#[derive(Clone)]
pub struct AppState {
    pub generator: QuizService,
    pub saved: Arc<RwLock<SavedQuizzes>>,
    pub config: QuizConfig,
}

impl AppState {
    /// Build state from env: load config, build the Ollama client, load saved quizzes.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Result<Self, reqwest::Error> {
        let config = QuizConfig::from_env();
        let ollama = Ollama::from_env(Duration::from_secs(config.generation.timeout_secs))?;
        info!(
            target: "quiz_backend",
            base_url = %ollama.base_url,
            model = %ollama.model,
            saved_quizzes_path = %config.storage.saved_quizzes_path,
            countdown_secs = config.session.countdown_secs,
            "Generation service configured."
        );
        // An empty path keeps saved quizzes in memory for this process only.
        let slot: Box<dyn Slot> = if config.storage.saved_quizzes_path.is_empty() {
            Box::new(MemorySlot::default())
        } else {
            Box::new(FileSlot::new(&config.storage.saved_quizzes_path))
        };
        Ok(Self::new(config, ollama, slot))
    }

    pub fn new(config: QuizConfig, ollama: Ollama, slot: Box<dyn Slot>) -> Self {
        let generator = QuizService::new(ollama, config.prompts.clone(), config.generation.clone());
        let saved = SavedQuizzes::load(slot);
        Self {
            generator,
            saved: Arc::new(RwLock::new(saved)),
            config,
        }
    }

    /// A fresh session for a newly connected client.
    pub fn new_session(&self) -> QuizSession {
        QuizSession::new(self.config.session.countdown_secs)
    }
}
