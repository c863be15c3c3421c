//! Saved quizzes: an insertion-ordered, id-keyed collection persisted to a single slot.
//!
//! The slot is read once at startup and rewritten in full on every add/delete.
//! The in-memory list only changes once the slot write has succeeded.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::domain::Quiz;
use crate::error::StoreError;

/// Name of the slot the collection lives in.
pub const SLOT_NAME: &str = "savedQuizzes";

/// A single named storage slot holding serialized text.
///
/// `read` runs once at startup, before the runtime serves anything; `write` runs inside
/// request handlers and must not block.
#[async_trait]
pub trait Slot: Send + Sync {
  fn read(&self) -> Result<Option<String>, StoreError>;
  async fn write(&self, contents: &str) -> Result<(), StoreError>;
}

/// File-backed slot.
pub struct FileSlot {
  path: PathBuf,
}

impl FileSlot {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  fn io_err(&self, source: std::io::Error) -> StoreError {
    StoreError::Io { path: self.path.display().to_string(), source }
  }
}

#[async_trait]
impl Slot for FileSlot {
  fn read(&self) -> Result<Option<String>, StoreError> {
    match std::fs::read_to_string(&self.path) {
      Ok(s) => Ok(Some(s)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(self.io_err(e)),
    }
  }

  async fn write(&self, contents: &str) -> Result<(), StoreError> {
    if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(dir).await.map_err(|e| self.io_err(e))?;
    }
    // Sibling tmp file, then rename into place.
    let tmp = self.path.with_extension("json.tmp");
    tokio::fs::write(&tmp, contents).await.map_err(|e| self.io_err(e))?;
    tokio::fs::rename(&tmp, &self.path).await.map_err(|e| self.io_err(e))
  }
}

/// In-memory slot, handy for tests and ephemeral runs.
#[derive(Default)]
pub struct MemorySlot {
  contents: Mutex<Option<String>>,
}

impl MemorySlot {
  pub fn with_contents(contents: &str) -> Self {
    Self { contents: Mutex::new(Some(contents.to_string())) }
  }

  pub fn contents(&self) -> Option<String> {
    self.contents.lock().ok().and_then(|c| c.clone())
  }
}

#[async_trait]
impl Slot for MemorySlot {
  fn read(&self) -> Result<Option<String>, StoreError> {
    let slot = self.contents.lock().map_err(|_| StoreError::Poisoned)?;
    Ok(slot.clone())
  }

  async fn write(&self, contents: &str) -> Result<(), StoreError> {
    let mut slot = self.contents.lock().map_err(|_| StoreError::Poisoned)?;
    *slot = Some(contents.to_string());
    Ok(())
  }
}

pub struct SavedQuizzes {
  quizzes: Vec<Arc<Quiz>>,
  slot: Box<dyn Slot>,
}

impl SavedQuizzes {
  /// Load from the slot. A missing slot is an empty collection; an unreadable one is
  /// logged and also treated as empty so the app still starts.
  #[instrument(level = "info", skip(slot))]
  pub fn load(slot: Box<dyn Slot>) -> Self {
    let quizzes = match slot.read() {
      Ok(Some(text)) => match serde_json::from_str::<Vec<Quiz>>(&text) {
        Ok(list) => dedup_by_id(list),
        Err(e) => {
          warn!(target: "quiz_backend", error = %e, slot = SLOT_NAME, "Saved quizzes are corrupt; starting empty");
          Vec::new()
        }
      },
      Ok(None) => Vec::new(),
      Err(e) => {
        warn!(target: "quiz_backend", error = %e, slot = SLOT_NAME, "Could not read saved quizzes; starting empty");
        Vec::new()
      }
    };
    info!(target: "quiz_backend", count = quizzes.len(), "Saved quizzes loaded");
    Self { quizzes, slot }
  }

  pub fn list(&self) -> &[Arc<Quiz>] {
    &self.quizzes
  }

  pub fn len(&self) -> usize {
    self.quizzes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.quizzes.is_empty()
  }

  pub fn contains(&self, id: &str) -> bool {
    self.quizzes.iter().any(|q| q.id == id)
  }

  pub fn get(&self, id: &str) -> Option<Arc<Quiz>> {
    self.quizzes.iter().find(|q| q.id == id).cloned()
  }

  /// Idempotent insert. Returns `Ok(false)` when the id was already present.
  /// On a failed write the collection is left as it was.
  #[instrument(level = "debug", skip(self, quiz), fields(id = %quiz.id))]
  pub async fn save(&mut self, quiz: Arc<Quiz>) -> Result<bool, StoreError> {
    if self.contains(&quiz.id) {
      debug!(target: "quiz_backend", "Quiz already saved");
      return Ok(false);
    }
    let mut next = self.quizzes.clone();
    next.push(quiz);
    self.commit(next).await?;
    Ok(true)
  }

  /// Remove by id. Returns `Ok(false)` (and writes nothing) when absent.
  #[instrument(level = "debug", skip(self))]
  pub async fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
    if !self.contains(id) {
      return Ok(false);
    }
    let next: Vec<Arc<Quiz>> = self.quizzes.iter().filter(|q| q.id != id).cloned().collect();
    self.commit(next).await?;
    Ok(true)
  }

  /// Write `next` to the slot, then adopt it.
  async fn commit(&mut self, next: Vec<Arc<Quiz>>) -> Result<(), StoreError> {
    let list: Vec<&Quiz> = next.iter().map(|q| q.as_ref()).collect();
    let text = serde_json::to_string(&list)?;
    if let Err(e) = self.slot.write(&text).await {
      warn!(target: "quiz_backend", error = %e, slot = SLOT_NAME, "Saved quizzes write failed; keeping previous list");
      return Err(e);
    }
    self.quizzes = next;
    Ok(())
  }
}

fn dedup_by_id(list: Vec<Quiz>) -> Vec<Arc<Quiz>> {
  let mut out: Vec<Arc<Quiz>> = Vec::with_capacity(list.len());
  for q in list {
    if !out.iter().any(|existing| existing.id == q.id) {
      out.push(Arc::new(q));
    }
  }
  out
}
