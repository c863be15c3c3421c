//! Result sharing: fixed message template, native share first, clipboard as fallback.

use tracing::{info, warn};

pub const SHARE_TITLE: &str = "AI Quiz Result";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharePayload {
  pub title: String,
  pub text: String,
  pub url: String,
}

impl SharePayload {
  pub fn for_result(score: usize, total: usize, topic: &str, url: &str) -> Self {
    Self {
      title: SHARE_TITLE.to_string(),
      text: share_text(score, total, topic),
      url: url.to_string(),
    }
  }

  /// What goes on the clipboard when native sharing is not possible.
  pub fn clipboard_text(&self) -> String {
    if self.url.is_empty() {
      self.text.clone()
    } else {
      format!("{}\n\nPlay here: {}", self.text, self.url)
    }
  }
}

pub fn share_text(score: usize, total: usize, topic: &str) -> String {
  format!("🎯 I scored {}/{} on the \"{}\" quiz! Can you beat my score?", score, total, topic)
}

/// Platform capabilities. Both are best-effort.
pub trait ShareTarget {
  /// `Err` when native sharing is absent or failed.
  fn native_share(&mut self, payload: &SharePayload) -> Result<(), String>;
  fn copy_to_clipboard(&mut self, text: &str) -> Result<(), String>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShareOutcome {
  Shared,
  Copied,
  Failed(String),
}

impl ShareOutcome {
  pub fn user_message(&self) -> String {
    match self {
      ShareOutcome::Shared => "Result shared!".into(),
      ShareOutcome::Copied => "Result copied to clipboard! Share it with your friends.".into(),
      ShareOutcome::Failed(reason) => format!("Could not share result: {}", reason),
    }
  }
}

pub fn share(target: &mut dyn ShareTarget, payload: &SharePayload) -> ShareOutcome {
  match target.native_share(payload) {
    Ok(()) => {
      info!(target: "session", "Result shared natively");
      return ShareOutcome::Shared;
    }
    Err(reason) => info!(target: "session", %reason, "Native share unavailable, falling back to clipboard"),
  }
  match target.copy_to_clipboard(&payload.clipboard_text()) {
    Ok(()) => ShareOutcome::Copied,
    Err(reason) => {
      warn!(target: "session", %reason, "Failed to copy result to clipboard");
      ShareOutcome::Failed(reason)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Default)]
  struct Recorder {
    native_ok: bool,
    clipboard_ok: bool,
    native: Vec<SharePayload>,
    copied: Vec<String>,
  }

  impl ShareTarget for Recorder {
    fn native_share(&mut self, payload: &SharePayload) -> Result<(), String> {
      if !self.native_ok {
        return Err("unsupported".into());
      }
      self.native.push(payload.clone());
      Ok(())
    }
    fn copy_to_clipboard(&mut self, text: &str) -> Result<(), String> {
      if !self.clipboard_ok {
        return Err("denied".into());
      }
      self.copied.push(text.to_string());
      Ok(())
    }
  }

  #[test]
  fn template_embeds_score_total_and_topic() {
    assert_eq!(
      share_text(4, 5, "Astronomy"),
      "🎯 I scored 4/5 on the \"Astronomy\" quiz! Can you beat my score?"
    );
  }

  #[test]
  fn native_share_wins_when_available() {
    let mut r = Recorder { native_ok: true, clipboard_ok: true, ..Default::default() };
    let p = SharePayload::for_result(3, 5, "Bees", "http://x");
    assert_eq!(share(&mut r, &p), ShareOutcome::Shared);
    assert_eq!(r.native.len(), 1);
    assert!(r.copied.is_empty());
  }

  #[test]
  fn falls_back_to_clipboard_with_link() {
    let mut r = Recorder { clipboard_ok: true, ..Default::default() };
    let p = SharePayload::for_result(3, 5, "Bees", "http://x");
    assert_eq!(share(&mut r, &p), ShareOutcome::Copied);
    assert!(r.copied[0].ends_with("\n\nPlay here: http://x"));
  }

  #[test]
  fn total_failure_is_reported_not_raised() {
    let mut r = Recorder::default();
    let p = SharePayload::for_result(0, 5, "Bees", "");
    let outcome = share(&mut r, &p);
    assert_eq!(outcome, ShareOutcome::Failed("denied".into()));
    assert!(outcome.user_message().contains("denied"));
  }
}
