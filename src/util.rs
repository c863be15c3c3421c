//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// Other braces (e.g. a JSON example inside a prompt) are left untouched.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) {
    cut -= 1;
  }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

/// `m:ss` rendering of a countdown.
pub fn format_clock(secs: u32) -> String {
  format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn template_only_touches_known_keys() {
    let out = fill_template(r#"{"q": "{topic}"} x{count}"#, &[("topic", "Bees"), ("count", "5")]);
    assert_eq!(out, r#"{"q": "Bees"} x5"#);
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    let s = "ééééé";
    let t = trunc_for_log(s, 3);
    assert!(t.starts_with('é'));
    assert!(t.ends_with("(10 bytes total)"));
    assert_eq!(trunc_for_log("short", 10), "short");
  }

  #[test]
  fn clock_is_minutes_and_padded_seconds() {
    assert_eq!(format_clock(300), "5:00");
    assert_eq!(format_clock(61), "1:01");
    assert_eq!(format_clock(9), "0:09");
  }
}
