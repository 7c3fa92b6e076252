//! CLI output formatting utilities.

use std::time::Duration;

use owo_colors::OwoColorize;

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const INFO: &str = "•";
  pub const MODIFY: &str = "~";
}

pub fn print_error(message: &str) {
  eprintln!("{} {}", format!("{} error:", symbols::ERROR).red().bold(), message);
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    format!("{}m {}s", secs / 60, secs % 60)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{millis}ms")
  }
}
