//! CLI output formatting utilities.
//!
//! Colored status lines, human-readable byte/duration formatting, and the
//! download progress line shown while a toolchain archive is fetched.

use std::io::{IsTerminal, Write};
use std::time::Duration;

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const INFO: &str = "•";
  pub const DOWNLOAD: &str = "↓";
}

pub fn format_bytes(bytes: u64) -> String {
  const KB: u64 = 1024;
  const MB: u64 = KB * 1024;
  const GB: u64 = MB * 1024;

  if bytes >= GB {
    format!("{:.1} GB", bytes as f64 / GB as f64)
  } else if bytes >= MB {
    format!("{:.1} MB", bytes as f64 / MB as f64)
  } else if bytes >= KB {
    format!("{:.1} KB", bytes as f64 / KB as f64)
  } else {
    format!("{} B", bytes)
  }
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// `12.0 MB / 80.0 MB`, or just the downloaded size when the total is unknown.
pub fn format_progress(done: u64, total: Option<u64>) -> String {
  match total {
    Some(total) => format!("{} / {}", format_bytes(done), format_bytes(total)),
    None => format_bytes(done),
  }
}

/// Single-line download progress on stderr, redrawn in place. Silent when
/// stderr is not a terminal.
pub struct DownloadProgress {
  enabled: bool,
  drawn: bool,
  last_shown: u64,
}

impl DownloadProgress {
  /// Redraw at most once per this many bytes.
  const STEP: u64 = 256 * 1024;

  pub fn new() -> Self {
    Self {
      enabled: std::io::stderr().is_terminal(),
      drawn: false,
      last_shown: 0,
    }
  }

  pub fn update(&mut self, done: u64, total: Option<u64>) {
    if !self.enabled {
      return;
    }
    let complete = total.is_some_and(|t| done >= t);
    if self.drawn && !complete && done.saturating_sub(self.last_shown) < Self::STEP {
      return;
    }
    self.last_shown = done;
    self.drawn = true;

    let mut stderr = std::io::stderr().lock();
    let _ = write!(
      stderr,
      "\r{} {}",
      symbols::DOWNLOAD.if_supports_color(Stream::Stderr, |s| s.cyan()),
      format_progress(done, total)
    );
    let _ = stderr.flush();
  }

  /// End the progress line, if one was drawn.
  pub fn finish(&mut self) {
    if self.drawn {
      eprintln!();
      self.drawn = false;
    }
  }
}

impl Default for DownloadProgress {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_format_bytes() {
    assert_eq!(format_bytes(500), "500 B");
    assert_eq!(format_bytes(1024), "1.0 KB");
    assert_eq!(format_bytes(1536), "1.5 KB");
    assert_eq!(format_bytes(1048576), "1.0 MB");
    assert_eq!(format_bytes(1073741824), "1.0 GB");
  }

  #[test]
  fn test_format_duration() {
    assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
    assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
  }

  #[test]
  fn test_format_progress() {
    assert_eq!(format_progress(1536, Some(1048576)), "1.5 KB / 1.0 MB");
    assert_eq!(format_progress(500, None), "500 B");
  }
}
