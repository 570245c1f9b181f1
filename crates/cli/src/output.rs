//! CLI output formatting utilities.
//!
//! Colored status lines, phase report rendering and JSON output.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use metabuild_lib::phase::{PhaseReport, RequestOutcome};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

pub fn truncate_hash(hash: &str) -> &str {
  let len = hash.len().min(12);
  &hash[..len]
}

pub fn format_duration(duration: Duration) -> String {
  if duration.as_secs() == 0 {
    return format!("{}ms", duration.subsec_millis());
  }
  // Sub-millisecond precision is noise here.
  humantime::format_duration(Duration::from_millis(duration.as_millis() as u64)).to_string()
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

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
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

/// Render one phase report as text.
pub fn print_report(report: &PhaseReport) {
  let executed = report.stats.executed_count();
  let summary = format!(
    "{}: {} executed, {} cached, {} suppressed",
    report.phase, executed, report.stats.cached, report.stats.suppressed
  );
  if report.is_success() {
    print_success(&summary);
  } else {
    print_warning(&summary);
  }

  for request in &report.requests {
    match &request.outcome {
      RequestOutcome::Succeeded { .. } => {
        println!("  {} {}", symbols::ARROW.if_supports_color(Stream::Stdout, |s| s.dimmed()), request.description);
      }
      RequestOutcome::Suppressed { message } => {
        print_warning(&format!("{} ({}): {}", request.description, request.key, message));
      }
      RequestOutcome::Failed { reason } => {
        print_error(&format!("{} ({}): {}", request.description, request.key, reason));
      }
    }
  }

  for failure in &report.hook_failures {
    print_warning(&format!(
      "build step '{}' failed {} {}: {}",
      failure.step, failure.point, report.phase, failure.message
    ));
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_hash() {
    assert_eq!(truncate_hash("abcdef123456789"), "abcdef123456");
    assert_eq!(truncate_hash("short"), "short");
    assert_eq!(truncate_hash(""), "");
  }

  #[test]
  fn test_format_duration() {
    assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
    assert_eq!(format_duration(Duration::from_millis(1500)), "1s 500ms");
    assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
  }
}
