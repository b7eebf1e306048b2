//! Terminal reporting for cforge commands.
//!
//! Status lines go to stdout, except warnings and errors which go to stderr so
//! that `--output json` and artifact output stay machine-readable.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

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

/// Separates a target name from the arguments it is run with.
pub const RUN_ARROW: &str = "→";

#[derive(Debug, Clone, Copy)]
enum Status {
  Done,
  Failed,
  Warning,
  Step,
}

impl Status {
  fn marker(self) -> &'static str {
    match self {
      Status::Done => "✓",
      Status::Failed => "✗",
      Status::Warning => "!",
      Status::Step => "::",
    }
  }

  fn stream(self) -> Stream {
    match self {
      Status::Done | Status::Step => Stream::Stdout,
      Status::Failed | Status::Warning => Stream::Stderr,
    }
  }
}

fn status_line(status: Status, message: &str) {
  let stream = status.stream();
  let marker = status.marker();
  let marker = match status {
    Status::Done => marker.if_supports_color(stream, |s| s.green()).to_string(),
    Status::Failed => marker.if_supports_color(stream, |s| s.red()).to_string(),
    Status::Warning => marker.if_supports_color(stream, |s| s.yellow()).to_string(),
    Status::Step => marker.if_supports_color(stream, |s| s.cyan()).to_string(),
  };
  match stream {
    Stream::Stdout => println!("{} {}", marker, message),
    _ => eprintln!("{} {}", marker, message),
  }
}

/// Build durations: milliseconds below a second, then seconds with one
/// decimal, then minutes and whole seconds.
pub fn format_duration(duration: Duration) -> String {
  let millis = duration.as_millis();
  if millis < 1000 {
    return format!("{}ms", millis);
  }
  let secs = duration.as_secs();
  if secs < 60 {
    return format!("{:.1}s", duration.as_secs_f64());
  }
  format!("{}m {}s", secs / 60, secs % 60)
}

pub fn print_success(message: &str) {
  status_line(Status::Done, message);
}

pub fn print_error(message: &str) {
  status_line(Status::Failed, message);
}

pub fn print_warning(message: &str) {
  status_line(Status::Warning, message);
}

pub fn print_info(message: &str) {
  status_line(Status::Step, message);
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
