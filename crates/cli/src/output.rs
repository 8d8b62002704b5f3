//! Terminal reporting for the strata CLI.
//!
//! Colored status lines, human-readable sizes and durations, and the stats
//! report printed after each build.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use strata_lib::Stats;

/// How `strata build` reports results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    self == OutputFormat::Json
  }
}

/// Kind of a status line; decides its glyph, color and stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
  Success,
  Error,
  Warning,
  Info,
}

impl Status {
  fn glyph(self) -> &'static str {
    match self {
      Status::Success => "✓",
      Status::Error => "✗",
      Status::Warning => "⚠",
      Status::Info => "•",
    }
  }

  fn stream(self) -> Stream {
    match self {
      Status::Error | Status::Warning => Stream::Stderr,
      Status::Success | Status::Info => Stream::Stdout,
    }
  }

  fn paint(self, text: &str) -> String {
    let stream = self.stream();
    match self {
      Status::Success => text.if_supports_color(stream, |t| t.green()).to_string(),
      Status::Error => text.if_supports_color(stream, |t| t.red()).to_string(),
      Status::Warning => text.if_supports_color(stream, |t| t.yellow()).to_string(),
      Status::Info => text.if_supports_color(stream, |t| t.blue()).to_string(),
    }
  }
}

fn status_line(status: Status, message: &str) {
  let glyph = status.paint(status.glyph());
  // Problems are colored in full, progress only by its glyph.
  let body = match status {
    Status::Error | Status::Warning => status.paint(message),
    Status::Success | Status::Info => message.to_string(),
  };
  match status.stream() {
    Stream::Stderr => eprintln!("{glyph} {body}"),
    _ => println!("{glyph} {body}"),
  }
}

/// Binary-prefixed size with one decimal above a kibibyte.
pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 3] = ["KB", "MB", "GB"];
  if bytes < 1024 {
    return format!("{bytes} B");
  }
  let mut size = bytes as f64 / 1024.0;
  let mut unit = 0;
  while size >= 1024.0 && unit + 1 < UNITS.len() {
    size /= 1024.0;
    unit += 1;
  }
  format!("{size:.1} {}", UNITS[unit])
}

pub fn format_duration(millis: u64) -> String {
  humantime::format_duration(Duration::from_millis(millis)).to_string()
}

pub fn print_success(message: &str) {
  status_line(Status::Success, message);
}

pub fn print_error(message: &str) {
  status_line(Status::Error, message);
}

pub fn print_warning(message: &str) {
  status_line(Status::Warning, message);
}

pub fn print_info(message: &str) {
  status_line(Status::Info, message);
}

/// An indented `label: value` detail line under a status line.
pub fn print_stat(label: &str, value: &str) {
  println!("  {}: {value}", label.if_supports_color(Stream::Stdout, |t| t.dimmed()));
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let rendered = serde_json::to_string_pretty(value).context("could not render stats as JSON")?;
  println!("{rendered}");
  Ok(())
}

/// Print one compilation's report.
pub fn print_stats(stats: &Stats) {
  let title = match &stats.name {
    Some(name) => format!("compiled {name}"),
    None => "compiled".to_string(),
  };
  if stats.has_errors() {
    print_error(&format!("{title} with {} error(s)", stats.errors.len()));
  } else {
    print_success(&title);
  }
  print_stat("hash", &stats.hash);
  print_stat("time", &format_duration(stats.duration_ms));
  for asset in &stats.assets {
    println!(
      "  {} {} ({}){}",
      "→".if_supports_color(Stream::Stdout, |t| t.dimmed()),
      asset.name,
      format_bytes(asset.size),
      if asset.emitted { "" } else { " [not emitted]" }
    );
  }
  for warning in &stats.warnings {
    print_warning(warning);
  }
  for error in &stats.errors {
    print_error(error);
  }
}
