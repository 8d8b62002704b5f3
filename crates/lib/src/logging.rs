//! Infrastructure logging.
//!
//! A named logger handed to plugins through the compiler. It forwards to
//! `tracing` and filters by the configured `infrastructureLogging.level`.
//! With `debug` enabled every level is let through.

use tracing::{debug, error, info, trace, warn};

use crate::config::{InfrastructureLogging, LogLevel};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfrastructureLogger {
  name: String,
  level: LogLevel,
  debug: bool,
}

impl InfrastructureLogger {
  pub fn new(name: impl Into<String>, config: &InfrastructureLogging) -> Self {
    Self {
      name: name.into(),
      level: config.level.unwrap_or(LogLevel::Info),
      debug: config.debug.unwrap_or(false),
    }
  }

  /// A logger reporting under `parent/child`, with the same filter.
  pub fn child(&self, name: &str) -> Self {
    Self {
      name: format!("{}/{}", self.name, name),
      ..self.clone()
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn level(&self) -> LogLevel {
    self.level
  }

  pub fn enabled(&self, level: LogLevel) -> bool {
    level != LogLevel::None && (self.debug || level <= self.level)
  }

  pub fn error(&self, message: &str) {
    if self.enabled(LogLevel::Error) {
      error!(logger = %self.name, "{message}");
    }
  }

  pub fn warn(&self, message: &str) {
    if self.enabled(LogLevel::Warn) {
      warn!(logger = %self.name, "{message}");
    }
  }

  pub fn info(&self, message: &str) {
    if self.enabled(LogLevel::Info) {
      info!(logger = %self.name, "{message}");
    }
  }

  pub fn log(&self, message: &str) {
    if self.enabled(LogLevel::Log) {
      debug!(logger = %self.name, "{message}");
    }
  }

  pub fn verbose(&self, message: &str) {
    if self.enabled(LogLevel::Verbose) {
      trace!(logger = %self.name, "{message}");
    }
  }
}

impl Default for InfrastructureLogger {
  fn default() -> Self {
    Self::new("strata", &InfrastructureLogging::default())
  }
}
