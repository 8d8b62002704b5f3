//! Emit-once advisory diagnostics.
//!
//! Some conditions are worth telling the user about but not worth failing on,
//! and repeating them on every build would be noise. Each distinct condition
//! has a [`DiagnosticCode`]; the registry emits a code's message the first time
//! and only counts later occurrences.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
  /// The fast schema check disagreed with the descriptive validator.
  SchemaGateMismatch,
  /// Watch mode was requested but no callback was given to receive results.
  WatchWithoutCallback,
}

impl DiagnosticCode {
  pub fn as_str(&self) -> &'static str {
    match self {
      DiagnosticCode::SchemaGateMismatch => "SCHEMA_GATE_MISMATCH",
      DiagnosticCode::WatchWithoutCallback => "WATCH_WITHOUT_CALLBACK",
    }
  }
}

impl fmt::Display for DiagnosticCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Default)]
pub struct DiagnosticRegistry {
  seen: Mutex<HashMap<DiagnosticCode, usize>>,
}

impl DiagnosticRegistry {
  /// Record an occurrence of `code`, logging `message` only on the first one.
  ///
  /// Returns whether the message was emitted.
  pub fn emit_once(&self, code: DiagnosticCode, message: impl fmt::Display) -> bool {
    let first = {
      let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
      let count = seen.entry(code).or_insert(0);
      *count += 1;
      *count == 1
    };
    if first {
      warn!(code = %code, "{message}");
    }
    first
  }

  pub fn has_emitted(&self, code: DiagnosticCode) -> bool {
    self.occurrences(code) > 0
  }

  /// How many times `code` has been recorded, emitted or not.
  pub fn occurrences(&self, code: DiagnosticCode) -> usize {
    let seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
    seen.get(&code).copied().unwrap_or(0)
  }
}

static GLOBAL: LazyLock<Arc<DiagnosticRegistry>> = LazyLock::new(|| Arc::new(DiagnosticRegistry::default()));

/// The process-wide registry.
pub fn global() -> Arc<DiagnosticRegistry> {
  GLOBAL.clone()
}
