//! Compiler hook slots.
//!
//! Every hook is a synchronous, append-only list of named taps called in the
//! order they were added. Lifecycle hooks (`environment`, `afterEnvironment`,
//! `initialize`) are fired with [`SyncHook::call_once`] and refuse to fire a
//! second time.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

use crate::plugin::PluginError;

use super::{RunError, Stats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookSlot {
  Environment,
  AfterEnvironment,
  Initialize,
  BeforeRun,
  Run,
  WatchRun,
  AfterCompile,
  Done,
  Failed,
  Invalid,
  WatchClose,
  Shutdown,
}

impl HookSlot {
  pub const ALL: [HookSlot; 12] = [
    HookSlot::Environment,
    HookSlot::AfterEnvironment,
    HookSlot::Initialize,
    HookSlot::BeforeRun,
    HookSlot::Run,
    HookSlot::WatchRun,
    HookSlot::AfterCompile,
    HookSlot::Done,
    HookSlot::Failed,
    HookSlot::Invalid,
    HookSlot::WatchClose,
    HookSlot::Shutdown,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      HookSlot::Environment => "environment",
      HookSlot::AfterEnvironment => "afterEnvironment",
      HookSlot::Initialize => "initialize",
      HookSlot::BeforeRun => "beforeRun",
      HookSlot::Run => "run",
      HookSlot::WatchRun => "watchRun",
      HookSlot::AfterCompile => "afterCompile",
      HookSlot::Done => "done",
      HookSlot::Failed => "failed",
      HookSlot::Invalid => "invalid",
      HookSlot::WatchClose => "watchClose",
      HookSlot::Shutdown => "shutdown",
    }
  }

  /// Lifecycle slots fire at most once per compiler.
  pub fn is_lifecycle(&self) -> bool {
    matches!(
      self,
      HookSlot::Environment | HookSlot::AfterEnvironment | HookSlot::Initialize
    )
  }
}

impl fmt::Display for HookSlot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for HookSlot {
  type Err = HookError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    HookSlot::ALL
      .into_iter()
      .find(|slot| slot.as_str() == s)
      .ok_or_else(|| HookError::UnknownSlot(s.to_string()))
  }
}

#[derive(Debug, Error)]
pub enum HookError {
  #[error("hook '{0}' has already fired")]
  AlreadyFired(HookSlot),

  #[error("tap '{tap}' on hook '{slot}' failed: {source}")]
  Tap {
    slot: HookSlot,
    tap: String,
    #[source]
    source: PluginError,
  },

  #[error("unknown hook '{0}'")]
  UnknownSlot(String),
}

/// A tap receiving the hook argument by reference.
pub type Tap<T> = Arc<dyn Fn(&T) -> Result<(), PluginError> + Send + Sync>;

/// A tap allowed to modify the hook argument.
pub type TapMut<T> = Arc<dyn Fn(&mut T) -> Result<(), PluginError> + Send + Sync>;

pub struct SyncHook<T> {
  slot: HookSlot,
  taps: Vec<(String, Tap<T>)>,
  calls: AtomicUsize,
}

impl<T> SyncHook<T> {
  pub fn new(slot: HookSlot) -> Self {
    Self {
      slot,
      taps: Vec::new(),
      calls: AtomicUsize::new(0),
    }
  }

  pub fn slot(&self) -> HookSlot {
    self.slot
  }

  pub fn tap<F>(&mut self, name: impl Into<String>, tap: F)
  where
    F: Fn(&T) -> Result<(), PluginError> + Send + Sync + 'static,
  {
    self.taps.push((name.into(), Arc::new(tap)));
  }

  pub fn tap_arc(&mut self, name: impl Into<String>, tap: Tap<T>) {
    self.taps.push((name.into(), tap));
  }

  pub fn tap_names(&self) -> Vec<&str> {
    self.taps.iter().map(|(name, _)| name.as_str()).collect()
  }

  /// How many times the hook has fired.
  pub fn call_count(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  /// Call every tap in order, stopping at the first failure.
  pub fn call(&self, arg: &T) -> Result<(), HookError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    for (name, tap) in &self.taps {
      tap(arg).map_err(|source| HookError::Tap {
        slot: self.slot,
        tap: name.clone(),
        source,
      })?;
    }
    Ok(())
  }

  /// Like [`SyncHook::call`], but only the first call fires.
  pub fn call_once(&self, arg: &T) -> Result<(), HookError> {
    if self
      .calls
      .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
      .is_err()
    {
      return Err(HookError::AlreadyFired(self.slot));
    }
    for (name, tap) in &self.taps {
      tap(arg).map_err(|source| HookError::Tap {
        slot: self.slot,
        tap: name.clone(),
        source,
      })?;
    }
    Ok(())
  }
}

pub struct SyncHookMut<T> {
  slot: HookSlot,
  taps: Vec<(String, TapMut<T>)>,
  calls: AtomicUsize,
}

impl<T> SyncHookMut<T> {
  pub fn new(slot: HookSlot) -> Self {
    Self {
      slot,
      taps: Vec::new(),
      calls: AtomicUsize::new(0),
    }
  }

  pub fn tap<F>(&mut self, name: impl Into<String>, tap: F)
  where
    F: Fn(&mut T) -> Result<(), PluginError> + Send + Sync + 'static,
  {
    self.taps.push((name.into(), Arc::new(tap)));
  }

  pub fn tap_names(&self) -> Vec<&str> {
    self.taps.iter().map(|(name, _)| name.as_str()).collect()
  }

  pub fn call_count(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn call(&self, arg: &mut T) -> Result<(), HookError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    for (name, tap) in &self.taps {
      tap(arg).map_err(|source| HookError::Tap {
        slot: self.slot,
        tap: name.clone(),
        source,
      })?;
    }
    Ok(())
  }
}

impl<T> fmt::Debug for SyncHook<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SyncHook")
      .field("slot", &self.slot)
      .field("taps", &self.tap_names())
      .field("calls", &self.call_count())
      .finish()
  }
}

impl<T> fmt::Debug for SyncHookMut<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SyncHookMut")
      .field("slot", &self.slot)
      .field("taps", &self.tap_names())
      .field("calls", &self.call_count())
      .finish()
  }
}

/// Passed to `beforeRun`, `run` and `watchRun`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
  pub name: Option<String>,
  pub watching: bool,
  /// Number of compilations this compiler started, including this one.
  pub compilation: usize,
}

/// The fixed set of hooks every compiler exposes.
#[derive(Debug)]
pub struct CompilerHooks {
  pub environment: SyncHook<()>,
  pub after_environment: SyncHook<()>,
  pub initialize: SyncHook<()>,
  pub before_run: SyncHook<RunInfo>,
  pub run: SyncHook<RunInfo>,
  pub watch_run: SyncHook<RunInfo>,
  pub after_compile: SyncHookMut<Stats>,
  pub done: SyncHook<Stats>,
  pub failed: SyncHook<RunError>,
  /// Fired with each changed file the watcher notices.
  pub invalid: SyncHook<PathBuf>,
  pub watch_close: SyncHook<()>,
  pub shutdown: SyncHook<()>,
}

impl Default for CompilerHooks {
  fn default() -> Self {
    Self {
      environment: SyncHook::new(HookSlot::Environment),
      after_environment: SyncHook::new(HookSlot::AfterEnvironment),
      initialize: SyncHook::new(HookSlot::Initialize),
      before_run: SyncHook::new(HookSlot::BeforeRun),
      run: SyncHook::new(HookSlot::Run),
      watch_run: SyncHook::new(HookSlot::WatchRun),
      after_compile: SyncHookMut::new(HookSlot::AfterCompile),
      done: SyncHook::new(HookSlot::Done),
      failed: SyncHook::new(HookSlot::Failed),
      invalid: SyncHook::new(HookSlot::Invalid),
      watch_close: SyncHook::new(HookSlot::WatchClose),
      shutdown: SyncHook::new(HookSlot::Shutdown),
    }
  }
}

impl CompilerHooks {
  /// How many times the hook in `slot` has fired.
  pub fn call_count(&self, slot: HookSlot) -> usize {
    match slot {
      HookSlot::Environment => self.environment.call_count(),
      HookSlot::AfterEnvironment => self.after_environment.call_count(),
      HookSlot::Initialize => self.initialize.call_count(),
      HookSlot::BeforeRun => self.before_run.call_count(),
      HookSlot::Run => self.run.call_count(),
      HookSlot::WatchRun => self.watch_run.call_count(),
      HookSlot::AfterCompile => self.after_compile.call_count(),
      HookSlot::Done => self.done.call_count(),
      HookSlot::Failed => self.failed.call_count(),
      HookSlot::Invalid => self.invalid.call_count(),
      HookSlot::WatchClose => self.watch_close.call_count(),
      HookSlot::Shutdown => self.shutdown.call_count(),
    }
  }
}
