//! The build entry point.
//!
//! The dispatcher validates the input, constructs a compiler (or a
//! multi-compiler for array input) and decides how to drive it:
//!
//! | callback | watch requested | action                                        |
//! |----------|-----------------|-----------------------------------------------|
//! | yes      | yes             | watch, every result goes to the callback      |
//! | yes      | no              | run, then close, then one callback            |
//! | no       | yes             | diagnostic, handle returned without running   |
//! | no       | no              | handle returned without running               |
//!
//! With a callback, nothing fails synchronously: construction errors reach
//! the callback on the next scheduler tick.

use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::compiler::{CloseError, Compiler, MultiStats, RunError, Stats};
use crate::config::ConfigInput;
use crate::config::schema::SchemaGate;
use crate::diagnostics::{DiagnosticCode, DiagnosticRegistry};
use crate::error::BuildError;
use crate::factory::create_compiler;
use crate::multi::{MultiCompiler, create_multi_compiler};

/// Completion callback: `(error, stats)`, at least one of which is absent.
pub type BuildCallback = Box<dyn FnMut(Option<BuildError>, Option<BuildStats>) + Send>;

type SharedCallback = Arc<Mutex<BuildCallback>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BuildStats {
  Single(Stats),
  Multi(MultiStats),
}

impl BuildStats {
  pub fn has_errors(&self) -> bool {
    match self {
      BuildStats::Single(stats) => stats.has_errors(),
      BuildStats::Multi(stats) => stats.has_errors(),
    }
  }

  /// Every compilation's stats, in configuration order.
  pub fn children(&self) -> Vec<&Stats> {
    match self {
      BuildStats::Single(stats) => vec![stats],
      BuildStats::Multi(stats) => stats.children.iter().collect(),
    }
  }
}

/// What a build invocation constructed.
#[derive(Debug, Clone)]
pub enum BuildHandle {
  Single(Arc<Compiler>),
  Multi(Arc<MultiCompiler>),
}

impl BuildHandle {
  pub fn as_single(&self) -> Option<&Arc<Compiler>> {
    match self {
      BuildHandle::Single(compiler) => Some(compiler),
      BuildHandle::Multi(_) => None,
    }
  }

  pub fn as_multi(&self) -> Option<&Arc<MultiCompiler>> {
    match self {
      BuildHandle::Multi(multi) => Some(multi),
      BuildHandle::Single(_) => None,
    }
  }

  pub async fn run(&self) -> Result<BuildStats, RunError> {
    match self {
      BuildHandle::Single(compiler) => compiler.run().await.map(BuildStats::Single),
      BuildHandle::Multi(multi) => multi.run().await.map(BuildStats::Multi),
    }
  }

  /// Start watching; every compilation result is passed to `callback`.
  pub fn watch(&self, callback: BuildCallback) -> Result<(), RunError> {
    let mut callback = callback;
    match self {
      BuildHandle::Single(compiler) => compiler.watch(Box::new(move |result| match result {
        Ok(stats) => callback(None, Some(BuildStats::Single(stats))),
        Err(err) => callback(Some(err.into()), None),
      })),
      BuildHandle::Multi(multi) => multi.watch(Box::new(move |result| match result {
        Ok(stats) => callback(None, Some(BuildStats::Multi(stats))),
        Err(err) => callback(Some(err.into()), None),
      })),
    }
  }

  pub async fn close(&self) -> Result<(), CloseError> {
    match self {
      BuildHandle::Single(compiler) => compiler.close().await,
      BuildHandle::Multi(multi) => multi.close().await,
    }
  }
}

/// Combine the outcome of a run with the close that followed it.
///
/// A run error takes precedence over a close error. Stats are kept whenever
/// the run produced them, even if closing failed.
pub fn merge_run_and_close(
  run: Result<BuildStats, RunError>,
  close: Result<(), CloseError>,
) -> (Option<BuildError>, Option<BuildStats>) {
  let (run_err, stats) = match run {
    Ok(stats) => (None, Some(stats)),
    Err(err) => (Some(BuildError::from(err)), None),
  };
  (run_err.or(close.err().map(BuildError::from)), stats)
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
  gate: SchemaGate,
  diagnostics: Arc<DiagnosticRegistry>,
}

impl Default for Dispatcher {
  fn default() -> Self {
    Self::new(SchemaGate::default())
  }
}

impl Dispatcher {
  /// A dispatcher using `gate`, and the gate's diagnostics registry.
  pub fn new(gate: SchemaGate) -> Self {
    let diagnostics = gate.diagnostics().clone();
    Self { gate, diagnostics }
  }

  pub fn with_diagnostics(mut self, diagnostics: Arc<DiagnosticRegistry>) -> Self {
    self.gate = self.gate.with_diagnostics(diagnostics.clone());
    self.diagnostics = diagnostics;
    self
  }

  pub fn diagnostics(&self) -> &Arc<DiagnosticRegistry> {
    &self.diagnostics
  }

  /// Validate the input and construct its compiler without driving it.
  pub fn create(&self, input: &ConfigInput) -> Result<BuildHandle, BuildError> {
    self.gate.check(&input.option_values(), input.is_multi())?;
    match input {
      ConfigInput::Single(configuration) => Ok(BuildHandle::Single(Arc::new(create_compiler(configuration)?))),
      ConfigInput::Multi {
        configurations,
        options,
      } => Ok(BuildHandle::Multi(Arc::new(create_multi_compiler(
        configurations,
        options.clone(),
      )?))),
    }
  }

  /// Construct without a callback. Nothing is run.
  ///
  /// Construction errors are returned directly. Requesting watch mode here
  /// only produces a one-time diagnostic, since there is nowhere to deliver
  /// results.
  pub fn build_sync(&self, input: ConfigInput) -> Result<BuildHandle, BuildError> {
    let handle = self.create(&input)?;
    if input.watch_requested() {
      self.diagnostics.emit_once(
        DiagnosticCode::WatchWithoutCallback,
        "watch mode was requested without a callback; the compiler was created but is not watching",
      );
    }
    Ok(handle)
  }

  /// Construct and drive the build, reporting through `callback`.
  ///
  /// Returns the handle, or `None` when construction failed (the error then
  /// reaches the callback on the next scheduler tick). Outside a Tokio
  /// runtime nothing can be scheduled, so the callback is invoked before
  /// returning with [`RunError::NoRuntime`] or the construction error.
  pub fn build_async(&self, input: ConfigInput, callback: BuildCallback) -> Option<BuildHandle> {
    let callback: SharedCallback = Arc::new(Mutex::new(callback));
    let runtime = Handle::try_current().ok();

    let handle = match self.create(&input) {
      Ok(handle) => handle,
      Err(err) => {
        debug!(error = %err, "construction failed, deferring to callback");
        let _release = deliver_later(runtime.as_ref(), callback, err);
        return None;
      }
    };
    let Some(runtime) = runtime else {
      let _release = deliver_later(None, callback, RunError::NoRuntime.into());
      return Some(handle);
    };

    if input.watch_requested() {
      info!(multi = input.is_multi(), "starting watch");
      let sink = callback.clone();
      let watched = handle.watch(Box::new(move |err, stats| invoke(&sink, err, stats)));
      if let Err(err) = watched {
        deliver_later(Some(&runtime), callback, err.into());
      }
    } else {
      info!(multi = input.is_multi(), "starting run");
      let driven = handle.clone();
      runtime.spawn(async move {
        let run = driven.run().await;
        let close = driven.close().await;
        let (err, stats) = merge_run_and_close(run, close);
        invoke(&callback, err, stats);
      });
    }
    Some(handle)
  }

  /// The full entry point: [`Dispatcher::build_async`] when a callback is
  /// given, [`Dispatcher::build_sync`] otherwise.
  pub fn build(
    &self,
    input: impl Into<ConfigInput>,
    callback: Option<BuildCallback>,
  ) -> Result<Option<BuildHandle>, BuildError> {
    let input = input.into();
    match callback {
      Some(callback) => Ok(self.build_async(input, callback)),
      None => self.build_sync(input).map(Some),
    }
  }
}

fn invoke(callback: &SharedCallback, err: Option<BuildError>, stats: Option<BuildStats>) {
  let mut callback = callback.lock().unwrap_or_else(PoisonError::into_inner);
  (*callback)(err, stats);
}

/// Hand `err` to the callback once the caller has returned.
///
/// On a runtime this is a spawned task. Without one, a helper thread waits
/// until the returned sender is dropped, which the caller does on return.
fn deliver_later(runtime: Option<&Handle>, callback: SharedCallback, err: BuildError) -> Option<std_mpsc::Sender<()>> {
  match runtime {
    Some(runtime) => {
      runtime.spawn(async move { invoke(&callback, Some(err), None) });
      None
    }
    None => {
      let (release, released) = std_mpsc::channel::<()>();
      let spawned = std::thread::Builder::new()
        .name("strata-callback".to_string())
        .spawn(move || {
          // Errors once the sender is dropped.
          let _ = released.recv();
          invoke(&callback, Some(err), None);
        });
      if let Err(e) = spawned {
        warn!(error = %e, "could not start the callback thread; the outcome is dropped");
      }
      Some(release)
    }
  }
}

/// [`Dispatcher::build`] with the default dispatcher.
pub fn build(input: impl Into<ConfigInput>, callback: Option<BuildCallback>) -> Result<Option<BuildHandle>, BuildError> {
  Dispatcher::default().build(input, callback)
}

/// [`Dispatcher::build_sync`] with the default dispatcher.
pub fn build_sync(input: impl Into<ConfigInput>) -> Result<BuildHandle, BuildError> {
  Dispatcher::default().build_sync(input.into())
}

/// [`Dispatcher::build_async`] with the default dispatcher.
pub fn build_async(input: impl Into<ConfigInput>, callback: BuildCallback) -> Option<BuildHandle> {
  Dispatcher::default().build_async(input.into(), callback)
}
