//! The compiler.
//!
//! A [`Compiler`] owns one configuration's options, its hooks and the
//! collaborators plugins attached to it. It is built by the factory with
//! `&mut` access for plugins, then shared behind an [`Arc`] and driven by
//! [`Compiler::run`] or [`Compiler::watch`] until [`Compiler::close`].

mod hooks;
mod stats;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::BuildOptions;
use crate::driver::{CompilationDriver, CompileContext, CompileError, PassthroughDriver, Resolution};
use crate::fs::{InputFileSystem, OutputFileSystem, WatchFileSystem};
use crate::logging::InfrastructureLogger;
use crate::plugin::builtin::{Devtool, MemoryCache, TargetProperties};

pub use hooks::{CompilerHooks, HookError, HookSlot, RunInfo, SyncHook, SyncHookMut, Tap, TapMut};
pub use stats::{AssetInfo, MultiStats, Stats};

#[derive(Debug, Error)]
pub enum RunError {
  #[error("compiler is already running")]
  AlreadyRunning,

  #[error("compiler is closed")]
  Closed,

  #[error("no {0} file system attached")]
  MissingFileSystem(&'static str),

  #[error("no async runtime available to run the compiler")]
  NoRuntime,

  #[error(transparent)]
  Hook(#[from] HookError),

  #[error(transparent)]
  Compile(#[from] CompileError),

  #[error("compilation task failed: {0}")]
  Join(String),

  #[error("compilation failed with bail enabled:{}", .errors.iter().map(|e| format!("\n - {e}")).collect::<String>())]
  Bail { errors: Vec<String> },

  #[error("compiler '{name}' failed: {source}")]
  Child {
    name: String,
    #[source]
    source: Box<RunError>,
  },
}

#[derive(Debug, Error)]
pub enum CloseError {
  #[error("cannot close while a compilation is running")]
  StillRunning,

  #[error(transparent)]
  Hook(#[from] HookError),

  #[error("watch task failed: {0}")]
  Join(String),

  #[error("compiler '{name}' failed to close: {source}")]
  Child {
    name: String,
    #[source]
    source: Box<CloseError>,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
  Idle,
  Running,
  Watching,
  Closed,
}

/// Receives the outcome of every compilation in watch mode.
pub type WatchHandler = Box<dyn FnMut(Result<Stats, RunError>) + Send>;

struct Watching {
  stop: watch::Sender<bool>,
  task: JoinHandle<()>,
}

/// Puts the compiler back to idle when a run or watch ends, however it ends.
pub(crate) struct StateGuard {
  compiler: Arc<Compiler>,
}

impl Drop for StateGuard {
  fn drop(&mut self) {
    let mut state = self.compiler.lock_state();
    if matches!(*state, RunState::Running | RunState::Watching) {
      *state = RunState::Idle;
    }
  }
}

pub struct Compiler {
  options: BuildOptions,
  context: PathBuf,
  pub hooks: CompilerHooks,
  pub input_file_system: Option<Arc<dyn InputFileSystem>>,
  pub output_file_system: Option<Arc<dyn OutputFileSystem>>,
  pub watch_file_system: Option<Arc<dyn WatchFileSystem>>,
  pub infrastructure_logger: InfrastructureLogger,
  driver: Arc<dyn CompilationDriver>,
  pub(crate) target: TargetProperties,
  pub(crate) externals: BTreeMap<String, String>,
  pub(crate) resolution: Resolution,
  pub(crate) devtool: Option<Devtool>,
  pub(crate) cache: Option<Arc<MemoryCache>>,
  pub(crate) watch_ignored: Vec<String>,
  applied_plugins: Vec<String>,
  state: Mutex<RunState>,
  compilations: AtomicUsize,
  watching: Mutex<Option<Watching>>,
}

impl Compiler {
  /// Create a compiler with no plugins applied and no file systems attached.
  pub fn new(options: BuildOptions) -> Self {
    let context = options.context.clone().unwrap_or_default();
    Self {
      context,
      hooks: CompilerHooks::default(),
      input_file_system: None,
      output_file_system: None,
      watch_file_system: None,
      infrastructure_logger: InfrastructureLogger::default(),
      driver: Arc::new(PassthroughDriver),
      target: TargetProperties::default(),
      externals: BTreeMap::new(),
      resolution: Resolution::default(),
      devtool: None,
      cache: None,
      watch_ignored: Vec::new(),
      applied_plugins: Vec::new(),
      state: Mutex::new(RunState::Idle),
      compilations: AtomicUsize::new(0),
      watching: Mutex::new(None),
      options,
    }
  }

  pub fn name(&self) -> Option<&str> {
    self.options.name.as_deref()
  }

  pub fn options(&self) -> &BuildOptions {
    &self.options
  }

  pub(crate) fn options_mut(&mut self) -> &mut BuildOptions {
    &mut self.options
  }

  pub fn context(&self) -> &Path {
    &self.context
  }

  /// Replace the compilation driver.
  pub fn set_driver(&mut self, driver: Arc<dyn CompilationDriver>) {
    self.driver = driver;
  }

  /// Names of the plugins applied so far, in order.
  pub fn applied_plugins(&self) -> &[String] {
    &self.applied_plugins
  }

  pub(crate) fn record_plugin(&mut self, name: &str) {
    self.applied_plugins.push(name.to_string());
  }

  pub fn target(&self) -> &TargetProperties {
    &self.target
  }

  pub fn externals(&self) -> &BTreeMap<String, String> {
    &self.externals
  }

  pub fn resolution(&self) -> &Resolution {
    &self.resolution
  }

  pub fn devtool(&self) -> Option<&Devtool> {
    self.devtool.as_ref()
  }

  pub fn cache(&self) -> Option<&Arc<MemoryCache>> {
    self.cache.as_ref()
  }

  pub fn watch_ignored(&self) -> &[String] {
    &self.watch_ignored
  }

  pub fn state(&self) -> RunState {
    *self.lock_state()
  }

  /// Number of compilations started so far.
  pub fn compilations(&self) -> usize {
    self.compilations.load(Ordering::SeqCst)
  }

  fn lock_state(&self) -> MutexGuard<'_, RunState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub(crate) fn begin(self: &Arc<Self>, next: RunState) -> Result<StateGuard, RunError> {
    let mut state = self.lock_state();
    match *state {
      RunState::Idle => {
        *state = next;
        Ok(StateGuard {
          compiler: Arc::clone(self),
        })
      }
      RunState::Running | RunState::Watching => Err(RunError::AlreadyRunning),
      RunState::Closed => Err(RunError::Closed),
    }
  }

  pub(crate) fn is_ignored(&self, path: &Path) -> bool {
    let path = path.to_string_lossy();
    self.watch_ignored.iter().any(|fragment| path.contains(fragment.as_str()))
  }

  /// Compile once.
  ///
  /// Fires `beforeRun` and `run`, compiles, then fires `afterCompile` and
  /// `done`. On failure the `failed` hook is fired with the error.
  pub async fn run(self: &Arc<Self>) -> Result<Stats, RunError> {
    let _guard = self.begin(RunState::Running)?;
    self.compile_once(false).await
  }

  /// Start watching in the background.
  ///
  /// Compiles immediately, then recompiles whenever one of the compilation's
  /// file dependencies changes. Every outcome is passed to `handler`. The
  /// watch ends when the compiler is closed.
  pub fn watch(self: &Arc<Self>, handler: WatchHandler) -> Result<(), RunError> {
    let runtime = Handle::try_current().map_err(|_| RunError::NoRuntime)?;
    let guard = self.begin(RunState::Watching)?;
    let (stop, stopped) = watch::channel(false);
    let compiler = Arc::clone(self);
    let task = runtime.spawn(async move {
      compiler.watch_loop(stopped, handler).await;
      drop(guard);
    });
    *self.watching.lock().unwrap_or_else(PoisonError::into_inner) = Some(Watching { stop, task });
    Ok(())
  }

  /// Stop watching and shut the compiler down.
  ///
  /// Closing twice is a no-op. Closing during a one-shot run fails.
  pub async fn close(&self) -> Result<(), CloseError> {
    let watching = self.watching.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(watching) = watching {
      let _ = watching.stop.send(true);
      watching.task.await.map_err(|e| CloseError::Join(e.to_string()))?;
    }

    {
      let mut state = self.lock_state();
      match *state {
        RunState::Closed => return Ok(()),
        RunState::Running | RunState::Watching => return Err(CloseError::StillRunning),
        RunState::Idle => *state = RunState::Closed,
      }
    }
    self.hooks.shutdown.call(&())?;
    info!(compiler = self.name().unwrap_or("-"), "compiler closed");
    Ok(())
  }

  pub(crate) async fn compile_once(self: &Arc<Self>, watching: bool) -> Result<Stats, RunError> {
    let compilation = self.compilations.fetch_add(1, Ordering::SeqCst) + 1;
    let info = RunInfo {
      name: self.options.name.clone(),
      watching,
      compilation,
    };
    debug!(compiler = self.name().unwrap_or("-"), compilation, watching, "compiling");

    let result: Result<Stats, RunError> = async {
      if watching {
        self.hooks.watch_run.call(&info)?;
      } else {
        self.hooks.before_run.call(&info)?;
        self.hooks.run.call(&info)?;
      }

      let compiler = Arc::clone(self);
      let mut stats = tokio::task::spawn_blocking(move || compiler.compile_blocking())
        .await
        .map_err(|e| RunError::Join(e.to_string()))??;

      self.hooks.after_compile.call(&mut stats)?;
      if self.options.bail.unwrap_or(false) && stats.has_errors() {
        return Err(RunError::Bail {
          errors: stats.errors.clone(),
        });
      }
      self.hooks.done.call(&stats)?;
      Ok(stats)
    }
    .await;

    match &result {
      Ok(stats) => info!(
        compiler = self.name().unwrap_or("-"),
        hash = %stats.hash,
        errors = stats.errors.len(),
        warnings = stats.warnings.len(),
        "compilation finished"
      ),
      Err(err) => {
        warn!(compiler = self.name().unwrap_or("-"), error = %err, "compilation failed");
        if let Err(hook_err) = self.hooks.failed.call(err) {
          warn!(error = %hook_err, "failed hook errored");
        }
      }
    }
    result
  }

  fn compile_blocking(&self) -> Result<Stats, RunError> {
    let input = self
      .input_file_system
      .as_deref()
      .ok_or(RunError::MissingFileSystem("input"))?;
    let output = self
      .output_file_system
      .as_deref()
      .ok_or(RunError::MissingFileSystem("output"))?;
    let ctx = CompileContext {
      name: self.name(),
      context: &self.context,
      options: &self.options,
      input,
      output,
      resolution: &self.resolution,
      externals: &self.externals,
      target: &self.target,
      devtool: self.devtool.as_ref(),
      cache: self.cache.as_deref(),
      logger: &self.infrastructure_logger,
    };
    Ok(self.driver.compile(&ctx)?)
  }

  async fn watch_loop(self: &Arc<Self>, mut stop: watch::Receiver<bool>, mut handler: WatchHandler) {
    let Some(watch_fs) = self.watch_file_system.clone() else {
      handler(Err(RunError::MissingFileSystem("watch")));
      return;
    };
    let interval = self.options.watch_options.poll_interval();
    let delay = self.options.watch_options.aggregate_delay();
    let mut files: Vec<PathBuf> = Vec::new();

    'watch: loop {
      let result = self.compile_once(true).await;
      if let Ok(stats) = &result {
        files = stats
          .file_dependencies
          .iter()
          .filter(|path| !self.is_ignored(path))
          .cloned()
          .collect();
      }
      let snapshot = watch_fs.snapshot(&files);
      handler(result);

      let changed = loop {
        tokio::select! {
          _ = stop.changed() => break 'watch,
          _ = sleep(interval) => {
            let changed = snapshot.changed_files(&watch_fs.snapshot(&files));
            if !changed.is_empty() {
              break changed;
            }
          }
        }
      };

      for file in &changed {
        debug!(file = %file.display(), "file changed");
        if let Err(err) = self.hooks.invalid.call(file) {
          warn!(error = %err, "invalid hook errored");
        }
      }
      tokio::select! {
        _ = stop.changed() => break 'watch,
        _ = sleep(delay) => {}
      }
    }

    if let Err(err) = self.hooks.watch_close.call(&()) {
      warn!(error = %err, "watchClose hook errored");
    }
  }
}

impl std::fmt::Debug for Compiler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Compiler")
      .field("name", &self.name())
      .field("context", &self.context)
      .field("state", &self.state())
      .field("plugins", &self.applied_plugins)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::AtomicBool;
  use std::time::Duration;

  use serde_json::json;
  use tokio::sync::mpsc;

  use super::*;
  use crate::config::defaults::apply_full_defaults;
  use crate::config::normalize::normalize;
  use crate::fs::MemoryFileSystem;
  use crate::plugin::builtin::apply_options;

  fn compiler_with(raw: serde_json::Value, fs: &Arc<MemoryFileSystem>) -> Compiler {
    let mut options = normalize(&raw).unwrap();
    options.context = Some(PathBuf::from("/p"));
    apply_full_defaults(&mut options);
    let mut compiler = Compiler::new(options);
    compiler.input_file_system = Some(fs.clone());
    compiler.output_file_system = Some(fs.clone());
    compiler.watch_file_system = Some(fs.clone());
    apply_options(&mut compiler).unwrap();
    compiler
  }

  fn project() -> Arc<MemoryFileSystem> {
    Arc::new(MemoryFileSystem::with_files([("/p/src/index.js", "console.log(1);")]))
  }

  #[derive(Debug)]
  struct FailingDriver;

  impl CompilationDriver for FailingDriver {
    fn compile(&self, _ctx: &CompileContext<'_>) -> Result<Stats, CompileError> {
      Err(CompileError::Driver("driver exploded".to_string()))
    }
  }

  mod run {
    use super::*;

    #[tokio::test]
    async fn fires_run_hooks_in_order() {
      let fs = project();
      let mut compiler = compiler_with(json!({ "mode": "none" }), &fs);
      let order = Arc::new(Mutex::new(Vec::new()));
      for slot in ["beforeRun", "run"] {
        let order = order.clone();
        let hook = if slot == "run" {
          &mut compiler.hooks.run
        } else {
          &mut compiler.hooks.before_run
        };
        hook.tap("test", move |_| {
          order.lock().unwrap().push(slot);
          Ok(())
        });
      }
      let done = order.clone();
      compiler.hooks.done.tap("test", move |_| {
        done.lock().unwrap().push("done");
        Ok(())
      });

      let compiler = Arc::new(compiler);
      let stats = compiler.run().await.unwrap();
      assert_eq!(*order.lock().unwrap(), vec!["beforeRun", "run", "done"]);
      assert_eq!(stats.entrypoints["main"], vec!["main.js"]);
      assert!(fs.read_file("/p/dist/main.js").is_some());
      assert_eq!(compiler.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn driver_failure_fires_failed_hook() {
      let fs = project();
      let mut compiler = compiler_with(json!({ "mode": "none" }), &fs);
      compiler.set_driver(Arc::new(FailingDriver));
      let failed = Arc::new(AtomicBool::new(false));
      let flag = failed.clone();
      compiler.hooks.failed.tap("test", move |err| {
        flag.store(err.to_string().contains("driver exploded"), Ordering::SeqCst);
        Ok(())
      });

      let compiler = Arc::new(compiler);
      let err = compiler.run().await.unwrap_err();
      assert!(matches!(err, RunError::Compile(_)));
      assert!(failed.load(Ordering::SeqCst));
      assert_eq!(compiler.hooks.done.call_count(), 0);
    }

    #[tokio::test]
    async fn bail_turns_errors_fatal() {
      let fs = project();
      let compiler = Arc::new(compiler_with(json!({ "mode": "none", "bail": true, "entry": "./missing" }), &fs));
      let err = compiler.run().await.unwrap_err();
      match err {
        RunError::Bail { errors } => assert!(errors[0].contains("./missing")),
        other => panic!("expected bail, got {other:?}"),
      }
    }

    #[tokio::test]
    async fn missing_file_system_is_an_error() {
      let compiler = Arc::new(Compiler::new(BuildOptions::default()));
      let err = compiler.run().await.unwrap_err();
      assert!(matches!(err, RunError::MissingFileSystem("input")));
    }

    #[tokio::test]
    async fn concurrent_run_is_refused() {
      let fs = project();
      let compiler = Arc::new(compiler_with(json!({ "mode": "none" }), &fs));
      let _guard = compiler.begin(RunState::Running).unwrap();
      assert!(matches!(compiler.run().await, Err(RunError::AlreadyRunning)));
    }
  }

  mod close {
    use super::*;

    #[tokio::test]
    async fn close_is_idempotent_and_final() {
      let fs = project();
      let compiler = Arc::new(compiler_with(json!({ "mode": "none" }), &fs));
      compiler.run().await.unwrap();
      compiler.close().await.unwrap();
      compiler.close().await.unwrap();
      assert_eq!(compiler.hooks.shutdown.call_count(), 1);
      assert_eq!(compiler.state(), RunState::Closed);
      assert!(matches!(compiler.run().await, Err(RunError::Closed)));
    }

    #[tokio::test]
    async fn close_during_run_fails() {
      let fs = project();
      let compiler = Arc::new(compiler_with(json!({ "mode": "none" }), &fs));
      let guard = compiler.begin(RunState::Running).unwrap();
      assert!(matches!(compiler.close().await, Err(CloseError::StillRunning)));
      drop(guard);
      compiler.close().await.unwrap();
    }
  }

  mod watch {
    use super::*;

    #[tokio::test]
    async fn recompiles_on_change_and_stops_on_close() {
      let fs = project();
      let mut compiler = compiler_with(
        json!({ "mode": "none", "watchOptions": { "poll": 5, "aggregateTimeout": 1 } }),
        &fs,
      );
      let invalidated = Arc::new(Mutex::new(Vec::new()));
      let seen = invalidated.clone();
      compiler.hooks.invalid.tap("test", move |path| {
        seen.lock().unwrap().push(path.clone());
        Ok(())
      });
      let compiler = Arc::new(compiler);

      let (tx, mut rx) = mpsc::unbounded_channel();
      compiler
        .watch(Box::new(move |result| {
          let _ = tx.send(result.map(|stats| stats.hash));
        }))
        .unwrap();
      assert_eq!(compiler.state(), RunState::Watching);

      let first = rx.recv().await.unwrap().unwrap();
      fs.write_file("/p/src/index.js", "console.log(2);");
      let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
      assert_ne!(first, second);
      assert_eq!(*invalidated.lock().unwrap(), vec![PathBuf::from("/p/src/index.js")]);
      assert_eq!(compiler.hooks.watch_run.call_count(), 2);
      assert_eq!(compiler.hooks.run.call_count(), 0);

      compiler.close().await.unwrap();
      assert_eq!(compiler.hooks.watch_close.call_count(), 1);
      assert_eq!(compiler.state(), RunState::Closed);
    }

    #[tokio::test]
    async fn ignored_files_do_not_trigger() {
      let fs = project();
      let compiler = Arc::new(compiler_with(
        json!({ "mode": "none", "watchOptions": { "poll": 5, "ignored": "src" } }),
        &fs,
      ));
      let (tx, mut rx) = mpsc::unbounded_channel();
      compiler
        .watch(Box::new(move |result| {
          let _ = tx.send(result.is_ok());
        }))
        .unwrap();
      assert!(rx.recv().await.unwrap());
      fs.write_file("/p/src/index.js", "console.log(3);");
      assert!(
        tokio::time::timeout(Duration::from_millis(100), rx.recv())
          .await
          .is_err()
      );
      compiler.close().await.unwrap();
    }

    #[test]
    fn watch_without_runtime_fails() {
      let compiler = Arc::new(Compiler::new(BuildOptions::default()));
      assert!(matches!(compiler.watch(Box::new(|_| {})), Err(RunError::NoRuntime)));
    }
  }
}
