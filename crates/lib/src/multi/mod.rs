//! Multi-configuration builds.
//!
//! A [`MultiCompiler`] owns one child [`Compiler`] per configuration plus the
//! [`DependencyGraph`] between them. Children run in dependency waves, at most
//! `parallelism` at a time; a child whose dependency failed is skipped.

mod graph;

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::compiler::{CloseError, Compiler, MultiStats, RunError, RunState, StateGuard, Stats};
use crate::config::{Configuration, MultiOptions, WatchOptions};
use crate::consts::{DEFAULT_PARALLELISM, DEFAULT_POLL_INTERVAL_MS};
use crate::error::BuildError;
use crate::factory::create_compiler;
use crate::fs::{FileSnapshot, WatchFileSystem};

pub use graph::{DependencyGraph, DependencyGraphError};

/// Receives the outcome of every wave run in watch mode.
pub type MultiWatchHandler = Box<dyn FnMut(Result<MultiStats, RunError>) + Send>;

struct Watching {
  stop: watch::Sender<bool>,
  task: JoinHandle<()>,
}

/// What one pass over the waves produced, per child index.
struct WaveOutcome {
  stats: Vec<Option<Stats>>,
  skipped: Vec<usize>,
  error: Option<RunError>,
}

impl WaveOutcome {
  fn into_result(self, graph: &DependencyGraph) -> Result<MultiStats, RunError> {
    if let Some(err) = self.error {
      return Err(err);
    }
    Ok(MultiStats {
      children: self.stats.into_iter().flatten().collect(),
      skipped: self.skipped.iter().map(|&index| graph.label(index).to_string()).collect(),
    })
  }
}

/// Watch bookkeeping for one child, on its own poll interval and
/// aggregate delay.
struct ChildWatch {
  fs: Arc<dyn WatchFileSystem>,
  files: Vec<PathBuf>,
  snapshot: FileSnapshot,
  poll: Duration,
  delay: Duration,
  next_poll: Instant,
  /// When the pending change is rebuilt; `None` while nothing changed.
  due: Option<Instant>,
}

impl ChildWatch {
  fn new(fs: Arc<dyn WatchFileSystem>, options: &WatchOptions) -> Self {
    Self {
      fs,
      files: Vec::new(),
      snapshot: FileSnapshot::default(),
      poll: options.poll_interval(),
      delay: options.aggregate_delay(),
      next_poll: Instant::now(),
      due: None,
    }
  }

  /// Start over after a rebuild.
  fn rearm(&mut self, now: Instant) {
    self.snapshot = self.fs.snapshot(&self.files);
    self.next_poll = now + self.poll;
    self.due = None;
  }

  fn next_wake(&self) -> Instant {
    self.due.map_or(self.next_poll, |due| due.min(self.next_poll))
  }

  /// Poll if the interval elapsed, returning newly changed files. The first
  /// change schedules a rebuild after this child's aggregate delay.
  fn poll(&mut self, now: Instant) -> Vec<PathBuf> {
    if self.next_poll > now {
      return Vec::new();
    }
    self.next_poll = now + self.poll;
    let current = self.fs.snapshot(&self.files);
    let changed = self.snapshot.changed_files(&current);
    if !changed.is_empty() {
      self.snapshot = current;
      self.due.get_or_insert(now + self.delay);
    }
    changed
  }

  fn is_due(&self, now: Instant) -> bool {
    self.due.is_some_and(|due| due <= now)
  }
}

pub struct MultiCompiler {
  compilers: Vec<Arc<Compiler>>,
  graph: DependencyGraph,
  options: MultiOptions,
  watching: Mutex<Option<Watching>>,
}

/// Build every child, then the dependency graph between them.
///
/// The first child that fails to construct aborts the whole attempt.
pub fn create_multi_compiler(configurations: &[Configuration], options: MultiOptions) -> Result<MultiCompiler, BuildError> {
  let compilers = configurations
    .iter()
    .map(create_compiler)
    .collect::<Result<Vec<_>, _>>()?;
  Ok(MultiCompiler::new(compilers, options)?)
}

impl MultiCompiler {
  pub fn new(compilers: Vec<Compiler>, options: MultiOptions) -> Result<Self, DependencyGraphError> {
    let graph = DependencyGraph::build(
      compilers
        .iter()
        .map(|compiler| (compiler.name(), compiler.options().dependencies())),
    )?;
    info!(
      compilers = compilers.len(),
      edges = graph.edges().len(),
      "multi compiler created"
    );
    Ok(Self {
      compilers: compilers.into_iter().map(Arc::new).collect(),
      graph,
      options,
      watching: Mutex::new(None),
    })
  }

  pub fn compilers(&self) -> &[Arc<Compiler>] {
    &self.compilers
  }

  pub fn compiler(&self, name: &str) -> Option<&Arc<Compiler>> {
    self.compilers.iter().find(|compiler| compiler.name() == Some(name))
  }

  pub fn graph(&self) -> &DependencyGraph {
    &self.graph
  }

  /// How many children may compile at the same time.
  pub fn parallelism(&self) -> usize {
    self.options.parallelism.unwrap_or(DEFAULT_PARALLELISM).max(1)
  }

  /// Run every child once, in dependency order.
  ///
  /// Children whose dependencies failed (a run error or errors in their
  /// stats) are skipped and listed in [`MultiStats::skipped`]. The first
  /// child run error, in configuration order, fails the whole run.
  pub async fn run(self: &Arc<Self>) -> Result<MultiStats, RunError> {
    let selected: BTreeSet<usize> = (0..self.compilers.len()).collect();
    self.run_waves(&selected, false).await.into_result(&self.graph)
  }

  /// Watch every child.
  ///
  /// Runs all children once, then rebuilds a changed child together with its
  /// transitive dependents. Every pass is passed to `handler`.
  pub fn watch(self: &Arc<Self>, handler: MultiWatchHandler) -> Result<(), RunError> {
    let runtime = Handle::try_current().map_err(|_| RunError::NoRuntime)?;
    let guards = self
      .compilers
      .iter()
      .map(|compiler| compiler.begin(RunState::Watching))
      .collect::<Result<Vec<_>, _>>()?;
    let (stop, stopped) = watch::channel(false);
    let multi = Arc::clone(self);
    let task = runtime.spawn(async move {
      multi.watch_loop(stopped, handler, guards).await;
    });
    *self.watching.lock().unwrap_or_else(PoisonError::into_inner) = Some(Watching { stop, task });
    Ok(())
  }

  /// Stop watching and close every child.
  ///
  /// All children are closed even when one fails; the first failure is
  /// returned.
  pub async fn close(&self) -> Result<(), CloseError> {
    let watching = self.watching.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(watching) = watching {
      let _ = watching.stop.send(true);
      watching.task.await.map_err(|e| CloseError::Join(e.to_string()))?;
    }

    let mut first = None;
    for (index, compiler) in self.compilers.iter().enumerate() {
      if let Err(source) = compiler.close().await {
        warn!(compiler = self.graph.label(index), error = %source, "child failed to close");
        first.get_or_insert(CloseError::Child {
          name: self.graph.label(index).to_string(),
          source: Box::new(source),
        });
      }
    }
    first.map_or(Ok(()), Err)
  }

  async fn run_waves(&self, selected: &BTreeSet<usize>, watching: bool) -> WaveOutcome {
    let semaphore = Arc::new(Semaphore::new(self.parallelism()));
    let mut outcome = WaveOutcome {
      stats: vec![None; self.compilers.len()],
      skipped: Vec::new(),
      error: None,
    };
    let mut failed: HashSet<usize> = HashSet::new();
    let mut errors: Vec<(usize, RunError)> = Vec::new();

    for wave in self.graph.waves() {
      let mut join_set: JoinSet<(usize, Result<Stats, RunError>)> = JoinSet::new();

      for index in wave.into_iter().filter(|index| selected.contains(index)) {
        if self.graph.dependencies_of(index).iter().any(|dep| failed.contains(dep)) {
          debug!(compiler = self.graph.label(index), "skipping: a dependency failed");
          failed.insert(index);
          outcome.skipped.push(index);
          continue;
        }
        let compiler = Arc::clone(&self.compilers[index]);
        let semaphore = Arc::clone(&semaphore);
        join_set.spawn(async move {
          let result = match semaphore.acquire_owned().await {
            Ok(_permit) if watching => compiler.compile_once(true).await,
            Ok(_permit) => compiler.run().await,
            Err(e) => Err(RunError::Join(e.to_string())),
          };
          (index, result)
        });
      }

      while let Some(joined) = join_set.join_next().await {
        let (index, result) = match joined {
          Ok(done) => done,
          Err(e) => {
            errors.push((usize::MAX, RunError::Join(e.to_string())));
            continue;
          }
        };
        match result {
          Ok(stats) => {
            if stats.has_errors() {
              failed.insert(index);
            }
            outcome.stats[index] = Some(stats);
          }
          Err(err) => {
            failed.insert(index);
            errors.push((index, err));
          }
        }
      }
    }

    if !outcome.skipped.is_empty() {
      warn!(
        skipped = ?outcome.skipped.iter().map(|&i| self.graph.label(i)).collect::<Vec<_>>(),
        "children skipped because a dependency failed"
      );
    }
    errors.sort_by_key(|(index, _)| *index);
    outcome.error = errors.into_iter().next().map(|(index, source)| match index {
      usize::MAX => source,
      _ => RunError::Child {
        name: self.graph.label(index).to_string(),
        source: Box::new(source),
      },
    });
    outcome
  }

  async fn watch_loop(
    self: Arc<Self>,
    mut stop: watch::Receiver<bool>,
    mut handler: MultiWatchHandler,
    guards: Vec<StateGuard>,
  ) {
    let mut children = Vec::with_capacity(self.compilers.len());
    for compiler in &self.compilers {
      match compiler.watch_file_system.clone() {
        Some(fs) => children.push(ChildWatch::new(fs, &compiler.options().watch_options)),
        None => {
          handler(Err(RunError::MissingFileSystem("watch")));
          return;
        }
      }
    }
    let mut selected: BTreeSet<usize> = (0..self.compilers.len()).collect();

    'watch: loop {
      let outcome = self.run_waves(&selected, true).await;
      let now = Instant::now();
      for &index in &selected {
        let compiler = &self.compilers[index];
        let child = &mut children[index];
        if let Some(stats) = &outcome.stats[index] {
          child.files = stats
            .file_dependencies
            .iter()
            .filter(|path| !compiler.is_ignored(path))
            .cloned()
            .collect();
        }
        child.rearm(now);
      }
      handler(outcome.into_result(&self.graph));

      let ready: Vec<usize> = loop {
        let wake = children
          .iter()
          .map(ChildWatch::next_wake)
          .min()
          .unwrap_or_else(|| Instant::now() + Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
        tokio::select! {
          _ = stop.changed() => break 'watch,
          _ = sleep_until(wake) => {}
        }

        let now = Instant::now();
        for (index, child) in children.iter_mut().enumerate() {
          for path in child.poll(now) {
            debug!(compiler = self.graph.label(index), file = %path.display(), "file changed");
            if let Err(err) = self.compilers[index].hooks.invalid.call(&path) {
              warn!(error = %err, "invalid hook errored");
            }
          }
        }
        let ready: Vec<usize> = (0..children.len()).filter(|&index| children[index].is_due(now)).collect();
        if !ready.is_empty() {
          break ready;
        }
      };
      selected = self.graph.transitive_dependents(ready);
    }

    for compiler in &self.compilers {
      if let Err(err) = compiler.hooks.watch_close.call(&()) {
        warn!(error = %err, "watchClose hook errored");
      }
    }
    drop(guards);
  }
}

impl std::fmt::Debug for MultiCompiler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MultiCompiler")
      .field("compilers", &self.compilers)
      .field("edges", &self.graph.edges())
      .field("parallelism", &self.parallelism())
      .finish_non_exhaustive()
  }
}
