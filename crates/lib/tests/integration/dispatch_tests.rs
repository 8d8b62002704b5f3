//! The dispatcher decision table, driven through the public entry points.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use serial_test::serial;
use tokio::sync::mpsc;

use strata_lib::compiler::{Compiler, RunState};
use strata_lib::diagnostics::{self, DiagnosticCode};
use strata_lib::{BuildCallback, BuildError, BuildStats, ConfigInput, PluginError, PluginSpec};

use super::common::*;

type Outcome = (Option<BuildError>, Option<BuildStats>);

fn channel() -> (BuildCallback, mpsc::UnboundedReceiver<Outcome>) {
  let (tx, rx) = mpsc::unbounded_channel();
  let callback: BuildCallback = Box::new(move |err, stats| {
    let _ = tx.send((err, stats));
  });
  (callback, rx)
}

fn failing_shutdown() -> PluginSpec {
  PluginSpec::callable("failing-shutdown", |compiler: &mut Compiler| {
    compiler
      .hooks
      .shutdown
      .tap("flush", |_| Err(PluginError::message("disk full")));
    Ok(())
  })
}

fn failing_run() -> PluginSpec {
  PluginSpec::callable("failing-run", |compiler: &mut Compiler| {
    compiler
      .hooks
      .before_run
      .tap("guard", |_| Err(PluginError::message("not today")));
    Ok(())
  })
}

mod run_then_close {
  use super::*;

  #[tokio::test]
  async fn close_error_is_reported_with_run_stats() {
    let fs = project();
    let (callback, mut rx) = channel();
    dispatcher()
      .build(config(&fs, json!({})).with_plugin(failing_shutdown()), Some(callback))
      .unwrap();

    let (err, stats) = rx.recv().await.unwrap();
    let err = err.unwrap();
    assert!(matches!(err, BuildError::Close(_)), "{err}");
    assert!(err.to_string().contains("disk full"));
    assert!(!stats.unwrap().has_errors());
  }

  #[tokio::test]
  async fn run_error_wins_over_close_error() {
    let fs = project();
    let (callback, mut rx) = channel();
    dispatcher()
      .build(
        config(&fs, json!({}))
          .with_plugin(failing_run())
          .with_plugin(failing_shutdown()),
        Some(callback),
      )
      .unwrap();

    let (err, stats) = rx.recv().await.unwrap();
    let err = err.unwrap();
    assert!(matches!(err, BuildError::Run(_)), "{err}");
    assert!(err.to_string().contains("not today"));
    assert!(stats.is_none());
  }

  #[tokio::test]
  async fn close_runs_even_when_run_fails() {
    let fs = project();
    let (callback, mut rx) = channel();
    let handle = dispatcher()
      .build(config(&fs, json!({})).with_plugin(failing_run()), Some(callback))
      .unwrap()
      .unwrap();

    rx.recv().await.unwrap();
    let compiler = handle.as_single().unwrap();
    assert_eq!(compiler.state(), RunState::Closed);
    assert_eq!(compiler.hooks.failed.call_count(), 1);
    assert_eq!(compiler.hooks.shutdown.call_count(), 1);
  }

  #[tokio::test]
  async fn callback_fires_exactly_once() {
    let fs = project();
    let (callback, mut rx) = channel();
    dispatcher().build(config(&fs, json!({})), Some(callback)).unwrap();

    assert!(rx.recv().await.is_some());
    let extra = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(matches!(extra, Ok(None) | Err(_)));
  }
}

mod deferred_errors {
  use super::*;

  #[tokio::test]
  async fn schema_error_is_delivered_on_next_tick() {
    let (callback, mut rx) = channel();
    let handle = dispatcher()
      .build(strata_lib::Configuration::new(json!({ "mode": "fast" })), Some(callback))
      .unwrap();
    assert!(handle.is_none());
    assert!(rx.try_recv().is_err());

    let (err, stats) = rx.recv().await.unwrap();
    assert!(matches!(err, Some(BuildError::Schema(_))));
    assert!(stats.is_none());
  }

  #[tokio::test]
  async fn dependency_error_is_delivered_on_next_tick() {
    let fs = project();
    let (callback, mut rx) = channel();
    let handle = dispatcher()
      .build(vec![config(&fs, json!({ "name": "a", "dependencies": ["ghost"] }))], Some(callback))
      .unwrap();
    assert!(handle.is_none());

    let (err, _) = rx.recv().await.unwrap();
    assert!(matches!(err, Some(BuildError::DependencyGraph(_))));
  }
}

mod global_diagnostics {
  use super::*;

  #[test]
  #[serial]
  fn watch_without_callback_is_reported_once_per_process() {
    let fs = project();
    let registry = diagnostics::global();
    let before = registry.occurrences(DiagnosticCode::WatchWithoutCallback);

    for _ in 0..2 {
      let handle = strata_lib::build(config(&fs, json!({ "watch": true })), None)
        .unwrap()
        .unwrap();
      let compiler = handle.as_single().unwrap();
      assert_eq!(compiler.state(), RunState::Idle);
      assert_eq!(compiler.compilations(), 0);
    }

    assert_eq!(registry.occurrences(DiagnosticCode::WatchWithoutCallback), before + 2);
  }

  #[test]
  #[serial]
  fn no_callback_without_watch_is_silent() {
    let fs = project();
    let registry = diagnostics::global();
    let before = registry.occurrences(DiagnosticCode::WatchWithoutCallback);

    let handle = strata_lib::build_sync(config(&fs, json!({}))).unwrap();
    assert!(handle.as_single().is_some());
    assert_eq!(registry.occurrences(DiagnosticCode::WatchWithoutCallback), before);
  }

  #[test]
  #[serial]
  fn multi_watch_without_callback_returns_idle_children() {
    let fs = project();
    let handle = strata_lib::build(
      vec![
        config(&fs, json!({ "name": "a" })),
        config(&fs, json!({ "name": "b", "watch": true })),
      ],
      None,
    )
    .unwrap()
    .unwrap();
    let multi = handle.as_multi().unwrap();
    assert!(multi.compilers().iter().all(|c| c.state() == RunState::Idle));
    assert!(diagnostics::global().has_emitted(DiagnosticCode::WatchWithoutCallback));
  }
}

#[tokio::test]
async fn watch_handle_stops_on_close() {
  let fs = project();
  let (callback, mut rx) = channel();
  let handle = dispatcher()
    .build(
      config(&fs, json!({ "watch": true, "watchOptions": { "poll": 5, "aggregateTimeout": 1 } })),
      Some(callback),
    )
    .unwrap()
    .unwrap();

  let (err, _) = rx.recv().await.unwrap();
  assert!(err.is_none());
  handle.close().await.unwrap();

  let compiler = Arc::clone(handle.as_single().unwrap());
  assert_eq!(compiler.state(), RunState::Closed);
  assert_eq!(compiler.hooks.watch_close.call_count(), 1);
}

#[tokio::test]
async fn multi_input_with_any_watch_flag_watches() {
  let fs = project();
  let watch_options = json!({ "poll": 5, "aggregateTimeout": 1 });
  let (callback, mut rx) = channel();
  let handle = dispatcher()
    .build(
      ConfigInput::multi(vec![
        config(
          &fs,
          json!({ "name": "a", "entry": "./src/a", "output": { "filename": "a.js" }, "watchOptions": watch_options }),
        ),
        config(
          &fs,
          json!({
            "name": "b",
            "entry": "./src/b",
            "output": { "filename": "b.js" },
            "watch": true,
            "watchOptions": watch_options,
          }),
        ),
      ]),
      Some(callback),
    )
    .unwrap()
    .unwrap();

  let (err, first) = rx.recv().await.unwrap();
  assert!(err.is_none(), "{err:?}");
  let Some(BuildStats::Multi(first)) = first else {
    panic!("expected multi stats");
  };
  assert_eq!(first.children.len(), 2);

  fs.write_file("/p/src/a.js", "console.log('a2');");
  let (err, second) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
    .await
    .unwrap()
    .unwrap();
  assert!(err.is_none(), "{err:?}");
  let Some(BuildStats::Multi(second)) = second else {
    panic!("expected multi stats");
  };
  assert_eq!(second.children[0].name.as_deref(), Some("a"));

  handle.close().await.unwrap();
  let multi = handle.as_multi().unwrap();
  for compiler in multi.compilers() {
    assert_eq!(compiler.state(), RunState::Closed);
    assert_eq!(compiler.hooks.watch_close.call_count(), 1);
    assert_eq!(compiler.hooks.run.call_count(), 0);
  }
}
