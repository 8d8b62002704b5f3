//! Multi-configuration builds.

use serde_json::json;

use strata_lib::compiler::{Compiler, RunState, Stats};
use strata_lib::multi::DependencyGraphError;
use strata_lib::{BuildError, Configuration, MultiOptions, PluginSpec, create_multi_compiler};

use super::common::*;

fn named(fs: &std::sync::Arc<strata_lib::fs::MemoryFileSystem>, name: &str, entry: &str, deps: &[&str]) -> Configuration {
  config(
    fs,
    json!({
      "name": name,
      "entry": entry,
      "output": { "filename": format!("{name}.js") },
      "dependencies": deps,
    }),
  )
}

fn record_done(events: &Events) -> PluginSpec {
  let events = events.clone();
  PluginSpec::callable("record-done", move |compiler: &mut Compiler| {
    let events = events.clone();
    compiler.hooks.done.tap("record", move |stats: &Stats| {
      events
        .lock()
        .unwrap()
        .push(stats.name.clone().unwrap_or_default());
      Ok(())
    });
    Ok(())
  })
}

mod graph {
  use super::*;

  #[test]
  fn dependent_gets_exactly_one_edge() {
    let fs = project();
    let multi = create_multi_compiler(
      &[named(&fs, "a", "./src/a", &[]), named(&fs, "b", "./src/b", &["a"])],
      MultiOptions::default(),
    )
    .unwrap();
    assert_eq!(multi.graph().edges(), vec![(1, 0)]);
    assert_eq!(multi.compilers().len(), 2);
  }

  #[test]
  fn unknown_peer_is_a_dependency_error() {
    let fs = project();
    let err = create_multi_compiler(&[named(&fs, "b", "./src/b", &["a"])], MultiOptions::default()).unwrap_err();
    assert!(matches!(
      err,
      BuildError::DependencyGraph(DependencyGraphError::UnknownDependency { .. })
    ));
  }

  #[test]
  fn cycles_are_rejected() {
    let fs = project();
    let err = create_multi_compiler(
      &[named(&fs, "a", "./src/a", &["b"]), named(&fs, "b", "./src/b", &["a"])],
      MultiOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, BuildError::DependencyGraph(DependencyGraphError::Cycle(_))));
  }

  #[test]
  fn child_construction_failure_aborts_everything() {
    let fs = project();
    let err = create_multi_compiler(
      &[
        named(&fs, "a", "./src/a", &[]),
        named(&fs, "b", "./src/b", &[]).with_plugin(PluginSpec::invalid("string")),
      ],
      MultiOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, BuildError::InvalidPlugin(_)));
  }
}

mod run {
  use std::sync::Arc;

  use super::*;

  #[tokio::test]
  async fn dependencies_finish_before_dependents() {
    let fs = project();
    let events = events();
    let multi = Arc::new(
      create_multi_compiler(
        &[
          named(&fs, "app", "./src/index", &["lib"]).with_plugin(record_done(&events)),
          named(&fs, "lib", "./src/a", &[]).with_plugin(record_done(&events)),
        ],
        MultiOptions { parallelism: Some(2) },
      )
      .unwrap(),
    );

    let stats = multi.run().await.unwrap();

    assert_eq!(snapshot(&events), vec!["lib", "app"]);
    assert_eq!(stats.children.len(), 2);
    assert!(stats.skipped.is_empty());
    assert!(fs.read_file("/p/dist/app.js").is_some());
    assert!(fs.read_file("/p/dist/lib.js").is_some());
  }

  #[tokio::test]
  async fn failed_dependency_skips_dependents() {
    let fs = project();
    let multi = Arc::new(
      create_multi_compiler(
        &[
          named(&fs, "broken", "./src/missing", &[]),
          named(&fs, "app", "./src/index", &["broken"]),
          named(&fs, "other", "./src/b", &[]),
        ],
        MultiOptions::default(),
      )
      .unwrap(),
    );

    let stats = multi.run().await.unwrap();

    assert_eq!(stats.skipped, vec!["app".to_string()]);
    assert!(stats.has_errors());
    assert!(fs.read_file("/p/dist/other.js").is_some());
    assert!(fs.read_file("/p/dist/app.js").is_none());
  }

  #[tokio::test]
  async fn close_closes_every_child() {
    let fs = project();
    let multi = Arc::new(
      create_multi_compiler(
        &[named(&fs, "a", "./src/a", &[]), named(&fs, "b", "./src/b", &["a"])],
        MultiOptions::default(),
      )
      .unwrap(),
    );
    multi.run().await.unwrap();
    multi.close().await.unwrap();
    assert!(multi.compilers().iter().all(|c| c.state() == RunState::Closed));
  }
}
