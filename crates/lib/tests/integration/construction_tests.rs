//! Compiler construction through the gate, the factory and the registrar.

use std::sync::Arc;

use serde_json::json;

use strata_lib::compiler::{Compiler, HookSlot};
use strata_lib::config::schema::SchemaGate;
use strata_lib::diagnostics::{DiagnosticCode, DiagnosticRegistry};
use strata_lib::{BuildError, ConfigInput, Dispatcher, PluginSpec, create_compiler};

use super::common::*;

fn recording(events: &Events, label: &'static str) -> PluginSpec {
  let events = events.clone();
  PluginSpec::callable(label, move |compiler: &mut Compiler| {
    for (slot, hook) in [
      ("environment", &mut compiler.hooks.environment),
      ("afterEnvironment", &mut compiler.hooks.after_environment),
      ("initialize", &mut compiler.hooks.initialize),
    ] {
      let events = events.clone();
      hook.tap(label, move |_| {
        events.lock().unwrap().push(format!("{label}:{slot}"));
        Ok(())
      });
    }
    Ok(())
  })
}

mod lifecycle {
  use super::*;

  #[test]
  fn hooks_fire_in_order_exactly_once() {
    let fs = project();
    let events = events();
    let configuration = config(&fs, json!({})).with_plugin(recording(&events, "p"));

    let compiler = create_compiler(&configuration).unwrap();

    assert_eq!(
      snapshot(&events),
      vec!["p:environment", "p:afterEnvironment", "p:initialize"]
    );
    for slot in [HookSlot::Environment, HookSlot::AfterEnvironment, HookSlot::Initialize] {
      assert_eq!(compiler.hooks.call_count(slot), 1, "{slot:?}");
    }
    assert_eq!(compiler.hooks.call_count(HookSlot::BeforeRun), 0);
  }

  #[test]
  fn internal_plugins_follow_user_plugins() {
    let fs = project();
    let compiler = create_compiler(&config(&fs, json!({}))).unwrap();
    let applied = compiler.applied_plugins();
    let user = applied.iter().position(|name| name == "in-memory").unwrap();
    let target = applied.iter().position(|name| name == "TargetPlugin").unwrap();
    assert!(user < target, "{applied:?}");
  }
}

mod plugin_order {
  use super::*;

  #[test]
  fn later_plugins_see_earlier_state() {
    let fs = project();
    let events = events();

    let first_events = events.clone();
    let first = PluginSpec::callable("first", move |compiler: &mut Compiler| {
      let seen = compiler.hooks.done.tap_names().join(",");
      first_events.lock().unwrap().push(format!("first saw [{seen}]"));
      compiler.hooks.done.tap("first-tap", |_| Ok(()));
      Ok(())
    });
    let second_events = events.clone();
    let second = PluginSpec::callable("second", move |compiler: &mut Compiler| {
      let seen = compiler.hooks.done.tap_names().join(",");
      second_events.lock().unwrap().push(format!("second saw [{seen}]"));
      compiler.hooks.done.tap("second-tap", |_| Ok(()));
      Ok(())
    });

    create_compiler(&config(&fs, json!({})).with_plugin(first).with_plugin(second)).unwrap();

    let log = snapshot(&events);
    assert_eq!(log[0], "first saw []");
    assert!(log[1].contains("first-tap"), "{log:?}");
    assert!(!log[0].contains("second-tap"));
  }

  #[test]
  fn invalid_plugin_names_index_and_stops_registration() {
    let fs = project();
    let events = events();
    let configuration = config(&fs, json!({}))
      .with_plugin(PluginSpec::invalid("number"))
      .with_plugin(recording(&events, "after"));

    let err = create_compiler(&configuration).unwrap_err();

    let BuildError::InvalidPlugin(invalid) = &err else {
      panic!("expected an invalid plugin error, got {err}");
    };
    // The in-memory plugin sits at index 0.
    assert_eq!(invalid.index, 1);
    assert!(err.to_string().contains("index 1"));
    assert!(snapshot(&events).is_empty());
  }
}

mod schema_gate {
  use super::*;

  fn rejecting_gate(registry: &Arc<DiagnosticRegistry>) -> SchemaGate {
    SchemaGate::default()
      .with_predicate(Arc::new(|_| false))
      .with_diagnostics(registry.clone())
  }

  #[test]
  fn fast_fail_slow_pass_proceeds_with_one_diagnostic() {
    let fs = project();
    let registry = Arc::new(DiagnosticRegistry::default());
    let dispatcher = Dispatcher::new(rejecting_gate(&registry));

    for _ in 0..3 {
      let handle = dispatcher.build_sync(ConfigInput::from(config(&fs, json!({})))).unwrap();
      assert!(handle.as_single().is_some());
    }

    assert!(registry.has_emitted(DiagnosticCode::SchemaGateMismatch));
    assert_eq!(registry.occurrences(DiagnosticCode::SchemaGateMismatch), 3);
  }

  #[test]
  fn fast_fail_slow_fail_returns_descriptive_error() {
    let fs = project();
    let registry = Arc::new(DiagnosticRegistry::default());
    let dispatcher = Dispatcher::new(rejecting_gate(&registry));

    let err = dispatcher
      .build_sync(ConfigInput::from(config(&fs, json!({ "mode": "fast", "devtool": 3 }))))
      .unwrap_err();

    let BuildError::Schema(schema) = &err else {
      panic!("expected a schema error, got {err}");
    };
    let paths = schema.paths();
    assert!(paths.contains(&"configuration.mode"), "{paths:?}");
    assert!(paths.contains(&"configuration.devtool"), "{paths:?}");
    assert!(!registry.has_emitted(DiagnosticCode::SchemaGateMismatch));
  }

  #[test]
  fn whole_multi_input_is_validated() {
    let fs = project();
    let err = dispatcher()
      .build_sync(ConfigInput::multi(vec![
        config(&fs, json!({ "name": "a" })),
        config(&fs, json!({ "name": "b", "bail": "yes" })),
      ]))
      .unwrap_err();
    assert!(err.to_string().contains("configuration[1].bail"), "{err}");
  }
}
