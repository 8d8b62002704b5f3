use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use strata_lib::compiler::Compiler;
use strata_lib::diagnostics::DiagnosticRegistry;
use strata_lib::fs::MemoryFileSystem;
use strata_lib::{Configuration, Dispatcher, PluginSpec};

/// An in-memory project rooted at `/p` with a single entry module.
pub fn project() -> Arc<MemoryFileSystem> {
  Arc::new(MemoryFileSystem::with_files([
    ("/p/src/index.js", "console.log('index');"),
    ("/p/src/a.js", "console.log('a');"),
    ("/p/src/b.js", "console.log('b');"),
  ]))
}

/// Routes every file system of a compiler to `fs`.
pub fn in_memory(fs: &Arc<MemoryFileSystem>) -> PluginSpec {
  let fs = fs.clone();
  PluginSpec::callable("in-memory", move |compiler: &mut Compiler| {
    compiler.input_file_system = Some(fs.clone());
    compiler.output_file_system = Some(fs.clone());
    compiler.watch_file_system = Some(fs.clone());
    Ok(())
  })
}

/// A configuration rooted at `/p` that reads and writes `fs`.
pub fn config(fs: &Arc<MemoryFileSystem>, mut options: Value) -> Configuration {
  if let Some(map) = options.as_object_mut() {
    map.insert("context".to_string(), json!("/p"));
    map.entry("mode").or_insert(json!("none"));
  }
  Configuration::new(options).with_plugin(in_memory(fs))
}

/// A dispatcher with its own diagnostics registry.
pub fn dispatcher() -> Dispatcher {
  Dispatcher::default().with_diagnostics(Arc::new(DiagnosticRegistry::default()))
}

/// Shared event log for plugins and taps.
pub type Events = Arc<Mutex<Vec<String>>>;

pub fn events() -> Events {
  Arc::new(Mutex::new(Vec::new()))
}

pub fn snapshot(events: &Events) -> Vec<String> {
  events.lock().unwrap().clone()
}
