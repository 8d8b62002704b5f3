use tracing::debug;

use crate::compiler::Compiler;
use crate::error::BuildError;
use crate::factory::ConstructionError;

use super::{InvalidPluginError, PluginSpec};

/// Register plugins in declaration order.
///
/// Each plugin completes before the next starts. The first failure stops
/// registration; later plugins are never applied.
pub fn register_plugins(compiler: &mut Compiler, plugins: &[PluginSpec]) -> Result<(), BuildError> {
  for (index, plugin) in plugins.iter().enumerate() {
    register(compiler, index, plugin)?;
  }
  Ok(())
}

/// Register one plugin, `index` being its position in the declared list.
pub fn register(compiler: &mut Compiler, index: usize, plugin: &PluginSpec) -> Result<(), BuildError> {
  let (name, result) = match plugin {
    PluginSpec::Callable { name, func } => (name.as_str(), func(compiler)),
    PluginSpec::Applyable(plugin) => (plugin.name(), plugin.apply(compiler)),
    PluginSpec::Invalid { kind } => {
      return Err(
        InvalidPluginError {
          index,
          kind: kind.clone(),
        }
        .into(),
      );
    }
  };
  result.map_err(|source| ConstructionError::Plugin {
    index,
    name: name.to_string(),
    source,
  })?;

  compiler.record_plugin(name);
  debug!(index, plugin = name, "registered plugin");
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;
  use crate::config::BuildOptions;
  use crate::plugin::{Plugin, PluginError};

  struct Banner;

  impl Plugin for Banner {
    fn name(&self) -> &str {
      "Banner"
    }

    fn apply(&self, compiler: &mut Compiler) -> Result<(), PluginError> {
      compiler.hooks.done.tap("Banner", |_| Ok(()));
      Ok(())
    }
  }

  fn compiler() -> Compiler {
    Compiler::new(BuildOptions::default())
  }

  #[test]
  fn both_shapes_register_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let first = seen.clone();
    let third = seen.clone();
    let plugins = vec![
      PluginSpec::callable("first", move |_| {
        first.lock().unwrap().push("first");
        Ok(())
      }),
      PluginSpec::applyable(Banner),
      PluginSpec::callable("third", move |compiler: &mut Compiler| {
        // Sees the tap the object plugin installed.
        third.lock().unwrap().push(if compiler.hooks.done.tap_names() == ["Banner"] {
          "third saw Banner"
        } else {
          "third"
        });
        Ok(())
      }),
    ];

    let mut compiler = compiler();
    register_plugins(&mut compiler, &plugins).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["first", "third saw Banner"]);
    assert_eq!(compiler.applied_plugins(), ["first", "Banner", "third"]);
  }

  #[test]
  fn invalid_plugin_names_its_index_and_stops() {
    let reached = Arc::new(Mutex::new(false));
    let flag = reached.clone();
    let plugins = vec![
      PluginSpec::applyable(Banner),
      PluginSpec::invalid("number"),
      PluginSpec::callable("after", move |_| {
        *flag.lock().unwrap() = true;
        Ok(())
      }),
    ];

    let mut compiler = compiler();
    let err = register_plugins(&mut compiler, &plugins).unwrap_err();
    match err {
      BuildError::InvalidPlugin(InvalidPluginError { index, kind }) => {
        assert_eq!(index, 1);
        assert_eq!(kind, "number");
      }
      other => panic!("expected InvalidPlugin, got {other:?}"),
    }
    assert!(!*reached.lock().unwrap());
    assert_eq!(compiler.applied_plugins(), ["Banner"]);
  }

  #[test]
  fn failing_plugin_is_a_construction_error() {
    let plugins = vec![PluginSpec::callable("broken", |_| Err(PluginError::message("no config")))];
    let err = register_plugins(&mut compiler(), &plugins).unwrap_err();
    assert!(matches!(
      err,
      BuildError::Construction(ConstructionError::Plugin { index: 0, ref name, .. }) if name == "broken"
    ));
  }
}
