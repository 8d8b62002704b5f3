use crate::compiler::Compiler;
use crate::plugin::{Plugin, PluginError};

/// Excludes paths containing any of the given fragments from watching.
pub struct WatchIgnorePlugin {
  ignored: Vec<String>,
}

impl WatchIgnorePlugin {
  pub fn new(ignored: Vec<String>) -> Self {
    Self { ignored }
  }
}

impl Plugin for WatchIgnorePlugin {
  fn name(&self) -> &str {
    "WatchIgnorePlugin"
  }

  fn apply(&self, compiler: &mut Compiler) -> Result<(), PluginError> {
    compiler.watch_ignored.extend(self.ignored.iter().cloned());
    Ok(())
  }
}
