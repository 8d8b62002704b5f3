use std::collections::BTreeMap;

use crate::compiler::Compiler;
use crate::plugin::{Plugin, PluginError};

/// Marks requests as provided by the runtime environment.
pub struct ExternalsPlugin {
  externals: BTreeMap<String, String>,
}

impl ExternalsPlugin {
  pub fn new(externals: BTreeMap<String, String>) -> Self {
    Self { externals }
  }
}

impl Plugin for ExternalsPlugin {
  fn name(&self) -> &str {
    "ExternalsPlugin"
  }

  fn apply(&self, compiler: &mut Compiler) -> Result<(), PluginError> {
    compiler.externals.extend(self.externals.clone());
    Ok(())
  }
}
