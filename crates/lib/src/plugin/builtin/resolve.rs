use crate::compiler::Compiler;
use crate::config::ResolveOptions;
use crate::driver::Resolution;
use crate::plugin::{Plugin, PluginError};

pub struct ResolvePlugin {
  options: ResolveOptions,
}

impl ResolvePlugin {
  pub fn new(options: ResolveOptions) -> Self {
    Self { options }
  }
}

impl Plugin for ResolvePlugin {
  fn name(&self) -> &str {
    "ResolvePlugin"
  }

  fn apply(&self, compiler: &mut Compiler) -> Result<(), PluginError> {
    compiler.resolution = Resolution::from_options(&self.options);
    Ok(())
  }
}
