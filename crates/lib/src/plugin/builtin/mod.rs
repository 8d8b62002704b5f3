//! Internal plugins derived from options.
//!
//! After user plugins are registered and the options fully defaulted, each
//! remaining option is translated into an internal plugin and applied, in a
//! fixed order.

mod cache;
mod devtool;
mod externals;
mod performance;
mod records;
mod resolve;
mod target;
mod watch_ignore;

use tracing::debug;

use crate::compiler::Compiler;
use crate::config::Toggle;
use crate::factory::ConstructionError;

use super::Plugin;

pub use cache::{CachePlugin, MemoryCache};
pub use devtool::{Devtool, DevtoolPlugin};
pub use externals::ExternalsPlugin;
pub use performance::PerformancePlugin;
pub use records::{Records, RecordsPlugin};
pub use resolve::ResolvePlugin;
pub use target::{TargetPlugin, TargetProperties};
pub use watch_ignore::WatchIgnorePlugin;

/// Build the internal plugins the compiler's options call for.
pub fn plugins_for(compiler: &Compiler) -> Vec<Box<dyn Plugin>> {
  let options = compiler.options();
  let mut plugins: Vec<Box<dyn Plugin>> = Vec::new();

  if let Some(target) = &options.target {
    plugins.push(Box::new(TargetPlugin::new(target.clone())));
  }
  if let Some(externals) = options.externals.as_ref().filter(|e| !e.is_empty()) {
    plugins.push(Box::new(ExternalsPlugin::new(externals.clone())));
  }
  plugins.push(Box::new(ResolvePlugin::new(options.resolve.clone())));
  if let Some(Toggle::Value(devtool)) = &options.devtool {
    plugins.push(Box::new(DevtoolPlugin::new(devtool.clone())));
  }
  if let Some(Toggle::Value(_)) = &options.cache {
    plugins.push(Box::new(CachePlugin));
  }
  if let Some(Toggle::Value(performance)) = &options.performance
    && !performance.hints.as_ref().is_some_and(Toggle::is_disabled)
  {
    plugins.push(Box::new(PerformancePlugin::new(performance.clone())));
  }
  if let Some(ignored) = options.watch_options.ignored.as_ref().filter(|i| !i.is_empty()) {
    plugins.push(Box::new(WatchIgnorePlugin::new(ignored.clone())));
  }
  let input = options.records_input_path.as_ref().and_then(Toggle::value).cloned();
  let output = options.records_output_path.as_ref().and_then(Toggle::value).cloned();
  if input.is_some() || output.is_some() {
    plugins.push(Box::new(RecordsPlugin::new(input, output)));
  }
  plugins
}

/// Apply every internal plugin the options call for.
pub fn apply_options(compiler: &mut Compiler) -> Result<(), ConstructionError> {
  for plugin in plugins_for(compiler) {
    plugin
      .apply(compiler)
      .map_err(|source| ConstructionError::InternalPlugin {
        name: plugin.name().to_string(),
        source,
      })?;
    compiler.record_plugin(plugin.name());
    debug!(plugin = plugin.name(), "applied internal plugin");
  }
  Ok(())
}
