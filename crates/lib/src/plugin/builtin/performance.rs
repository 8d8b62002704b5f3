use crate::compiler::{Compiler, Stats};
use crate::config::{HintLevel, PerformanceOptions, Toggle};
use crate::consts::DEFAULT_PERFORMANCE_BUDGET;
use crate::plugin::{Plugin, PluginError};

/// Reports assets and entrypoints over their size budget.
pub struct PerformancePlugin {
  options: PerformanceOptions,
}

impl PerformancePlugin {
  pub fn new(options: PerformanceOptions) -> Self {
    Self { options }
  }
}

fn over_budget(stats: &Stats, max_asset: u64, max_entrypoint: u64) -> Vec<String> {
  let mut hints = Vec::new();
  for asset in stats.assets.iter().filter(|a| !a.name.ends_with(".map")) {
    if asset.size > max_asset {
      hints.push(format!(
        "asset size limit: '{}' ({} bytes) exceeds the recommended limit ({max_asset} bytes)",
        asset.name, asset.size
      ));
    }
  }
  for entry in stats.entrypoints.keys() {
    let size = stats.entrypoint_size(entry);
    if size > max_entrypoint {
      hints.push(format!(
        "entrypoint size limit: '{entry}' ({size} bytes) exceeds the recommended limit ({max_entrypoint} bytes)"
      ));
    }
  }
  hints
}

impl Plugin for PerformancePlugin {
  fn name(&self) -> &str {
    "PerformancePlugin"
  }

  fn apply(&self, compiler: &mut Compiler) -> Result<(), PluginError> {
    let level = match self.options.hints {
      Some(Toggle::Value(level)) => level,
      Some(Toggle::Flag(false)) => return Ok(()),
      _ => HintLevel::Warning,
    };
    let max_asset = self.options.max_asset_size.unwrap_or(DEFAULT_PERFORMANCE_BUDGET);
    let max_entrypoint = self.options.max_entrypoint_size.unwrap_or(DEFAULT_PERFORMANCE_BUDGET);

    compiler.hooks.after_compile.tap("PerformancePlugin", move |stats| {
      let hints = over_budget(stats, max_asset, max_entrypoint);
      match level {
        HintLevel::Warning => stats.warnings.extend(hints),
        HintLevel::Error => stats.errors.extend(hints),
      }
      Ok(())
    });
    Ok(())
  }
}
