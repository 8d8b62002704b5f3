//! Defaults for normalized options.
//!
//! Two passes, both of which only fill fields that are unset. A field the user
//! set explicitly is never replaced, including `false` and empty lists.
//!
//! - the base pass runs before the compiler exists and fills what construction
//!   needs: the context directory and infrastructure logging
//! - the full pass runs after user plugins are registered and fills the rest

use std::collections::BTreeMap;
use std::io;

use crate::consts::{
  DEFAULT_AGGREGATE_TIMEOUT_MS, DEFAULT_DEVELOPMENT_DEVTOOL, DEFAULT_ENTRY_NAME, DEFAULT_ENTRY_REQUEST,
  DEFAULT_EXTENSIONS, DEFAULT_MODULE_DIRS, DEFAULT_OUTPUT_DIR, DEFAULT_OUTPUT_FILENAME, DEFAULT_PARALLELISM,
  DEFAULT_PERFORMANCE_BUDGET, DEFAULT_PUBLIC_PATH, DEFAULT_TARGET,
};

use super::{BuildOptions, CacheKind, CacheOptions, EntryDescription, HintLevel, LogLevel, Mode, PerformanceOptions, Toggle};

fn strings(values: &[&str]) -> Vec<String> {
  values.iter().map(|s| s.to_string()).collect()
}

/// Fill the defaults needed to construct a compiler.
///
/// The context defaults to the process working directory.
pub fn apply_base_defaults(options: &mut BuildOptions) -> io::Result<()> {
  if options.context.is_none() {
    let cwd = std::env::current_dir()?;
    options.context = Some(dunce::simplified(&cwd).to_path_buf());
  }
  let logging = &mut options.infrastructure_logging;
  logging.level.get_or_insert(LogLevel::Info);
  logging.debug.get_or_insert(false);
  Ok(())
}

/// Fill every remaining default.
///
/// Expects the base pass to have run; an unset context is treated as `.`.
pub fn apply_full_defaults(options: &mut BuildOptions) {
  let mode = *options.mode.get_or_insert(Mode::Production);
  let production = mode == Mode::Production;
  let development = mode == Mode::Development;
  let context = options.context.clone().unwrap_or_else(|| ".".into());

  options.entry.get_or_insert_with(|| {
    BTreeMap::from([(
      DEFAULT_ENTRY_NAME.to_string(),
      EntryDescription::new([DEFAULT_ENTRY_REQUEST]),
    )])
  });
  options.devtool.get_or_insert_with(|| {
    if development {
      Toggle::Value(DEFAULT_DEVELOPMENT_DEVTOOL.to_string())
    } else {
      Toggle::Flag(false)
    }
  });
  options
    .target
    .get_or_insert_with(|| Toggle::Value(vec![DEFAULT_TARGET.to_string()]));

  let output = &mut options.output;
  output.path.get_or_insert_with(|| context.join(DEFAULT_OUTPUT_DIR));
  output.filename.get_or_insert_with(|| DEFAULT_OUTPUT_FILENAME.to_string());
  output.public_path.get_or_insert_with(|| DEFAULT_PUBLIC_PATH.to_string());

  options.module.rules.get_or_insert_with(Vec::new);

  let resolve = &mut options.resolve;
  resolve.extensions.get_or_insert_with(|| strings(DEFAULT_EXTENSIONS));
  resolve.modules.get_or_insert_with(|| strings(DEFAULT_MODULE_DIRS));
  resolve.alias.get_or_insert_with(BTreeMap::new);

  options.externals.get_or_insert_with(BTreeMap::new);

  options.cache.get_or_insert_with(|| {
    if development {
      Toggle::Value(CacheOptions { kind: CacheKind::Memory })
    } else {
      Toggle::Flag(false)
    }
  });

  let mut performance = match options.performance.take() {
    None if production => Toggle::Value(PerformanceOptions::default()),
    None => Toggle::Flag(false),
    Some(Toggle::Flag(true)) => Toggle::Value(PerformanceOptions::default()),
    Some(given) => given,
  };
  if let Toggle::Value(budgets) = &mut performance {
    budgets.hints.get_or_insert(Toggle::Value(HintLevel::Warning));
    budgets.max_asset_size.get_or_insert(DEFAULT_PERFORMANCE_BUDGET);
    budgets.max_entrypoint_size.get_or_insert(DEFAULT_PERFORMANCE_BUDGET);
  }
  options.performance = Some(performance);

  let optimization = &mut options.optimization;
  optimization.minimize.get_or_insert(production);
  optimization.node_env.get_or_insert_with(|| match mode {
    Mode::None => Toggle::Flag(false),
    other => Toggle::Value(other.as_str().to_string()),
  });
  optimization.emit_on_errors.get_or_insert(!production);

  options.watch.get_or_insert(false);
  let watch_options = &mut options.watch_options;
  watch_options.aggregate_timeout.get_or_insert(DEFAULT_AGGREGATE_TIMEOUT_MS);
  watch_options.poll.get_or_insert(Toggle::Flag(false));
  watch_options.ignored.get_or_insert_with(Vec::new);

  let records = options.records_path.get_or_insert(Toggle::Flag(false)).clone();
  options.records_input_path.get_or_insert_with(|| records.clone());
  options.records_output_path.get_or_insert(records);

  options.parallelism.get_or_insert(DEFAULT_PARALLELISM);
  options.bail.get_or_insert(false);
}
