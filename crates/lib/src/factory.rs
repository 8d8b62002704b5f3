//! Single-compiler construction.
//!
//! [`create_compiler`] runs a fixed pipeline:
//!
//! 1. normalize the raw options
//! 2. apply base defaults
//! 3. construct the compiler
//! 4. apply the environment plugin
//! 5. register user plugins in order
//! 6. apply full defaults
//! 7. fire `environment`, then `afterEnvironment`
//! 8. apply the internal plugins derived from options
//! 9. fire `initialize`
//!
//! Any failure aborts construction and no compiler is returned.

use std::io;

use thiserror::Error;
use tracing::info;

use crate::compiler::{Compiler, HookError};
use crate::config::Configuration;
use crate::config::defaults::{apply_base_defaults, apply_full_defaults};
use crate::config::normalize::{NormalizeError, normalize};
use crate::error::BuildError;
use crate::plugin::builtin::apply_options;
use crate::plugin::{EnvironmentPlugin, Plugin, PluginError, register_plugins};

#[derive(Debug, Error)]
pub enum ConstructionError {
  #[error(transparent)]
  Normalize(#[from] NormalizeError),

  #[error("failed to determine the context directory: {0}")]
  Context(#[source] io::Error),

  #[error("plugin '{name}' (index {index}) failed: {source}")]
  Plugin {
    index: usize,
    name: String,
    #[source]
    source: PluginError,
  },

  #[error("internal plugin '{name}' failed: {source}")]
  InternalPlugin {
    name: String,
    #[source]
    source: PluginError,
  },

  #[error(transparent)]
  Hook(#[from] HookError),
}

/// Build one compiler from a configuration.
pub fn create_compiler(configuration: &Configuration) -> Result<Compiler, BuildError> {
  let mut options = normalize(&configuration.options).map_err(ConstructionError::from)?;
  apply_base_defaults(&mut options).map_err(ConstructionError::Context)?;

  let mut compiler = Compiler::new(options);

  let environment = EnvironmentPlugin::new(compiler.options().infrastructure_logging.clone());
  environment
    .apply(&mut compiler)
    .map_err(|source| ConstructionError::InternalPlugin {
      name: environment.name().to_string(),
      source,
    })?;

  register_plugins(&mut compiler, &configuration.plugins)?;

  apply_full_defaults(compiler.options_mut());

  compiler.hooks.environment.call_once(&()).map_err(ConstructionError::from)?;
  compiler
    .hooks
    .after_environment
    .call_once(&())
    .map_err(ConstructionError::from)?;

  apply_options(&mut compiler)?;

  compiler.hooks.initialize.call_once(&()).map_err(ConstructionError::from)?;

  info!(
    compiler = compiler.name().unwrap_or("-"),
    context = %compiler.context().display(),
    plugins = configuration.plugins.len(),
    "compiler created"
  );
  Ok(compiler)
}
