mod build;
mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use strata_lib::ConfigInput;
use strata_lib::config::load::{find_config, load_config};

pub use build::{BuildArgs, cmd_build};
pub use validate::cmd_validate;

/// Locate and load the config file.
///
/// Configurations without a `context` get the config file's directory, so a
/// build behaves the same whatever directory it is started from.
fn load_input(config: Option<&Path>) -> Result<(PathBuf, ConfigInput)> {
  let path = match config {
    Some(path) => path.to_path_buf(),
    None => {
      let cwd = std::env::current_dir().context("Failed to determine the current directory")?;
      find_config(&cwd)?
    }
  };
  let mut input = load_config(&path).with_context(|| format!("Failed to load {}", path.display()))?;

  let dir = dunce::canonicalize(&path)
    .with_context(|| format!("Failed to resolve {}", path.display()))?
    .parent()
    .map(Path::to_path_buf)
    .unwrap_or_default();
  for configuration in input.configurations_mut() {
    if let Value::Object(options) = &mut configuration.options {
      options
        .entry("context")
        .or_insert_with(|| Value::String(dir.to_string_lossy().into_owned()));
    }
  }
  debug!(path = %path.display(), multi = input.is_multi(), "loaded config");
  Ok((path, input))
}
