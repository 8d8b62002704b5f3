//! Reading configuration files.
//!
//! `.lua` files are evaluated; `.json`, `.yaml` and `.yml` files are parsed
//! as data. A data file holding an array is a multi-configuration build.

use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::lua::load_lua_config;

use super::{ConfigInput, Configuration};

/// File names looked up, in order, when no config path is given.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["strata.lua", "strata.json", "strata.yaml", "strata.yml"];

#[derive(Debug, Error)]
pub enum LoadError {
  #[error("failed to read config '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to evaluate config '{path}': {source}")]
  Lua {
    path: PathBuf,
    #[source]
    source: mlua::Error,
  },

  #[error("failed to parse config '{path}': {source}")]
  Json {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to parse config '{path}': {source}")]
  Yaml {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("unsupported config file '{0}': expected .lua, .json, .yaml or .yml")]
  UnsupportedExtension(PathBuf),

  #[error("no config file found in '{0}'")]
  NotFound(PathBuf),
}

/// Load a config file, choosing the format by extension.
pub fn load_config(path: &Path) -> Result<ConfigInput, LoadError> {
  let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
  debug!(path = %path.display(), "loading config");
  match extension {
    "lua" => load_lua_config(path).map_err(|source| LoadError::Lua {
      path: path.to_path_buf(),
      source,
    }),
    "json" => {
      let value = serde_json::from_str(&read(path)?).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
      })?;
      Ok(config_input_from_value(value))
    }
    "yaml" | "yml" => {
      let value = serde_yaml::from_str(&read(path)?).map_err(|source| LoadError::Yaml {
        path: path.to_path_buf(),
        source,
      })?;
      Ok(config_input_from_value(value))
    }
    _ => Err(LoadError::UnsupportedExtension(path.to_path_buf())),
  }
}

/// Find the default config file in `dir`.
pub fn find_config(dir: &Path) -> Result<PathBuf, LoadError> {
  DEFAULT_CONFIG_FILES
    .iter()
    .map(|name| dir.join(name))
    .find(|candidate| candidate.is_file())
    .ok_or_else(|| LoadError::NotFound(dir.to_path_buf()))
}

/// Interpret parsed data: an array is a multi-configuration build.
pub fn config_input_from_value(value: Value) -> ConfigInput {
  match value {
    Value::Array(items) => ConfigInput::multi(items.into_iter().map(Configuration::new).collect()),
    other => ConfigInput::Single(Configuration::new(other)),
  }
}

fn read(path: &Path) -> Result<String, LoadError> {
  std::fs::read_to_string(path).map_err(|source| LoadError::Read {
    path: path.to_path_buf(),
    source,
  })
}
