//! Plugins.
//!
//! A plugin is either a function called with the compiler, or an object whose
//! `apply` method is called with the compiler. Both shapes get `&mut Compiler`
//! and typically tap hooks or replace collaborators.
//!
//! Configurations loaded from data files cannot express either shape, so their
//! plugin entries become [`PluginSpec::Invalid`] and are rejected at
//! registration.

pub mod builtin;
mod environment;
mod registrar;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::compiler::Compiler;
use crate::config::normalize::kind_of;

pub use environment::EnvironmentPlugin;
pub use registrar::{register, register_plugins};

/// A plugin with an `apply` method.
pub trait Plugin: Send + Sync {
  fn name(&self) -> &str;

  fn apply(&self, compiler: &mut Compiler) -> Result<(), PluginError>;
}

/// A plugin expressed as a function.
pub type PluginFn = Arc<dyn Fn(&mut Compiler) -> Result<(), PluginError> + Send + Sync>;

#[derive(Debug, Error)]
pub enum PluginError {
  #[error("{0}")]
  Message(String),

  #[error("lua error: {0}")]
  Lua(#[from] mlua::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl PluginError {
  pub fn message(message: impl Into<String>) -> Self {
    PluginError::Message(message.into())
  }
}

#[derive(Debug, Clone, Error)]
#[error("plugin at index {index} is neither a function nor an object with an apply method (got {kind})")]
pub struct InvalidPluginError {
  pub index: usize,
  pub kind: String,
}

/// A configured plugin, as declared by the user.
#[derive(Clone)]
pub enum PluginSpec {
  Callable { name: String, func: PluginFn },
  Applyable(Arc<dyn Plugin>),
  Invalid { kind: String },
}

impl PluginSpec {
  pub fn callable<F>(name: impl Into<String>, func: F) -> Self
  where
    F: Fn(&mut Compiler) -> Result<(), PluginError> + Send + Sync + 'static,
  {
    PluginSpec::Callable {
      name: name.into(),
      func: Arc::new(func),
    }
  }

  pub fn applyable(plugin: impl Plugin + 'static) -> Self {
    PluginSpec::Applyable(Arc::new(plugin))
  }

  pub fn invalid(kind: impl Into<String>) -> Self {
    PluginSpec::Invalid { kind: kind.into() }
  }

  /// Plugin entries read from data are never executable.
  pub fn from_json(value: &Value) -> Self {
    PluginSpec::invalid(kind_of(value))
  }

  pub fn kind(&self) -> &str {
    match self {
      PluginSpec::Callable { .. } => "function",
      PluginSpec::Applyable(_) => "object",
      PluginSpec::Invalid { kind } => kind,
    }
  }

  pub fn name(&self) -> Option<&str> {
    match self {
      PluginSpec::Callable { name, .. } => Some(name),
      PluginSpec::Applyable(plugin) => Some(plugin.name()),
      PluginSpec::Invalid { .. } => None,
    }
  }
}

impl fmt::Debug for PluginSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PluginSpec::Callable { name, .. } => f.debug_tuple("Callable").field(name).finish(),
      PluginSpec::Applyable(plugin) => f.debug_tuple("Applyable").field(&plugin.name()).finish(),
      PluginSpec::Invalid { kind } => f.debug_struct("Invalid").field("kind", kind).finish(),
    }
  }
}

impl<P: Plugin + 'static> From<P> for PluginSpec {
  fn from(plugin: P) -> Self {
    PluginSpec::applyable(plugin)
  }
}
