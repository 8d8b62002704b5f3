use crate::compiler::Compiler;
use crate::config::Toggle;
use crate::plugin::{Plugin, PluginError};

/// Runtime environment properties derived from `target`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetProperties {
  pub web: bool,
  pub webworker: bool,
  pub node: bool,
  pub electron: bool,
}

impl TargetProperties {
  /// Combine the properties of every listed target.
  ///
  /// Recognized names: `web`, `webworker`, `node` (optionally versioned, as in
  /// `node18`), `async-node` and `electron-main`/`electron-renderer`/`electron-preload`.
  pub fn from_targets(targets: &[String]) -> Result<Self, PluginError> {
    let mut properties = TargetProperties::default();
    for target in targets {
      match target.as_str() {
        "web" => properties.web = true,
        "webworker" => properties.webworker = true,
        "async-node" => properties.node = true,
        "electron-main" | "electron-preload" => {
          properties.electron = true;
          properties.node = true;
        }
        "electron-renderer" => {
          properties.electron = true;
          properties.web = true;
        }
        other
          if other
            .strip_prefix("node")
            .is_some_and(|version| version.chars().all(|c| c.is_ascii_digit() || c == '.')) =>
        {
          properties.node = true
        }
        other => return Err(PluginError::message(format!("unknown target '{other}'"))),
      }
    }
    Ok(properties)
  }

  /// Browser-style targets get their bundle wrapped in a closure.
  pub fn wraps_in_closure(&self) -> bool {
    (self.web || self.webworker) && !self.node
  }
}

pub struct TargetPlugin {
  target: Toggle<Vec<String>>,
}

impl TargetPlugin {
  pub fn new(target: Toggle<Vec<String>>) -> Self {
    Self { target }
  }
}

impl Plugin for TargetPlugin {
  fn name(&self) -> &str {
    "TargetPlugin"
  }

  fn apply(&self, compiler: &mut Compiler) -> Result<(), PluginError> {
    compiler.target = match &self.target {
      Toggle::Value(targets) => TargetProperties::from_targets(targets)?,
      Toggle::Flag(_) => TargetProperties::default(),
    };
    Ok(())
  }
}
