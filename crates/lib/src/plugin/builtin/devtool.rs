use std::str::FromStr;

use crate::compiler::Compiler;
use crate::plugin::{Plugin, PluginError};

/// A parsed `devtool` setting such as `eval-cheap-source-map`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Devtool {
  pub eval: bool,
  pub source_map: bool,
  pub inline: bool,
  pub hidden: bool,
  pub nosources: bool,
  pub cheap: bool,
}

impl FromStr for Devtool {
  type Err = PluginError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut devtool = Devtool::default();
    let mut parts = s.split('-').peekable();
    while let Some(part) = parts.next() {
      match part {
        "eval" => devtool.eval = true,
        "inline" => devtool.inline = true,
        "hidden" => devtool.hidden = true,
        "nosources" => devtool.nosources = true,
        "cheap" => devtool.cheap = true,
        "module" => {}
        "source" if parts.peek() == Some(&"map") => {
          parts.next();
          devtool.source_map = true;
        }
        _ => return Err(PluginError::message(format!("invalid devtool '{s}'"))),
      }
    }
    if !devtool.eval && !devtool.source_map {
      return Err(PluginError::message(format!("invalid devtool '{s}'")));
    }
    Ok(devtool)
  }
}

pub struct DevtoolPlugin {
  devtool: String,
}

impl DevtoolPlugin {
  pub fn new(devtool: String) -> Self {
    Self { devtool }
  }
}

impl Plugin for DevtoolPlugin {
  fn name(&self) -> &str {
    "DevtoolPlugin"
  }

  fn apply(&self, compiler: &mut Compiler) -> Result<(), PluginError> {
    compiler.devtool = Some(self.devtool.parse()?);
    Ok(())
  }
}
