//! Implementation of the `strata validate` command.

use std::path::Path;

use anyhow::Result;

use strata_lib::{BuildHandle, Dispatcher};

use crate::output::{print_stat, print_success};

use super::load_input;

/// Validate a config file by constructing its compilers.
///
/// Runs the schema gate, every plugin and the construction hooks, but never
/// compiles.
pub fn cmd_validate(config: Option<&Path>) -> Result<()> {
  let (path, input) = load_input(config)?;
  let handle = Dispatcher::default().create(&input)?;

  print_success(&format!("{} is valid", path.display()));
  match handle {
    BuildHandle::Single(compiler) => {
      print_stat("compiler", compiler.name().unwrap_or("(unnamed)"));
      print_stat("plugins", &compiler.applied_plugins().join(", "));
    }
    BuildHandle::Multi(multi) => {
      for compiler in multi.compilers() {
        let deps = compiler.options().dependencies().join(", ");
        let label = compiler.name().unwrap_or("(unnamed)");
        if deps.is_empty() {
          print_stat("compiler", label);
        } else {
          print_stat("compiler", &format!("{label} (after {deps})"));
        }
      }
    }
  }
  Ok(())
}
