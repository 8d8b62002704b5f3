use std::sync::Arc;

use crate::compiler::Compiler;
use crate::config::InfrastructureLogging;
use crate::fs::LocalFileSystem;
use crate::logging::InfrastructureLogger;

use super::{Plugin, PluginError};

/// Attaches the infrastructure logger and the local file system.
///
/// Registered by the factory before any user plugin, so user plugins can swap
/// out what it installs.
#[derive(Debug, Clone)]
pub struct EnvironmentPlugin {
  logging: InfrastructureLogging,
}

impl EnvironmentPlugin {
  pub fn new(logging: InfrastructureLogging) -> Self {
    Self { logging }
  }
}

impl Plugin for EnvironmentPlugin {
  fn name(&self) -> &str {
    "EnvironmentPlugin"
  }

  fn apply(&self, compiler: &mut Compiler) -> Result<(), PluginError> {
    let name = compiler.name().unwrap_or("strata").to_string();
    compiler.infrastructure_logger = InfrastructureLogger::new(name, &self.logging);

    let fs = Arc::new(LocalFileSystem);
    compiler.input_file_system = Some(fs.clone());
    compiler.output_file_system = Some(fs.clone());
    compiler.watch_file_system = Some(fs);
    Ok(())
  }
}
