use thiserror::Error;

use crate::compiler::{CloseError, RunError};
use crate::config::schema::SchemaValidationError;
use crate::factory::ConstructionError;
use crate::multi::DependencyGraphError;
use crate::plugin::InvalidPluginError;

/// Any failure of a build invocation.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Schema(#[from] SchemaValidationError),

  #[error(transparent)]
  InvalidPlugin(#[from] InvalidPluginError),

  #[error(transparent)]
  Construction(#[from] ConstructionError),

  #[error(transparent)]
  DependencyGraph(#[from] DependencyGraphError),

  #[error(transparent)]
  Run(#[from] RunError),

  #[error(transparent)]
  Close(#[from] CloseError),
}

impl BuildError {
  /// Whether the error happened before any compiler started running.
  pub fn is_construction(&self) -> bool {
    matches!(
      self,
      BuildError::Schema(_) | BuildError::InvalidPlugin(_) | BuildError::Construction(_) | BuildError::DependencyGraph(_)
    )
  }
}
