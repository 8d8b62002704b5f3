//! The compilation seam.
//!
//! Compilers never transform modules themselves; they hand a [`CompileContext`]
//! to a [`CompilationDriver`]. The default [`PassthroughDriver`] is a minimal
//! bundler good enough to exercise the whole orchestration path.

mod passthrough;
mod resolve;

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::compiler::Stats;
use crate::config::BuildOptions;
use crate::fs::{InputFileSystem, OutputFileSystem};
use crate::logging::InfrastructureLogger;
use crate::plugin::builtin::{Devtool, MemoryCache, TargetProperties};

pub use passthrough::PassthroughDriver;
pub use resolve::Resolution;

#[derive(Debug, Error)]
pub enum CompileError {
  #[error("failed to emit '{path}': {source}")]
  Emit {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("{0}")]
  Driver(String),
}

/// Everything a driver may read while compiling.
pub struct CompileContext<'a> {
  pub name: Option<&'a str>,
  pub context: &'a Path,
  pub options: &'a BuildOptions,
  pub input: &'a dyn InputFileSystem,
  pub output: &'a dyn OutputFileSystem,
  pub resolution: &'a Resolution,
  /// Request to global name.
  pub externals: &'a BTreeMap<String, String>,
  pub target: &'a TargetProperties,
  pub devtool: Option<&'a Devtool>,
  pub cache: Option<&'a MemoryCache>,
  pub logger: &'a InfrastructureLogger,
}

/// Performs one compilation.
///
/// Problems in the user's code are reported in [`Stats::errors`]; only
/// failures of the driver itself are returned as errors.
pub trait CompilationDriver: Send + Sync + fmt::Debug {
  fn compile(&self, ctx: &CompileContext<'_>) -> Result<Stats, CompileError>;
}
