//! strata-lib: the build-orchestration front door for strata.
//!
//! This crate turns raw build configurations into running compilers:
//! - `config`: normalization, the two-tier schema gate, defaults and config loading
//! - `plugin`: the plugin protocol, the registrar and the internal plugins
//! - `compiler`: the `Compiler`, its hook slots, run/watch/close and `Stats`
//! - `factory`: the fixed construction pipeline for a single compiler
//! - `multi`: multi-configuration builds and their dependency graph
//! - `dispatch`: the single entry point deciding between run and watch

pub mod compiler;
pub mod config;
pub mod consts;
pub mod diagnostics;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod factory;
pub mod fs;
pub mod logging;
pub mod lua;
pub mod multi;
pub mod plugin;
pub mod util;

pub use compiler::{Compiler, Stats};
pub use config::{ConfigInput, Configuration, MultiOptions};
pub use dispatch::{BuildCallback, BuildHandle, BuildStats, Dispatcher, build, build_async, build_sync};
pub use error::BuildError;
pub use factory::create_compiler;
pub use multi::{MultiCompiler, create_multi_compiler};
pub use plugin::{Plugin, PluginError, PluginSpec};
