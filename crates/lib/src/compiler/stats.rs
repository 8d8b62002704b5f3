//! Compilation results.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
  /// Path relative to `output.path`.
  pub name: String,
  pub size: u64,
  /// Whether the asset was written to the output file system.
  pub emitted: bool,
}

/// The outcome of one compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
  pub name: Option<String>,
  pub hash: String,
  pub duration_ms: u64,
  pub assets: Vec<AssetInfo>,
  /// Entry name to the assets it produced.
  pub entrypoints: BTreeMap<String, Vec<String>>,
  pub file_dependencies: Vec<PathBuf>,
  /// Requests left to the runtime environment.
  pub externals: Vec<String>,
  pub warnings: Vec<String>,
  pub errors: Vec<String>,
}

impl Stats {
  pub fn has_errors(&self) -> bool {
    !self.errors.is_empty()
  }

  pub fn has_warnings(&self) -> bool {
    !self.warnings.is_empty()
  }

  pub fn asset(&self, name: &str) -> Option<&AssetInfo> {
    self.assets.iter().find(|asset| asset.name == name)
  }

  /// Total size of the assets an entrypoint produced.
  pub fn entrypoint_size(&self, entry: &str) -> u64 {
    self
      .entrypoints
      .get(entry)
      .into_iter()
      .flatten()
      .filter_map(|name| self.asset(name))
      .map(|asset| asset.size)
      .sum()
  }
}

/// Results of a multi-configuration build, children in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiStats {
  pub children: Vec<Stats>,
  /// Children not built because a dependency failed.
  pub skipped: Vec<String>,
}

impl MultiStats {
  pub fn has_errors(&self) -> bool {
    self.children.iter().any(Stats::has_errors)
  }

  pub fn child(&self, name: &str) -> Option<&Stats> {
    self.children.iter().find(|stats| stats.name.as_deref() == Some(name))
  }
}
