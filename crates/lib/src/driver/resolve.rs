//! Request resolution for the passthrough driver.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::ResolveOptions;
use crate::fs::{InputFileSystem, normalize_path};

/// Resolution settings installed by the resolve plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
  pub extensions: Vec<String>,
  pub alias: BTreeMap<String, String>,
  pub modules: Vec<String>,
}

impl Resolution {
  pub fn from_options(options: &ResolveOptions) -> Self {
    Self {
      extensions: options.extensions.clone().unwrap_or_default(),
      alias: options.alias.clone().unwrap_or_default(),
      modules: options.modules.clone().unwrap_or_default(),
    }
  }

  /// Resolve `request` from `context` to an existing file.
  ///
  /// Relative and absolute requests are joined to the context. Bare requests
  /// are looked up in each module directory, walking up from the context for
  /// relative directory names. A candidate is tried as-is, with each extension
  /// appended, then as a directory `index` with each extension.
  pub fn resolve(&self, context: &Path, request: &str, fs: &dyn InputFileSystem) -> Option<PathBuf> {
    let request = self.apply_alias(request);
    let path = Path::new(&request);

    if path.is_absolute() || request.starts_with("./") || request.starts_with("../") || request == "." {
      return self.try_file(&context.join(path), fs);
    }

    for dir in &self.modules {
      let dir = Path::new(dir);
      if dir.is_absolute() {
        if let Some(found) = self.try_file(&dir.join(path), fs) {
          return Some(found);
        }
        continue;
      }
      for ancestor in context.ancestors() {
        if let Some(found) = self.try_file(&ancestor.join(dir).join(path), fs) {
          return Some(found);
        }
      }
    }
    None
  }

  fn apply_alias(&self, request: &str) -> String {
    for (from, to) in &self.alias {
      if request == from {
        return to.clone();
      }
      if let Some(rest) = request.strip_prefix(from.as_str())
        && rest.starts_with('/')
      {
        return format!("{to}{rest}");
      }
    }
    request.to_string()
  }

  fn try_file(&self, base: &Path, fs: &dyn InputFileSystem) -> Option<PathBuf> {
    let base = normalize_path(base);
    if fs.is_file(&base) {
      return Some(base);
    }
    let with_extension = |path: &Path, extension: &str| {
      let mut name = path.as_os_str().to_owned();
      name.push(extension);
      PathBuf::from(name)
    };
    let index = base.join("index");
    self
      .extensions
      .iter()
      .map(|ext| with_extension(&base, ext))
      .chain(self.extensions.iter().map(|ext| with_extension(&index, ext)))
      .find(|candidate| fs.is_file(candidate))
  }
}
