//! File system seams used by compilers.
//!
//! The environment plugin attaches [`LocalFileSystem`] for all three roles.
//! Embedders and tests can replace any of them, typically with
//! [`MemoryFileSystem`].

mod local;
mod memory;

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

pub use local::LocalFileSystem;
pub use memory::MemoryFileSystem;

/// Identity of a file's current contents, compared between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileStamp {
  pub modified: u128,
  pub len: u64,
}

/// Where sources are read from.
pub trait InputFileSystem: Send + Sync + fmt::Debug {
  fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

  fn is_file(&self, path: &Path) -> bool;

  /// Current stamp, or `None` if the file does not exist.
  fn stamp(&self, path: &Path) -> Option<FileStamp>;

  fn read_to_string(&self, path: &Path) -> io::Result<String> {
    let bytes = self.read(path)?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
  }
}

/// Where assets are written to.
pub trait OutputFileSystem: Send + Sync + fmt::Debug {
  fn create_dir_all(&self, path: &Path) -> io::Result<()>;

  fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// What the watch loop polls for changes.
pub trait WatchFileSystem: Send + Sync + fmt::Debug {
  fn stamp(&self, path: &Path) -> Option<FileStamp>;

  fn snapshot(&self, paths: &[PathBuf]) -> FileSnapshot {
    paths.iter().map(|path| (path.clone(), self.stamp(path))).collect()
  }
}

/// Stamps of a set of files at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSnapshot {
  stamps: BTreeMap<PathBuf, Option<FileStamp>>,
}

impl FileSnapshot {
  /// Files whose stamp differs in `current`, including files that appeared or
  /// disappeared.
  pub fn changed_files(&self, current: &FileSnapshot) -> Vec<PathBuf> {
    let mut changed: Vec<PathBuf> = current
      .stamps
      .iter()
      .filter(|(path, stamp)| self.stamps.get(*path) != Some(stamp))
      .map(|(path, _)| path.clone())
      .collect();
    changed.extend(
      self
        .stamps
        .keys()
        .filter(|path| !current.stamps.contains_key(*path))
        .cloned(),
    );
    changed
  }

  pub fn len(&self) -> usize {
    self.stamps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.stamps.is_empty()
  }
}

impl FromIterator<(PathBuf, Option<FileStamp>)> for FileSnapshot {
  fn from_iter<I: IntoIterator<Item = (PathBuf, Option<FileStamp>)>>(iter: I) -> Self {
    Self {
      stamps: iter.into_iter().collect(),
    }
  }
}

/// Lexically resolve `.` and `..` components without touching the disk.
pub fn normalize_path(path: &Path) -> PathBuf {
  let mut normalized = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        if !normalized.pop() {
          normalized.push(component);
        }
      }
      other => normalized.push(other),
    }
  }
  normalized
}
