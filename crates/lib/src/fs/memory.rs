use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{FileStamp, InputFileSystem, OutputFileSystem, WatchFileSystem, normalize_path};

#[derive(Debug, Default)]
struct State {
  files: BTreeMap<PathBuf, (Vec<u8>, u64)>,
  revision: u64,
}

/// An in-memory file system.
///
/// Every write bumps a global revision counter which serves as the file's
/// modification stamp, so a rewrite with identical contents still counts as a
/// change. Directories are implicit.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
  state: Mutex<State>,
}

impl MemoryFileSystem {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build a file system from `(path, contents)` pairs.
  pub fn with_files<P: AsRef<Path>, C: AsRef<[u8]>>(files: impl IntoIterator<Item = (P, C)>) -> Self {
    let fs = Self::new();
    for (path, contents) in files {
      fs.write_file(path, contents);
    }
    fs
  }

  fn state(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn write_file(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) {
    let mut state = self.state();
    state.revision += 1;
    let revision = state.revision;
    state
      .files
      .insert(normalize_path(path.as_ref()), (contents.as_ref().to_vec(), revision));
  }

  pub fn remove_file(&self, path: impl AsRef<Path>) -> bool {
    self.state().files.remove(&normalize_path(path.as_ref())).is_some()
  }

  pub fn read_file(&self, path: impl AsRef<Path>) -> Option<String> {
    let state = self.state();
    let (contents, _) = state.files.get(&normalize_path(path.as_ref()))?;
    Some(String::from_utf8_lossy(contents).into_owned())
  }

  /// All file paths, sorted.
  pub fn files(&self) -> Vec<PathBuf> {
    self.state().files.keys().cloned().collect()
  }

  fn stamp_of(&self, path: &Path) -> Option<FileStamp> {
    let state = self.state();
    let (contents, revision) = state.files.get(&normalize_path(path))?;
    Some(FileStamp {
      modified: u128::from(*revision),
      len: contents.len() as u64,
    })
  }
}

impl InputFileSystem for MemoryFileSystem {
  fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
    let state = self.state();
    state
      .files
      .get(&normalize_path(path))
      .map(|(contents, _)| contents.clone())
      .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display())))
  }

  fn is_file(&self, path: &Path) -> bool {
    self.state().files.contains_key(&normalize_path(path))
  }

  fn stamp(&self, path: &Path) -> Option<FileStamp> {
    self.stamp_of(path)
  }
}

impl OutputFileSystem for MemoryFileSystem {
  fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
    Ok(())
  }

  fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
    self.write_file(path, contents);
    Ok(())
  }
}

impl WatchFileSystem for MemoryFileSystem {
  fn stamp(&self, path: &Path) -> Option<FileStamp> {
    self.stamp_of(path)
  }
}
