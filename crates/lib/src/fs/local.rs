use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

use super::{FileStamp, InputFileSystem, OutputFileSystem, WatchFileSystem};

/// The process's real file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
  fn stamp_of(path: &Path) -> Option<FileStamp> {
    let metadata = std::fs::metadata(path).ok()?;
    let modified = metadata
      .modified()
      .ok()
      .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
      .map(|elapsed| elapsed.as_nanos())
      .unwrap_or(0);
    Some(FileStamp {
      modified,
      len: metadata.len(),
    })
  }
}

impl InputFileSystem for LocalFileSystem {
  fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
    std::fs::read(path)
  }

  fn is_file(&self, path: &Path) -> bool {
    path.is_file()
  }

  fn stamp(&self, path: &Path) -> Option<FileStamp> {
    Self::stamp_of(path)
  }
}

impl OutputFileSystem for LocalFileSystem {
  fn create_dir_all(&self, path: &Path) -> io::Result<()> {
    std::fs::create_dir_all(path)
  }

  fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
    std::fs::write(path, contents)
  }
}

impl WatchFileSystem for LocalFileSystem {
  fn stamp(&self, path: &Path) -> Option<FileStamp> {
    Self::stamp_of(path)
  }
}
