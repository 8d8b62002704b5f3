use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::compiler::Compiler;
use crate::fs::FileStamp;
use crate::plugin::{Plugin, PluginError};

/// Source cache keyed by path, valid while the file's stamp is unchanged.
#[derive(Debug, Default)]
pub struct MemoryCache {
  entries: Mutex<HashMap<PathBuf, (FileStamp, Arc<str>)>>,
  hits: AtomicUsize,
}

impl MemoryCache {
  pub fn get(&self, path: &Path, stamp: FileStamp) -> Option<String> {
    let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    let (cached, source) = entries.get(path)?;
    if *cached != stamp {
      return None;
    }
    self.hits.fetch_add(1, Ordering::Relaxed);
    Some(source.to_string())
  }

  pub fn insert(&self, path: &Path, stamp: FileStamp, source: &str) {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    entries.insert(path.to_path_buf(), (stamp, Arc::from(source)));
  }

  pub fn hits(&self) -> usize {
    self.hits.load(Ordering::Relaxed)
  }

  pub fn len(&self) -> usize {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

pub struct CachePlugin;

impl Plugin for CachePlugin {
  fn name(&self) -> &str {
    "CachePlugin"
  }

  fn apply(&self, compiler: &mut Compiler) -> Result<(), PluginError> {
    compiler.cache = Some(Arc::new(MemoryCache::default()));
    Ok(())
  }
}
