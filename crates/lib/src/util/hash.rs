//! Hashing helpers for emitted assets and compilation hashes.

use sha2::{Digest, Sha256};

/// Full lowercase hex SHA-256 of `bytes`.
pub fn hash_bytes(bytes: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  hex::encode(hasher.finalize())
}

/// SHA-256 of several chunks, truncated to `len` hex characters.
pub fn hash_chunks<'a>(chunks: impl IntoIterator<Item = &'a [u8]>, len: usize) -> String {
  let mut hasher = Sha256::new();
  for chunk in chunks {
    hasher.update(chunk);
  }
  let full = hex::encode(hasher.finalize());
  full[..len.min(full.len())].to_string()
}
