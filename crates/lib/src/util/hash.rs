//! Content hashing for cache keys and source pinning.
//!
//! This module provides:
//! - [`CacheKey`]: a full SHA-256 hex digest identifying one artifact
//! - [`key_of()`]: hash any serializable value through its canonical JSON form
//! - [`hash_tree()`]: deterministic hashing of a file or directory tree

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use walkdir::WalkDir;

/// Number of leading digest characters shown in human-facing output.
pub const SHORT_KEY_LEN: usize = 12;

/// A content-addressed key identifying one artifact.
///
/// The key is the lowercase hex SHA-256 digest (64 characters) of the
/// material that went into it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey(String);

impl CacheKey {
  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Truncated form for display in listings.
  pub fn short(&self) -> &str {
    &self.0[..SHORT_KEY_LEN.min(self.0.len())]
  }
}

impl std::fmt::Display for CacheKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Compute the cache key of any serializable value.
///
/// The value is serialized to JSON first so that the digest is independent
/// of in-memory representation. Serialization only fails for values that
/// cannot be expressed in JSON (e.g. non-string mapping keys).
pub fn key_of<T: Serialize>(value: &T) -> Result<CacheKey, serde_json::Error> {
  let canonical = serde_json::to_string(value)?;
  Ok(CacheKey(hex_digest(canonical.as_bytes())))
}

/// Errors raised while hashing an on-disk tree.
#[derive(Debug, Error)]
pub enum TreeHashError {
  #[error("failed to walk '{path}': {message}")]
  Walk { path: String, message: String },

  #[error("failed to read '{path}': {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to read symlink '{path}': {source}")]
  ReadLink {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// Compute a deterministic digest of a file or directory tree.
///
/// Directory structure, file contents and symlink targets all contribute;
/// timestamps and permissions do not. Entries are visited in sorted order
/// so the digest is stable across filesystems.
pub fn hash_tree(path: &Path) -> Result<String, TreeHashError> {
  if path.is_file() {
    return hash_file(path);
  }

  let mut hasher = Sha256::new();
  let walker = WalkDir::new(path).sort_by_file_name();

  for entry in walker {
    let entry = entry.map_err(|e| TreeHashError::Walk {
      path: path.display().to_string(),
      message: e.to_string(),
    })?;

    let rel = entry
      .path()
      .strip_prefix(path)
      .unwrap_or(entry.path())
      .to_string_lossy()
      .replace('\\', "/");
    if rel.is_empty() {
      continue;
    }

    let file_type = entry.file_type();
    if file_type.is_file() {
      hasher.update(b"file\0");
      hasher.update(rel.as_bytes());
      hasher.update(b"\0");
      hasher.update(hash_file(entry.path())?.as_bytes());
    } else if file_type.is_dir() {
      hasher.update(b"dir\0");
      hasher.update(rel.as_bytes());
    } else if file_type.is_symlink() {
      let target = fs::read_link(entry.path()).map_err(|e| TreeHashError::ReadLink {
        path: entry.path().display().to_string(),
        source: e,
      })?;
      hasher.update(b"link\0");
      hasher.update(rel.as_bytes());
      hasher.update(b"\0");
      hasher.update(target.to_string_lossy().as_bytes());
    } else {
      // Sockets, devices and the like carry no reproducible content.
      continue;
    }
    hasher.update(b"\n");
  }

  Ok(format!("{:x}", hasher.finalize()))
}

/// Hash a single file's contents.
pub fn hash_file(path: &Path) -> Result<String, TreeHashError> {
  let mut file = fs::File::open(path).map_err(|e| TreeHashError::Read {
    path: path.display().to_string(),
    source: e,
  })?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];
  loop {
    let n = file.read(&mut buffer).map_err(|e| TreeHashError::Read {
      path: path.display().to_string(),
      source: e,
    })?;
    if n == 0 {
      break;
    }
    hasher.update(&buffer[..n]);
  }

  Ok(format!("{:x}", hasher.finalize()))
}

fn hex_digest(data: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(data);
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  #[test]
  fn key_of_is_stable() {
    #[derive(Serialize)]
    struct Material<'a> {
      kind: &'a str,
      refs: Vec<&'a str>,
    }

    let a = key_of(&Material {
      kind: "script",
      refs: vec!["abc", "def"],
    })
    .unwrap();
    let b = key_of(&Material {
      kind: "script",
      refs: vec!["abc", "def"],
    })
    .unwrap();

    assert_eq!(a, b);
    assert_eq!(a.as_str().len(), 64);
    assert_eq!(a.short().len(), SHORT_KEY_LEN);
  }

  #[test]
  fn key_of_differs_by_content() {
    let a = key_of(&vec!["one"]).unwrap();
    let b = key_of(&vec!["two"]).unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn hash_tree_of_single_file() {
    let temp = tempdir().unwrap();
    let file = temp.path().join("data.txt");
    fs::write(&file, "payload").unwrap();

    let a = hash_tree(&file).unwrap();
    let b = hash_tree(&file).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
  }

  #[test]
  fn hash_tree_is_deterministic() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("a.txt"), "alpha").unwrap();
    fs::create_dir(temp.path().join("sub")).unwrap();
    fs::write(temp.path().join("sub/b.txt"), "beta").unwrap();

    assert_eq!(hash_tree(temp.path()).unwrap(), hash_tree(temp.path()).unwrap());
  }

  #[test]
  fn hash_tree_changes_with_content() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("file.txt"), "original").unwrap();
    let before = hash_tree(temp.path()).unwrap();

    fs::write(temp.path().join("file.txt"), "modified").unwrap();
    let after = hash_tree(temp.path()).unwrap();

    assert_ne!(before, after);
  }

  #[test]
  fn hash_tree_changes_with_structure() {
    let flat = tempdir().unwrap();
    fs::write(flat.path().join("file.txt"), "content").unwrap();

    let nested = tempdir().unwrap();
    fs::create_dir(nested.path().join("sub")).unwrap();
    fs::write(nested.path().join("sub/file.txt"), "content").unwrap();

    assert_ne!(hash_tree(flat.path()).unwrap(), hash_tree(nested.path()).unwrap());
  }
}
