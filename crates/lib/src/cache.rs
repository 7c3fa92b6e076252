//! Content-addressed artifact store.
//!
//! Built artifacts live under `<root>/artifacts/<key>`, keyed by the
//! component cache key. The engine passes the cache handle through to
//! components and never inspects artifact contents; imports go through a
//! staging directory so a half-copied tree is never visible under its
//! final key.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::util::hash::CacheKey;

/// Errors raised by the artifact store.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("failed to create cache directory '{path}': {source}")]
  Create {
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to import '{path}' into the cache: {source}")]
  Import {
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to walk '{path}': {message}")]
  Walk { path: String, message: String },
}

/// Handle to one on-disk artifact store.
pub struct ArtifactCache {
  root: PathBuf,
}

impl ArtifactCache {
  /// Open (creating if necessary) the store rooted at `root`.
  pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
    let root = root.into();
    let artifacts = root.join("artifacts");
    fs::create_dir_all(&artifacts).map_err(|e| CacheError::Create {
      path: artifacts.display().to_string(),
      source: e,
    })?;
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn artifact_dir(&self, key: &CacheKey) -> PathBuf {
    self.root.join("artifacts").join(key.as_str())
  }

  /// Whether an artifact with this key is present.
  pub fn contains(&self, key: &CacheKey) -> bool {
    self.artifact_dir(key).is_dir()
  }

  /// Path of the stored artifact, if present.
  pub fn path_of(&self, key: &CacheKey) -> Option<PathBuf> {
    let dir = self.artifact_dir(key);
    dir.is_dir().then_some(dir)
  }

  /// Import a built output tree under `key`.
  ///
  /// Committing a key that is already present is a no-op returning the
  /// existing artifact.
  pub fn commit(&self, key: &CacheKey, output: &Path) -> Result<PathBuf, CacheError> {
    let final_dir = self.artifact_dir(key);
    if final_dir.is_dir() {
      debug!(key = key.short(), "artifact already cached");
      return Ok(final_dir);
    }

    let staging = self.root.join("staging").join(key.as_str());
    if staging.exists() {
      fs::remove_dir_all(&staging).map_err(|e| CacheError::Import {
        path: staging.display().to_string(),
        source: e,
      })?;
    }
    copy_tree(output, &staging)?;
    fs::rename(&staging, &final_dir).map_err(|e| CacheError::Import {
      path: final_dir.display().to_string(),
      source: e,
    })?;

    debug!(key = key.short(), "artifact committed");
    Ok(final_dir)
  }
}

fn copy_tree(from: &Path, to: &Path) -> Result<(), CacheError> {
  let import_err = |path: &Path| {
    let path = path.display().to_string();
    move |e: io::Error| CacheError::Import { path, source: e }
  };

  fs::create_dir_all(to).map_err(import_err(to))?;

  for entry in WalkDir::new(from) {
    let entry = entry.map_err(|e| CacheError::Walk {
      path: from.display().to_string(),
      message: e.to_string(),
    })?;
    let rel = entry.path().strip_prefix(from).unwrap_or(entry.path());
    if rel.as_os_str().is_empty() {
      continue;
    }
    let dest = to.join(rel);

    let file_type = entry.file_type();
    if file_type.is_dir() {
      fs::create_dir_all(&dest).map_err(import_err(&dest))?;
    } else if file_type.is_file() {
      fs::copy(entry.path(), &dest).map_err(import_err(&dest))?;
    } else if file_type.is_symlink() {
      let target = fs::read_link(entry.path()).map_err(import_err(entry.path()))?;
      #[cfg(unix)]
      std::os::unix::fs::symlink(&target, &dest).map_err(import_err(&dest))?;
      #[cfg(not(unix))]
      {
        let _ = target;
        return Err(CacheError::Import {
          path: dest.display().to_string(),
          source: io::Error::other("symlinks in artifacts are not supported on this platform"),
        });
      }
    }
  }

  Ok(())
}
