//! Per-invocation configuration.
//!
//! A [`Context`] carries everything one build invocation needs outside the
//! project itself: the artifact cache location and any configured remotes.
//! Contexts are explicit values passed by reference into the pipeline and
//! the plugin setup; nothing here is process-global, so a long-running
//! service can hold several unrelated contexts at once.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::remote::{RemoteError, RemoteExecutionSpec, RemoteSpec};

/// Environment variable overriding the cache directory.
pub const CACHE_DIR_ENV: &str = "STRATA_CACHE_DIR";

/// Keys a user configuration file may carry.
const CONFIG_KEYS: &[&str] = &["cache-dir", "artifacts", "remote-execution"];

/// Errors raised while loading a context.
#[derive(Debug, Error)]
pub enum ContextError {
  #[error("failed to read '{path}': {source}")]
  Read {
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse '{path}': {source}")]
  Parse {
    path: String,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("{path}: {reason}")]
  Malformed { path: String, reason: String },

  #[error(transparent)]
  Remote(#[from] RemoteError),
}

/// Configuration for one build invocation.
#[derive(Debug)]
pub struct Context {
  cache_dir: PathBuf,
  artifact_remotes: Vec<RemoteSpec>,
  remote_execution: Option<RemoteExecutionSpec>,
}

impl Default for Context {
  fn default() -> Self {
    Self::new()
  }
}

impl Context {
  /// A context with defaults only: per-user cache directory, no remotes.
  pub fn new() -> Self {
    Self {
      cache_dir: default_cache_dir(),
      artifact_remotes: Vec::new(),
      remote_execution: None,
    }
  }

  /// Load a context from a user configuration file.
  ///
  /// With `config = None` the default location is consulted and a missing
  /// file simply yields the default context.
  pub fn load(config: Option<&Path>) -> Result<Self, ContextError> {
    let path = match config {
      Some(path) => path.to_path_buf(),
      None => {
        let Some(default) = default_config_path() else {
          return Ok(Self::new());
        };
        if !default.exists() {
          return Ok(Self::new());
        }
        default
      }
    };

    let content = fs::read_to_string(&path).map_err(|e| ContextError::Read {
      path: path.display().to_string(),
      source: e,
    })?;
    let document: serde_yaml::Value = serde_yaml::from_str(&content).map_err(|e| ContextError::Parse {
      path: path.display().to_string(),
      source: e,
    })?;

    Self::from_document(&document, &path)
  }

  fn from_document(document: &serde_yaml::Value, path: &Path) -> Result<Self, ContextError> {
    let display = path.display().to_string();
    let malformed = |reason: &str| ContextError::Malformed {
      path: display.clone(),
      reason: reason.to_string(),
    };

    let mapping = document.as_mapping().ok_or_else(|| malformed("must be a mapping"))?;
    for key in mapping.keys() {
      let key = key.as_str().unwrap_or_default();
      if !CONFIG_KEYS.contains(&key) {
        return Err(malformed(&format!("unexpected key '{key}'")));
      }
    }

    let basedir = path.parent();

    let mut context = Self::new();
    if let Some(dir) = mapping.get("cache-dir").and_then(serde_yaml::Value::as_str) {
      // The environment override still wins over the config file.
      if env::var_os(CACHE_DIR_ENV).is_none() {
        context.cache_dir = PathBuf::from(dir);
      }
    }

    if let Some(artifacts) = mapping.get("artifacts") {
      let entries = artifacts
        .as_sequence()
        .ok_or_else(|| malformed("'artifacts' must be a list"))?;
      for (index, entry) in entries.iter().enumerate() {
        let node = entry
          .as_mapping()
          .ok_or_else(|| malformed(&format!("artifacts entry {index} must be a mapping")))?;
        let provenance = format!("{display} [artifacts {index}]");
        context
          .artifact_remotes
          .push(RemoteSpec::from_node(node, basedir, false, &provenance)?);
      }
    }

    if let Some(execution) = mapping.get("remote-execution") {
      let node = execution
        .as_mapping()
        .ok_or_else(|| malformed("'remote-execution' must be a mapping"))?;
      let provenance = format!("{display} [remote-execution]");
      context.remote_execution = Some(RemoteExecutionSpec::from_node(node, basedir, &provenance)?);
    }

    debug!(
      cache_dir = %context.cache_dir.display(),
      remotes = context.artifact_remotes.len(),
      "context loaded"
    );
    Ok(context)
  }

  /// Use `dir` as the artifact cache root, overriding config and
  /// environment. Mainly for embedders and tests.
  pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cache_dir = dir.into();
    self
  }

  /// Root directory of the artifact cache.
  pub fn cache_dir(&self) -> &Path {
    &self.cache_dir
  }

  /// Configured artifact cache remotes, in configuration order.
  pub fn artifact_remotes(&self) -> &[RemoteSpec] {
    &self.artifact_remotes
  }

  /// Remote-execution cluster, if configured.
  pub fn remote_execution(&self) -> Option<&RemoteExecutionSpec> {
    self.remote_execution.as_ref()
  }
}

fn default_cache_dir() -> PathBuf {
  if let Some(dir) = env::var_os(CACHE_DIR_ENV) {
    return PathBuf::from(dir);
  }
  dirs::cache_dir()
    .unwrap_or_else(|| PathBuf::from(".cache"))
    .join("strata")
}

fn default_config_path() -> Option<PathBuf> {
  Some(dirs::config_dir()?.join("strata").join("config.yaml"))
}
