//! The `local` source kind: project files pinned by content hash.
//!
//! A local source names a file or directory relative to the project root.
//! Refresh pins it by computing the deterministic tree hash of the current
//! content and writing it to the source's `ref`; the source is consistent
//! once a `ref` is present.

use std::path::{Component as PathComponent, Path, PathBuf};

use serde_json::json;
use tracing::debug;

use crate::plugin::{Consistency, PluginError, PluginSetup, SourceError, SourcePlugin};
use crate::util::hash::hash_tree;

pub struct Local {
  project_dir: PathBuf,
  path: Option<String>,
  current_ref: Option<String>,
}

impl Local {
  pub fn create(setup: &PluginSetup<'_>) -> Result<Box<dyn SourcePlugin>, PluginError> {
    let path = setup
      .config
      .get("path")
      .and_then(serde_yaml::Value::as_str)
      .map(str::to_string);
    let current_ref = setup
      .config
      .get("ref")
      .and_then(serde_yaml::Value::as_str)
      .map(str::to_string);

    Ok(Box::new(Self {
      project_dir: setup.project.directory().to_path_buf(),
      path,
      current_ref,
    }))
  }

  fn resolved_path(&self) -> Result<PathBuf, SourceError> {
    let path = self
      .path
      .as_deref()
      .ok_or_else(|| SourceError::new("local sources require a 'path'"))?;

    let relative = Path::new(path);
    if relative.is_absolute() {
      return Err(SourceError::new(format!("'{path}' must be relative to the project")));
    }
    let escapes = relative.components().any(|c| matches!(c, PathComponent::ParentDir));
    if escapes {
      return Err(SourceError::new(format!("'{path}' escapes the project directory")));
    }

    Ok(self.project_dir.join(relative))
  }
}

impl SourcePlugin for Local {
  fn preflight(&self) -> Result<(), SourceError> {
    let full = self.resolved_path()?;
    if !full.exists() {
      return Err(SourceError::new(format!(
        "path '{}' does not exist",
        self.path.as_deref().unwrap_or_default()
      )));
    }
    Ok(())
  }

  fn consistency(&self) -> Consistency {
    if self.current_ref.is_some() {
      Consistency::Resolved
    } else {
      Consistency::Inconsistent
    }
  }

  fn refresh(&mut self, node: &mut serde_yaml::Mapping) -> Result<bool, SourceError> {
    let full = self.resolved_path()?;
    let tree_hash = hash_tree(&full).map_err(|e| SourceError::new(e.to_string()))?;

    let changed = self.current_ref.as_deref() != Some(tree_hash.as_str());
    if changed {
      debug!(path = self.path.as_deref().unwrap_or_default(), "pinned local source");
      node.insert(
        serde_yaml::Value::from("ref"),
        serde_yaml::Value::from(tree_hash.clone()),
      );
      self.current_ref = Some(tree_hash);
    }

    Ok(changed)
  }

  fn unique_key(&self) -> Option<serde_json::Value> {
    let pinned = self.current_ref.as_deref()?;
    Some(json!({
      "path": self.path,
      "ref": pinned,
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::{TempDir, tempdir};

  fn local_with(path: Option<&str>, current_ref: Option<&str>) -> (TempDir, Local) {
    let temp = tempdir().unwrap();
    let local = Local {
      project_dir: temp.path().to_path_buf(),
      path: path.map(str::to_string),
      current_ref: current_ref.map(str::to_string),
    };
    (temp, local)
  }

  #[test]
  fn preflight_requires_path() {
    let (_temp, local) = local_with(None, None);
    assert!(local.preflight().is_err());
  }

  #[test]
  fn preflight_rejects_absolute_path() {
    let (_temp, local) = local_with(Some("/etc/passwd"), None);
    assert!(local.preflight().is_err());
  }

  #[test]
  fn preflight_rejects_escaping_path() {
    let (_temp, local) = local_with(Some("../outside"), None);
    assert!(local.preflight().is_err());
  }

  #[test]
  fn preflight_requires_existing_path() {
    let (_temp, local) = local_with(Some("missing"), None);
    assert!(local.preflight().is_err());
  }

  #[test]
  fn consistency_follows_ref() {
    let (_temp, local) = local_with(Some("files"), None);
    assert_eq!(local.consistency(), Consistency::Inconsistent);

    let (_temp, pinned) = local_with(Some("files"), Some("abc"));
    assert_eq!(pinned.consistency(), Consistency::Resolved);
  }

  #[test]
  fn refresh_pins_and_reports_change() {
    let (temp, mut local) = local_with(Some("files"), None);
    fs::create_dir(temp.path().join("files")).unwrap();
    fs::write(temp.path().join("files/data.txt"), "payload").unwrap();

    let mut node = serde_yaml::Mapping::new();
    let changed = local.refresh(&mut node).unwrap();
    assert!(changed);
    assert_eq!(local.consistency(), Consistency::Resolved);

    let written = node.get("ref").and_then(serde_yaml::Value::as_str).unwrap();
    assert_eq!(written.len(), 64);

    // A second refresh over unchanged content reports no change.
    let changed_again = local.refresh(&mut node).unwrap();
    assert!(!changed_again);
  }

  #[test]
  fn refresh_detects_content_change() {
    let (temp, mut local) = local_with(Some("files"), None);
    fs::create_dir(temp.path().join("files")).unwrap();
    fs::write(temp.path().join("files/data.txt"), "one").unwrap();

    let mut node = serde_yaml::Mapping::new();
    local.refresh(&mut node).unwrap();
    let first = node.get("ref").and_then(serde_yaml::Value::as_str).unwrap().to_string();

    fs::write(temp.path().join("files/data.txt"), "two").unwrap();
    let changed = local.refresh(&mut node).unwrap();
    assert!(changed);
    let second = node.get("ref").and_then(serde_yaml::Value::as_str).unwrap();
    assert_ne!(first, second);
  }

  #[test]
  fn unique_key_requires_ref() {
    let (_temp, local) = local_with(Some("files"), None);
    assert!(local.unique_key().is_none());

    let (_temp, pinned) = local_with(Some("files"), Some("abc123"));
    let key = pinned.unique_key().unwrap();
    assert_eq!(key["ref"], "abc123");
  }
}
