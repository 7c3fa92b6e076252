//! Shared fixture helpers: a real project directory on disk.

use std::fs;
use std::path::Path;

use strata_lib::{Context, Project};
use tempfile::TempDir;

/// Create a project directory with the given component files.
pub fn project(files: &[(&str, &str)]) -> (TempDir, Project, Context) {
  let temp = TempDir::new().unwrap();
  fs::write(temp.path().join("project.yaml"), "name: integration\n").unwrap();
  for (name, content) in files {
    write_file(temp.path(), name, content);
  }

  let project = Project::load(temp.path()).unwrap();
  let context = Context::new().with_cache_dir(temp.path().join("cache"));
  (temp, project, context)
}

/// Write a file under `root`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) {
  let path = root.join(rel);
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  fs::write(path, content).unwrap();
}
