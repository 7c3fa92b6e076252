//! Project discovery and configuration.
//!
//! A strata project is a directory carrying a `project.yaml` with the
//! project name and, optionally, the subdirectory holding component
//! description files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Name of the project configuration file.
pub const PROJECT_FILENAME: &str = "project.yaml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectConfig {
  name: String,
  #[serde(rename = "component-path", default)]
  component_path: Option<String>,
}

/// Errors raised while loading a project.
#[derive(Debug, Error)]
pub enum ProjectError {
  #[error("no {PROJECT_FILENAME} found in '{dir}'")]
  NotFound { dir: String },

  #[error("failed to read '{path}': {source}")]
  Read {
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("malformed '{path}': {source}")]
  Parse {
    path: String,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("project name must not be empty in '{path}'")]
  EmptyName { path: String },
}

/// A loaded project: the directory and the settings from `project.yaml`.
#[derive(Debug, Clone)]
pub struct Project {
  name: String,
  directory: PathBuf,
  component_path: Option<String>,
}

impl Project {
  /// Load the project rooted at `directory`.
  pub fn load(directory: &Path) -> Result<Self, ProjectError> {
    let path = directory.join(PROJECT_FILENAME);
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        return Err(ProjectError::NotFound {
          dir: directory.display().to_string(),
        });
      }
      Err(e) => {
        return Err(ProjectError::Read {
          path: path.display().to_string(),
          source: e,
        });
      }
    };

    let config: ProjectConfig = serde_yaml::from_str(&content).map_err(|e| ProjectError::Parse {
      path: path.display().to_string(),
      source: e,
    })?;

    if config.name.is_empty() {
      return Err(ProjectError::EmptyName {
        path: path.display().to_string(),
      });
    }

    Ok(Self {
      name: config.name,
      directory: directory.to_path_buf(),
      component_path: config.component_path,
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// The project root directory. Source paths are resolved against this.
  pub fn directory(&self) -> &Path {
    &self.directory
  }

  /// Directory holding component description files.
  pub fn component_dir(&self) -> PathBuf {
    match &self.component_path {
      Some(sub) => self.directory.join(sub),
      None => self.directory.clone(),
    }
  }

  /// Absolute path of a project-relative component file.
  pub fn file_path(&self, name: &str) -> PathBuf {
    self.component_dir().join(name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  #[test]
  fn loads_name_and_defaults() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join(PROJECT_FILENAME), "name: demo\n").unwrap();

    let project = Project::load(temp.path()).unwrap();
    assert_eq!(project.name(), "demo");
    assert_eq!(project.component_dir(), temp.path());
    assert_eq!(project.file_path("app.yaml"), temp.path().join("app.yaml"));
  }

  #[test]
  fn component_path_is_honored() {
    let temp = tempdir().unwrap();
    fs::write(
      temp.path().join(PROJECT_FILENAME),
      "name: demo\ncomponent-path: components\n",
    )
    .unwrap();

    let project = Project::load(temp.path()).unwrap();
    assert_eq!(project.component_dir(), temp.path().join("components"));
    assert_eq!(
      project.file_path("app.yaml"),
      temp.path().join("components").join("app.yaml")
    );
  }

  #[test]
  fn missing_file_is_not_found() {
    let temp = tempdir().unwrap();
    let result = Project::load(temp.path());
    assert!(matches!(result, Err(ProjectError::NotFound { .. })));
  }

  #[test]
  fn unknown_keys_are_rejected() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join(PROJECT_FILENAME), "name: demo\nelements: src\n").unwrap();

    let result = Project::load(temp.path());
    assert!(matches!(result, Err(ProjectError::Parse { .. })));
  }

  #[test]
  fn empty_name_is_rejected() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join(PROJECT_FILENAME), "name: \"\"\n").unwrap();

    let result = Project::load(temp.path());
    assert!(matches!(result, Err(ProjectError::EmptyName { .. })));
  }
}
