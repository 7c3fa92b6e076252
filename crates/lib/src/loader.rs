//! Loading of component description files into a [`DescriptionTree`].
//!
//! The loader walks component files starting from the target, parsing each
//! file exactly once: a component referenced from several parents is
//! represented by one shared description node, which is the property the
//! resolver's identity-keyed memoization depends on. Dependency chains that
//! revisit a file still being loaded are rejected with the full chain.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::Component as PathComponent;
use std::path::Path;
use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

use crate::description::{
  ComponentDescription, ComponentId, DescriptionTree, FileDocument, Provenance, SourceDescription,
};
use crate::project::Project;

/// Top-level keys a component file may carry.
const COMPONENT_KEYS: &[&str] = &[
  "kind",
  "description",
  "build-depends",
  "runtime-depends",
  "depends",
  "sources",
  "config",
];

/// Errors raised while loading description files.
#[derive(Debug, Error)]
pub enum LoadError {
  #[error("component file '{file}' not found")]
  NotFound { file: String },

  #[error("failed to read '{file}': {source}")]
  Read {
    file: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse '{file}': {source}")]
  Parse {
    file: String,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("{file}: {reason}")]
  Malformed { file: String, reason: String },

  #[error("{file}: unexpected key '{key}'")]
  UnexpectedKey { file: String, key: String },

  #[error("{file}: missing 'kind'")]
  MissingKind { file: String },

  #[error("circular dependency: {chain}")]
  CircularDependency { chain: String },
}

/// Loads the description tree for one target component.
pub struct Loader<'a> {
  project: &'a Project,
}

struct LoadState {
  components: Vec<ComponentDescription>,
  by_name: HashMap<String, ComponentId>,
  files: BTreeMap<String, FileDocument>,
  /// Files currently being loaded, outermost first. Used for cycle reporting.
  stack: Vec<String>,
}

impl<'a> Loader<'a> {
  pub fn new(project: &'a Project) -> Self {
    Self { project }
  }

  /// Load `target` and everything it depends on.
  pub fn load(&self, target: &str) -> Result<DescriptionTree, LoadError> {
    let mut state = LoadState {
      components: Vec::new(),
      by_name: HashMap::new(),
      files: BTreeMap::new(),
      stack: Vec::new(),
    };

    let target_id = self.load_component(target, &mut state)?;
    debug!(
      target,
      components = state.components.len(),
      "description tree loaded"
    );

    Ok(DescriptionTree::new(target_id, state.components, state.files))
  }

  fn load_component(&self, name: &str, state: &mut LoadState) -> Result<ComponentId, LoadError> {
    // One shared node per file, no matter how many parents reference it.
    if let Some(id) = state.by_name.get(name) {
      return Ok(*id);
    }

    if state.stack.iter().any(|loading| loading == name) {
      let mut chain: Vec<&str> = state.stack.iter().map(String::as_str).collect();
      chain.push(name);
      return Err(LoadError::CircularDependency {
        chain: chain.join(" -> "),
      });
    }

    validate_component_name(name)?;
    state.stack.push(name.to_string());
    let result = self.load_component_inner(name, state);
    state.stack.pop();
    result
  }

  fn load_component_inner(&self, name: &str, state: &mut LoadState) -> Result<ComponentId, LoadError> {
    let path = self.project.file_path(name);
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        return Err(LoadError::NotFound { file: name.to_string() });
      }
      Err(e) => {
        return Err(LoadError::Read {
          file: name.to_string(),
          source: e,
        });
      }
    };

    let document: serde_yaml::Value = serde_yaml::from_str(&content).map_err(|e| LoadError::Parse {
      file: name.to_string(),
      source: e,
    })?;

    let mapping = document
      .as_mapping()
      .ok_or_else(|| malformed(name, "component file must be a mapping"))?
      .clone();

    validate_keys(name, &mapping, COMPONENT_KEYS)?;

    let kind = mapping
      .get("kind")
      .ok_or_else(|| LoadError::MissingKind { file: name.to_string() })?
      .as_str()
      .ok_or_else(|| malformed(name, "'kind' must be a string"))?
      .to_string();

    // Resolve dependencies depth-first, preserving declaration order.
    // A plain `depends` entry contributes to both edge lists, after the
    // explicit ones.
    let mut build_depends = Vec::new();
    for dep in dependency_list(name, &mapping, "build-depends")? {
      build_depends.push(self.load_component(&dep, state)?);
    }
    let mut runtime_depends = Vec::new();
    for dep in dependency_list(name, &mapping, "runtime-depends")? {
      runtime_depends.push(self.load_component(&dep, state)?);
    }
    for dep in dependency_list(name, &mapping, "depends")? {
      let id = self.load_component(&dep, state)?;
      build_depends.push(id);
      runtime_depends.push(id);
    }

    let shared_document: FileDocument = Rc::new(RefCell::new(document));
    state.files.insert(name.to_string(), shared_document.clone());

    let sources = source_list(name, &mapping, &shared_document)?;
    let config = config_mapping(name, &mapping)?;

    let id = ComponentId(state.components.len());
    state.components.push(ComponentDescription {
      name: name.to_string(),
      kind,
      build_depends,
      runtime_depends,
      sources,
      config,
    });
    state.by_name.insert(name.to_string(), id);

    Ok(id)
  }
}

fn malformed(file: &str, reason: impl Into<String>) -> LoadError {
  LoadError::Malformed {
    file: file.to_string(),
    reason: reason.into(),
  }
}

fn validate_component_name(name: &str) -> Result<(), LoadError> {
  let path = Path::new(name);
  let escapes = path.components().any(|c| {
    matches!(
      c,
      PathComponent::ParentDir | PathComponent::RootDir | PathComponent::Prefix(_)
    )
  });
  if escapes {
    return Err(malformed(name, "component path escapes the project"));
  }
  Ok(())
}

fn validate_keys(file: &str, mapping: &serde_yaml::Mapping, allowed: &[&str]) -> Result<(), LoadError> {
  for key in mapping.keys() {
    let key = key
      .as_str()
      .ok_or_else(|| malformed(file, "top-level keys must be strings"))?;
    if !allowed.contains(&key) {
      return Err(LoadError::UnexpectedKey {
        file: file.to_string(),
        key: key.to_string(),
      });
    }
  }
  Ok(())
}

fn dependency_list(file: &str, mapping: &serde_yaml::Mapping, key: &str) -> Result<Vec<String>, LoadError> {
  let Some(value) = mapping.get(key) else {
    return Ok(Vec::new());
  };

  let sequence = value
    .as_sequence()
    .ok_or_else(|| malformed(file, format!("'{key}' must be a list")))?;

  sequence
    .iter()
    .map(|entry| {
      entry
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| malformed(file, format!("'{key}' entries must be component filenames")))
    })
    .collect()
}

fn source_list(
  file: &str,
  mapping: &serde_yaml::Mapping,
  document: &FileDocument,
) -> Result<Vec<SourceDescription>, LoadError> {
  let Some(value) = mapping.get("sources") else {
    return Ok(Vec::new());
  };

  let sequence = value
    .as_sequence()
    .ok_or_else(|| malformed(file, "'sources' must be a list"))?;

  let mut sources = Vec::with_capacity(sequence.len());
  for (index, entry) in sequence.iter().enumerate() {
    let node = entry
      .as_mapping()
      .ok_or_else(|| malformed(file, format!("source {index} must be a mapping")))?;
    let kind = node
      .get("kind")
      .and_then(serde_yaml::Value::as_str)
      .ok_or_else(|| malformed(file, format!("source {index} is missing 'kind'")))?
      .to_string();

    sources.push(SourceDescription {
      kind,
      config: node.clone(),
      provenance: Provenance {
        filename: file.to_string(),
        index,
      },
      document: document.clone(),
    });
  }

  Ok(sources)
}

fn config_mapping(file: &str, mapping: &serde_yaml::Mapping) -> Result<serde_yaml::Mapping, LoadError> {
  match mapping.get("config") {
    None => Ok(serde_yaml::Mapping::new()),
    Some(value) => value
      .as_mapping()
      .cloned()
      .ok_or_else(|| malformed(file, "'config' must be a mapping")),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::{TempDir, tempdir};

  fn project_with(files: &[(&str, &str)]) -> (TempDir, Project) {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("project.yaml"), "name: loader-tests\n").unwrap();
    for (name, content) in files {
      let path = temp.path().join(name);
      if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
      }
      fs::write(path, content).unwrap();
    }
    let project = Project::load(temp.path()).unwrap();
    (temp, project)
  }

  #[test]
  fn loads_single_component() {
    let (_temp, project) = project_with(&[("app.yaml", "kind: script\nconfig:\n  commands:\n    - make\n")]);

    let tree = Loader::new(&project).load("app.yaml").unwrap();
    assert_eq!(tree.len(), 1);

    let target = tree.component(tree.target());
    assert_eq!(target.name, "app.yaml");
    assert_eq!(target.kind, "script");
    assert!(target.build_depends.is_empty());
    assert!(target.sources.is_empty());
  }

  #[test]
  fn shared_dependency_is_one_node() {
    let (_temp, project) = project_with(&[
      ("base.yaml", "kind: stack\n"),
      ("lib-a.yaml", "kind: stack\nbuild-depends: [base.yaml]\n"),
      ("lib-b.yaml", "kind: stack\nbuild-depends: [base.yaml]\n"),
      ("app.yaml", "kind: stack\nbuild-depends: [lib-a.yaml, lib-b.yaml]\n"),
    ]);

    let tree = Loader::new(&project).load("app.yaml").unwrap();
    assert_eq!(tree.len(), 4);

    let target = tree.component(tree.target());
    let a = tree.component(target.build_depends[0]);
    let b = tree.component(target.build_depends[1]);
    assert_eq!(a.build_depends[0], b.build_depends[0]);
  }

  #[test]
  fn declaration_order_is_preserved() {
    let (_temp, project) = project_with(&[
      ("a.yaml", "kind: stack\n"),
      ("b.yaml", "kind: stack\n"),
      (
        "app.yaml",
        "kind: stack\nbuild-depends: [a.yaml, b.yaml]\nruntime-depends: [b.yaml, a.yaml]\n",
      ),
    ]);

    let tree = Loader::new(&project).load("app.yaml").unwrap();
    let target = tree.component(tree.target());

    let build: Vec<_> = target
      .build_depends
      .iter()
      .map(|id| tree.component(*id).name.as_str())
      .collect();
    let runtime: Vec<_> = target
      .runtime_depends
      .iter()
      .map(|id| tree.component(*id).name.as_str())
      .collect();

    assert_eq!(build, ["a.yaml", "b.yaml"]);
    assert_eq!(runtime, ["b.yaml", "a.yaml"]);
  }

  #[test]
  fn depends_contributes_to_both_lists() {
    let (_temp, project) = project_with(&[
      ("a.yaml", "kind: stack\n"),
      ("b.yaml", "kind: stack\n"),
      ("app.yaml", "kind: stack\nbuild-depends: [a.yaml]\ndepends: [b.yaml]\n"),
    ]);

    let tree = Loader::new(&project).load("app.yaml").unwrap();
    let target = tree.component(tree.target());

    assert_eq!(target.build_depends.len(), 2);
    assert_eq!(target.runtime_depends.len(), 1);
    assert_eq!(tree.component(target.build_depends[1]).name, "b.yaml");
    assert_eq!(tree.component(target.runtime_depends[0]).name, "b.yaml");
  }

  #[test]
  fn sources_carry_provenance_in_order() {
    let (_temp, project) = project_with(&[(
      "app.yaml",
      "kind: import\nsources:\n  - kind: local\n    path: files/one\n  - kind: local\n    path: files/two\n",
    )]);

    let tree = Loader::new(&project).load("app.yaml").unwrap();
    let target = tree.component(tree.target());

    assert_eq!(target.sources.len(), 2);
    assert_eq!(target.sources[0].provenance.index, 0);
    assert_eq!(target.sources[1].provenance.index, 1);
    assert_eq!(target.sources[0].provenance.filename, "app.yaml");
    assert_eq!(
      target.sources[1].config.get("path").and_then(serde_yaml::Value::as_str),
      Some("files/two")
    );
  }

  #[test]
  fn cycle_is_reported_with_chain() {
    let (_temp, project) = project_with(&[
      ("a.yaml", "kind: stack\nbuild-depends: [b.yaml]\n"),
      ("b.yaml", "kind: stack\nbuild-depends: [a.yaml]\n"),
    ]);

    let err = Loader::new(&project).load("a.yaml").unwrap_err();
    match err {
      LoadError::CircularDependency { chain } => {
        assert_eq!(chain, "a.yaml -> b.yaml -> a.yaml");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn unexpected_key_is_rejected() {
    let (_temp, project) = project_with(&[("app.yaml", "kind: stack\nrequires: [x.yaml]\n")]);

    let err = Loader::new(&project).load("app.yaml").unwrap_err();
    assert!(matches!(err, LoadError::UnexpectedKey { key, .. } if key == "requires"));
  }

  #[test]
  fn missing_kind_is_rejected() {
    let (_temp, project) = project_with(&[("app.yaml", "description: no kind here\n")]);

    let err = Loader::new(&project).load("app.yaml").unwrap_err();
    assert!(matches!(err, LoadError::MissingKind { .. }));
  }

  #[test]
  fn missing_dependency_file_is_reported() {
    let (_temp, project) = project_with(&[("app.yaml", "kind: stack\nbuild-depends: [ghost.yaml]\n")]);

    let err = Loader::new(&project).load("app.yaml").unwrap_err();
    assert!(matches!(err, LoadError::NotFound { file } if file == "ghost.yaml"));
  }

  #[test]
  fn escaping_component_path_is_rejected() {
    let (_temp, project) = project_with(&[("app.yaml", "kind: stack\nbuild-depends: [../outside.yaml]\n")]);

    let err = Loader::new(&project).load("app.yaml").unwrap_err();
    assert!(matches!(err, LoadError::Malformed { .. }));
  }
}
