//! Runtime component instances and the scope-filtered traversal.

use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use serde_json::json;

use crate::cache::ArtifactCache;
use crate::description::{ComponentDescription, ComponentId, FileDocument};
use crate::plugin::{ComponentError, ComponentPlugin, Consistency, SourceError};
use crate::util::hash::{CacheKey, key_of};

use super::source::Source;

/// Which dependency edges a traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
  /// Both build-time and runtime edges.
  All,
  /// Build-time edges only.
  Build,
  /// Runtime edges only.
  Run,
}

/// One resolved build component.
///
/// A component shared by several parents is one instance, reference-equal
/// from every path that reaches it. Dependency and source lists are
/// injected at construction and mirror declaration order.
pub struct Component {
  id: ComponentId,
  name: String,
  kind: String,
  config: serde_yaml::Mapping,
  build_dependencies: Vec<Rc<Component>>,
  runtime_dependencies: Vec<Rc<Component>>,
  sources: Vec<Rc<Source>>,
  plugin: Box<dyn ComponentPlugin>,
  artifacts: Rc<ArtifactCache>,
}

impl std::fmt::Debug for Component {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Component")
      .field("id", &self.id)
      .field("name", &self.name)
      .field("kind", &self.kind)
      .finish_non_exhaustive()
  }
}

impl Component {
  #[allow(clippy::too_many_arguments)]
  pub(crate) fn new(
    id: ComponentId,
    description: &ComponentDescription,
    build_dependencies: Vec<Rc<Component>>,
    runtime_dependencies: Vec<Rc<Component>>,
    sources: Vec<Rc<Source>>,
    plugin: Box<dyn ComponentPlugin>,
    artifacts: Rc<ArtifactCache>,
  ) -> Self {
    Self {
      id,
      name: description.name.clone(),
      kind: description.kind.clone(),
      config: description.config.clone(),
      build_dependencies,
      runtime_dependencies,
      sources,
      plugin,
      artifacts,
    }
  }

  /// Identity of the description node this component was resolved from.
  pub fn id(&self) -> ComponentId {
    self.id
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn kind(&self) -> &str {
    &self.kind
  }

  /// Direct build-time dependencies, in declaration order.
  pub fn build_dependencies(&self) -> &[Rc<Component>] {
    &self.build_dependencies
  }

  /// Direct runtime dependencies, in declaration order.
  pub fn runtime_dependencies(&self) -> &[Rc<Component>] {
    &self.runtime_dependencies
  }

  /// Direct sources, in declaration order.
  pub fn sources(&self) -> &[Rc<Source>] {
    &self.sources
  }

  /// Validate this component's configuration.
  pub fn preflight(&self) -> Result<(), ComponentError> {
    self.plugin.preflight()
  }

  /// Walk the transitive closure reachable from this component under
  /// `scope`, each distinct component exactly once, dependencies before
  /// dependents. The component itself is yielded last.
  ///
  /// The returned iterator is lazy and non-restartable; collect it if the
  /// sequence is needed more than once.
  pub fn dependencies(self: &Rc<Self>, scope: Scope) -> Dependencies {
    Dependencies {
      scope,
      visited: HashSet::new(),
      stack: vec![Frame::Enter(Rc::clone(self))],
    }
  }

  /// The subset of this component's direct sources currently lacking a
  /// resolved reference. Not recursive.
  pub fn own_inconsistent_sources(&self) -> Vec<Rc<Source>> {
    self
      .sources
      .iter()
      .filter(|source| source.consistency() == Consistency::Inconsistent)
      .cloned()
      .collect()
  }

  /// Pin every direct source to an exact reference.
  ///
  /// Returns the description files that must be rewritten (keyed by
  /// project-relative filename) and the sources whose reference actually
  /// changed, in declaration order.
  pub fn refresh_sources(&self) -> Result<(BTreeMap<String, FileDocument>, Vec<Rc<Source>>), SourceError> {
    let mut files = BTreeMap::new();
    let mut changed = Vec::new();

    for source in &self.sources {
      if let Some((filename, document)) = source.refresh()? {
        files.insert(filename, document);
        changed.push(Rc::clone(source));
      }
    }

    Ok((files, changed))
  }

  /// The content-addressed key of this component's artifact.
  ///
  /// `None` while any of this component's sources, or any dependency's
  /// key, is still unresolved. Callers gate on
  /// [`Pipeline::inconsistent`](crate::pipeline::Pipeline::inconsistent)
  /// being empty before relying on keys.
  pub fn cache_key(&self) -> Option<CacheKey> {
    let config = serde_json::to_value(&self.config).ok()?;

    let mut source_keys = Vec::with_capacity(self.sources.len());
    for source in &self.sources {
      source_keys.push(source.unique_key()?);
    }

    let mut build_keys = Vec::with_capacity(self.build_dependencies.len());
    for dependency in &self.build_dependencies {
      build_keys.push(dependency.cache_key()?.to_string());
    }
    let mut runtime_keys = Vec::with_capacity(self.runtime_dependencies.len());
    for dependency in &self.runtime_dependencies {
      runtime_keys.push(dependency.cache_key()?.to_string());
    }

    let material = json!({
      "kind": self.kind,
      "config": config,
      "sources": source_keys,
      "build-deps": build_keys,
      "runtime-deps": runtime_keys,
    });
    key_of(&material).ok()
  }

  /// Whether this component's artifact is already present in the cache.
  pub fn cached(&self) -> bool {
    match self.cache_key() {
      Some(key) => self.artifacts.contains(&key),
      None => false,
    }
  }
}

enum Frame {
  Enter(Rc<Component>),
  Yield(Rc<Component>),
}

/// Lazy depth-first traversal over a component's closure.
///
/// Yields each distinct component exactly once, in
/// dependency-before-dependent order; siblings follow declaration order
/// (build edges before runtime edges under [`Scope::All`]).
pub struct Dependencies {
  scope: Scope,
  visited: HashSet<ComponentId>,
  stack: Vec<Frame>,
}

impl Iterator for Dependencies {
  type Item = Rc<Component>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      match self.stack.pop()? {
        Frame::Enter(component) => {
          if !self.visited.insert(component.id) {
            continue;
          }

          self.stack.push(Frame::Yield(Rc::clone(&component)));

          // Pushed in reverse so the first declared edge is walked first.
          let edges: Vec<Rc<Component>> = match self.scope {
            Scope::Build => component.build_dependencies.clone(),
            Scope::Run => component.runtime_dependencies.clone(),
            Scope::All => component
              .build_dependencies
              .iter()
              .chain(&component.runtime_dependencies)
              .cloned()
              .collect(),
          };
          for dependency in edges.into_iter().rev() {
            self.stack.push(Frame::Enter(dependency));
          }
        }
        Frame::Yield(component) => return Some(component),
      }
    }
  }
}
