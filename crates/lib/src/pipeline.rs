//! The per-invocation pipeline over a resolved target graph.
//!
//! Construction is fail-fast: the target's description tree is loaded,
//! resolved into the runtime graph, and the whole graph is preflighted
//! before a [`Pipeline`] value exists at all. Any load, resolution or
//! preflight failure means no pipeline; there is no partially built state
//! to misuse.

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::io;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{ArtifactCache, CacheError};
use crate::context::Context;
use crate::description::FileDocument;
use crate::graph::{Component, Dependencies, Resolver, Scope, Source};
use crate::loader::{LoadError, Loader};
use crate::plugin::{ComponentError, ComponentFactory, SourceError, SourceFactory};
use crate::project::Project;

pub use crate::graph::ResolveError;

/// Errors that abort pipeline construction.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  Load(#[from] LoadError),

  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error(transparent)]
  Cache(#[from] CacheError),

  #[error("{component}: {source}")]
  ComponentPreflight {
    component: String,
    #[source]
    source: ComponentError,
  },

  #[error("{node}: {source}")]
  SourcePreflight {
    node: String,
    #[source]
    source: SourceError,
  },
}

/// Errors raised by [`Pipeline::refresh`].
///
/// A refresh failure leaves every description file untouched: proposed
/// rewrites are only committed after the whole traversal has succeeded.
#[derive(Debug, Error)]
pub enum RefreshError {
  #[error("{component}: {source}")]
  Source {
    component: String,
    #[source]
    source: SourceError,
  },

  #[error("failed to serialize '{file}': {source}")]
  Serialize {
    file: String,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("failed to write '{file}': {source}")]
  Write {
    file: String,
    #[source]
    source: io::Error,
  },
}

/// One node yielded by a traversal that includes sources.
pub enum Node {
  Component(Rc<Component>),
  Source(Rc<Source>),
}

/// Owner of one fully resolved, fully preflighted target graph.
pub struct Pipeline {
  project: Project,
  target: Rc<Component>,
  artifacts: Rc<ArtifactCache>,
}

impl std::fmt::Debug for Pipeline {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Pipeline").finish_non_exhaustive()
  }
}

impl Pipeline {
  /// Construct the pipeline for `target` using the builtin kinds.
  pub fn new(context: &Context, project: Project, target: &str) -> Result<Self, PipelineError> {
    Self::with_factories(
      context,
      project,
      target,
      &ComponentFactory::with_builtins(),
      &SourceFactory::with_builtins(),
    )
  }

  /// Construct the pipeline for `target` with caller-supplied kind
  /// registries.
  ///
  /// Loads the description tree, resolves the runtime graph, and
  /// preflights every distinct component and source exactly once. Fails
  /// outright on the first error; no partially constructed pipeline is
  /// ever returned.
  pub fn with_factories(
    context: &Context,
    project: Project,
    target: &str,
    components: &ComponentFactory,
    sources: &SourceFactory,
  ) -> Result<Self, PipelineError> {
    let tree = Loader::new(&project).load(target)?;
    let artifacts = Rc::new(ArtifactCache::open(context.cache_dir())?);

    let mut resolver = Resolver::new(
      &tree,
      &project,
      context,
      Rc::clone(&artifacts),
      components,
      sources,
    );
    let resolved = resolver.resolve_component(tree.target())?;
    drop(resolver);
    debug!(target, components = tree.len(), "target graph resolved");

    let pipeline = Self {
      project,
      target: resolved,
      artifacts,
    };
    pipeline.preflight()?;
    info!(target, "pipeline ready");

    Ok(pipeline)
  }

  /// Validate every distinct node in the graph, exactly once, sources
  /// before their component. Runs only after the entire graph exists.
  fn preflight(&self) -> Result<(), PipelineError> {
    for node in self.dependencies_with_sources(Scope::All) {
      match node {
        Node::Component(component) => {
          component
            .preflight()
            .map_err(|source| PipelineError::ComponentPreflight {
              component: component.name().to_string(),
              source,
            })?;
        }
        Node::Source(source) => {
          source.preflight().map_err(|e| PipelineError::SourcePreflight {
            node: source.provenance().to_string(),
            source: e,
          })?;
        }
      }
    }
    Ok(())
  }

  pub fn project(&self) -> &Project {
    &self.project
  }

  /// The resolved target component.
  pub fn target(&self) -> &Rc<Component> {
    &self.target
  }

  /// Handle to the artifact cache this pipeline was opened with.
  pub fn artifacts(&self) -> &Rc<ArtifactCache> {
    &self.artifacts
  }

  /// Lazily walk the target's closure under `scope`, each distinct
  /// component exactly once, dependencies before dependents; the target
  /// itself comes last. The sequence is finite and non-restartable.
  pub fn dependencies(&self, scope: Scope) -> Dependencies {
    self.target.dependencies(scope)
  }

  /// Like [`Pipeline::dependencies`], but each component's sources are
  /// yielded immediately before the component itself, in declaration
  /// order.
  pub fn dependencies_with_sources(&self, scope: Scope) -> PipelineNodes {
    PipelineNodes {
      dependencies: self.dependencies(scope),
      queue: VecDeque::new(),
    }
  }

  /// Every source in the graph currently lacking a resolved reference, in
  /// ALL-scope traversal order.
  ///
  /// A non-empty result gates cache-key computation: keys are undefined
  /// until every source is pinned.
  pub fn inconsistent(&self) -> Vec<Rc<Source>> {
    let mut sources = Vec::new();
    for component in self.dependencies(Scope::All) {
      sources.extend(component.own_inconsistent_sources());
    }
    sources
  }

  /// Pin every source of every component in the target's closure.
  ///
  /// Proposed file rewrites are accumulated in memory across the whole
  /// traversal; when two components propose a rewrite for the same file
  /// the later one in traversal order wins. Only after the traversal has
  /// completed is every touched file serialized back to the project; a
  /// failure mid-traversal therefore commits nothing. Files no component
  /// touched are left as they are.
  ///
  /// Returns the sources whose reference changed, in traversal order.
  pub fn refresh(&self) -> Result<Vec<Rc<Source>>, RefreshError> {
    let mut files: BTreeMap<String, FileDocument> = BTreeMap::new();
    let mut changed = Vec::new();

    for component in self.dependencies(Scope::All) {
      let (component_files, component_sources) =
        component.refresh_sources().map_err(|source| RefreshError::Source {
          component: component.name().to_string(),
          source,
        })?;
      // Last writer wins on shared files.
      files.extend(component_files);
      changed.extend(component_sources);
    }

    for (filename, document) in &files {
      let text = serde_yaml::to_string(&*document.borrow()).map_err(|source| RefreshError::Serialize {
        file: filename.clone(),
        source,
      })?;
      let path = self.project.file_path(filename);
      fs::write(&path, text).map_err(|source| RefreshError::Write {
        file: filename.clone(),
        source,
      })?;
      debug!(file = %filename, "description rewritten");
    }

    info!(
      changed = changed.len(),
      files = files.len(),
      "sources refreshed"
    );
    Ok(changed)
  }
}

/// Iterator interleaving sources with their components.
pub struct PipelineNodes {
  dependencies: Dependencies,
  queue: VecDeque<Node>,
}

impl Iterator for PipelineNodes {
  type Item = Node;

  fn next(&mut self) -> Option<Self::Item> {
    if let Some(node) = self.queue.pop_front() {
      return Some(node);
    }

    let component = self.dependencies.next()?;
    for source in component.sources() {
      self.queue.push_back(Node::Source(Rc::clone(source)));
    }
    self.queue.push_back(Node::Component(component));
    self.queue.pop_front()
  }
}
