//! Resolution of description trees into runtime graphs.
//!
//! The resolver walks the description tree once, memoizing component
//! construction by description-node identity: resolving the same node
//! twice, directly or through different parents, yields the identical
//! `Rc<Component>` and runs the kind constructor exactly once. This is
//! what collapses diamond-shaped dependency structures into a shared
//! instance instead of duplicated work.
//!
//! Each memo entry is marked in-progress before the node's dependencies
//! are descended into; meeting an in-progress node again is a hard cycle
//! error rather than a half-built instance. The loader already rejects
//! cyclic files, so this guard is pure defense against hand-built trees.
//!
//! A resolver is scoped to one invocation: the memo lives only as long as
//! the resolver, which is dropped once the graph is built.

use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;
use tracing::trace;

use crate::cache::ArtifactCache;
use crate::context::Context;
use crate::description::{ComponentId, DescriptionTree, SourceDescription};
use crate::plugin::{ComponentFactory, ComponentPlugin, PluginError, PluginSetup, SourceFactory};
use crate::project::Project;

use super::component::Component;
use super::source::Source;

/// Errors raised during resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
  #[error(transparent)]
  Plugin(#[from] PluginError),

  #[error("dependency cycle: {chain}")]
  DependencyCycle { chain: String },
}

enum MemoEntry {
  InProgress,
  Done(Rc<Component>),
}

/// Converts description nodes into runtime nodes, memoized by identity.
pub struct Resolver<'a> {
  tree: &'a DescriptionTree,
  project: &'a Project,
  context: &'a Context,
  artifacts: Rc<ArtifactCache>,
  components: &'a ComponentFactory,
  sources: &'a SourceFactory,
  memo: HashMap<ComponentId, MemoEntry>,
  /// Names of the nodes currently being resolved, outermost first.
  in_flight: Vec<String>,
}

impl<'a> Resolver<'a> {
  pub fn new(
    tree: &'a DescriptionTree,
    project: &'a Project,
    context: &'a Context,
    artifacts: Rc<ArtifactCache>,
    components: &'a ComponentFactory,
    sources: &'a SourceFactory,
  ) -> Self {
    Self {
      tree,
      project,
      context,
      artifacts,
      components,
      sources,
      memo: HashMap::new(),
      in_flight: Vec::new(),
    }
  }

  /// Resolve one component description into its runtime instance.
  ///
  /// Dependency and source lists are resolved depth-first in declaration
  /// order and injected into the new component. Sources are never
  /// memoized: every source declaration yields a fresh instance.
  pub fn resolve_component(&mut self, id: ComponentId) -> Result<Rc<Component>, ResolveError> {
    let description = self.tree.component(id);

    match self.memo.get(&id) {
      Some(MemoEntry::Done(component)) => return Ok(Rc::clone(component)),
      Some(MemoEntry::InProgress) => {
        let mut chain: Vec<&str> = self.in_flight.iter().map(String::as_str).collect();
        chain.push(&description.name);
        return Err(ResolveError::DependencyCycle {
          chain: chain.join(" -> "),
        });
      }
      None => {}
    }

    trace!(component = %description.name, kind = %description.kind, "resolving component");
    let plugin = self.components.create(&PluginSetup {
      name: &description.name,
      kind: &description.kind,
      config: &description.config,
      source_count: description.sources.len(),
      project: self.project,
      context: self.context,
      artifacts: &self.artifacts,
    })?;

    self.memo.insert(id, MemoEntry::InProgress);
    self.in_flight.push(description.name.clone());
    let resolved = self.resolve_lists(id, plugin);
    self.in_flight.pop();

    let component = resolved?;
    self.memo.insert(id, MemoEntry::Done(Rc::clone(&component)));
    Ok(component)
  }

  fn resolve_lists(
    &mut self,
    id: ComponentId,
    plugin: Box<dyn ComponentPlugin>,
  ) -> Result<Rc<Component>, ResolveError> {
    let description = self.tree.component(id);

    let mut build_dependencies = Vec::with_capacity(description.build_depends.len());
    for dependency in &description.build_depends {
      build_dependencies.push(self.resolve_component(*dependency)?);
    }
    let mut runtime_dependencies = Vec::with_capacity(description.runtime_depends.len());
    for dependency in &description.runtime_depends {
      runtime_dependencies.push(self.resolve_component(*dependency)?);
    }

    let mut sources = Vec::with_capacity(description.sources.len());
    for source in &description.sources {
      sources.push(self.resolve_source(source)?);
    }

    Ok(Rc::new(Component::new(
      id,
      description,
      build_dependencies,
      runtime_dependencies,
      sources,
      plugin,
      Rc::clone(&self.artifacts),
    )))
  }

  /// Construct a fresh runtime source from its description.
  pub fn resolve_source(&self, description: &SourceDescription) -> Result<Rc<Source>, ResolveError> {
    let name = description.provenance.to_string();
    let plugin = self.sources.create(&PluginSetup {
      name: &name,
      kind: &description.kind,
      config: &description.config,
      source_count: 0,
      project: self.project,
      context: self.context,
      artifacts: &self.artifacts,
    })?;

    Ok(Rc::new(Source::new(description, plugin)))
  }
}
