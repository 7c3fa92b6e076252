//! Staged execution planning over a resolved pipeline.
//!
//! The plan projects a pipeline's closure onto a DAG and computes the
//! topological build order plus parallel waves: groups of components whose
//! dependencies all sit in earlier waves, so each wave can be dispatched
//! concurrently by a build driver.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

use crate::description::ComponentId;
use crate::graph::{Component, Scope};
use crate::pipeline::Pipeline;

/// Errors raised while planning.
#[derive(Debug, Error)]
pub enum PlanError {
  /// The resolver guarantees an acyclic graph; this is pure defense.
  #[error("dependency cycle detected while planning")]
  CycleDetected,
}

/// A staged execution plan for one pipeline closure.
pub struct ExecutionPlan {
  order: Vec<Rc<Component>>,
  waves: Vec<Vec<Rc<Component>>>,
}

impl ExecutionPlan {
  /// Plan the pipeline's closure under `scope`.
  pub fn new(pipeline: &Pipeline, scope: Scope) -> Result<Self, PlanError> {
    let components: Vec<Rc<Component>> = pipeline.dependencies(scope).collect();

    let mut graph: DiGraph<Rc<Component>, ()> = DiGraph::new();
    let mut nodes: HashMap<ComponentId, NodeIndex> = HashMap::new();
    for component in &components {
      nodes.insert(component.id(), graph.add_node(Rc::clone(component)));
    }

    for component in &components {
      let dependent = nodes[&component.id()];
      let mut seen = HashSet::new();
      for dependency in scope_edges(component, scope) {
        if !seen.insert(dependency.id()) {
          continue;
        }
        if let Some(&dep_index) = nodes.get(&dependency.id()) {
          graph.add_edge(dep_index, dependent, ());
        }
      }
    }

    let sorted = toposort(&graph, None).map_err(|_| PlanError::CycleDetected)?;
    let order: Vec<Rc<Component>> = sorted.iter().map(|index| Rc::clone(&graph[*index])).collect();
    let waves = compute_waves(&graph)?;

    Ok(Self { order, waves })
  }

  /// Components in dependency-before-dependent order.
  pub fn topological(&self) -> &[Rc<Component>] {
    &self.order
  }

  /// Parallel execution waves: every component's dependencies sit in an
  /// earlier wave.
  pub fn waves(&self) -> &[Vec<Rc<Component>>] {
    &self.waves
  }

  pub fn len(&self) -> usize {
    self.order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }

  /// Components whose artifact is already in the cache and need no build.
  pub fn reusable(&self) -> Vec<Rc<Component>> {
    self.order.iter().filter(|c| c.cached()).cloned().collect()
  }
}

fn scope_edges(component: &Rc<Component>, scope: Scope) -> Vec<Rc<Component>> {
  match scope {
    Scope::Build => component.build_dependencies().to_vec(),
    Scope::Run => component.runtime_dependencies().to_vec(),
    Scope::All => component
      .build_dependencies()
      .iter()
      .chain(component.runtime_dependencies())
      .cloned()
      .collect(),
  }
}

/// Kahn-style level assignment: wave n holds every node whose dependencies
/// all live in waves earlier than n.
fn compute_waves(graph: &DiGraph<Rc<Component>, ()>) -> Result<Vec<Vec<Rc<Component>>>, PlanError> {
  let mut in_degree: HashMap<NodeIndex, usize> = HashMap::new();
  for index in graph.node_indices() {
    in_degree.insert(index, graph.neighbors_directed(index, Direction::Incoming).count());
  }

  let mut remaining: HashSet<NodeIndex> = graph.node_indices().collect();
  let mut waves = Vec::new();

  while !remaining.is_empty() {
    let mut ready: Vec<NodeIndex> = remaining.iter().filter(|&&index| in_degree[&index] == 0).copied().collect();
    if ready.is_empty() {
      return Err(PlanError::CycleDetected);
    }
    ready.sort();

    for &index in &ready {
      remaining.remove(&index);
      for neighbor in graph.neighbors_directed(index, Direction::Outgoing) {
        if let Some(degree) = in_degree.get_mut(&neighbor) {
          *degree = degree.saturating_sub(1);
        }
      }
    }

    waves.push(ready.into_iter().map(|index| Rc::clone(&graph[index])).collect());
  }

  Ok(waves)
}
