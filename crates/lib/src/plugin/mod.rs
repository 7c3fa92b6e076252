//! Kind-keyed plugin contracts for components and sources.
//!
//! The engine never interprets kind-specific behavior itself: every
//! component and source file names a `kind`, and a registry maps that kind
//! to a constructor producing the concrete plugin. Plugins receive a
//! [`PluginSetup`] at construction and expose the capability set the
//! pipeline drives: preflight validation, source consistency, and refresh.
//!
//! Dependency and source lists are injected into runtime nodes by the
//! resolver; plugins never reach into engine state.

mod factory;

pub mod builtins;

use std::rc::Rc;

use thiserror::Error;

pub use factory::{ComponentConstructor, ComponentFactory, SourceConstructor, SourceFactory};

use crate::cache::ArtifactCache;
use crate::context::Context;
use crate::project::Project;

/// Whether a source currently has a resolved, reproducible reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Consistency {
  /// No exact reference yet; the source must be refreshed before any cache
  /// key can be computed.
  Inconsistent,
  /// Pinned to an exact reference.
  Resolved,
  /// Pinned, and the referenced content is present locally.
  Cached,
}

impl std::fmt::Display for Consistency {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let label = match self {
      Consistency::Inconsistent => "inconsistent",
      Consistency::Resolved => "resolved",
      Consistency::Cached => "cached",
    };
    write!(f, "{label}")
  }
}

/// Everything a plugin constructor gets to see.
///
/// `name` is the component filename for component plugins and the source
/// provenance for source plugins.
pub struct PluginSetup<'a> {
  pub name: &'a str,
  pub kind: &'a str,
  pub config: &'a serde_yaml::Mapping,
  /// Number of sources the declaring component carries. Lets aggregation
  /// kinds reject sources without seeing them.
  pub source_count: usize,
  pub project: &'a Project,
  pub context: &'a Context,
  pub artifacts: &'a Rc<ArtifactCache>,
}

/// Error raised by a component plugin, e.g. from preflight validation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ComponentError {
  message: String,
}

impl ComponentError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

/// Error raised by a source plugin.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SourceError {
  message: String,
}

impl SourceError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

/// Errors raised by the kind registries.
#[derive(Debug, Error)]
pub enum PluginError {
  #[error("unknown component kind '{kind}'")]
  UnknownComponentKind { kind: String },

  #[error("unknown source kind '{kind}'")]
  UnknownSourceKind { kind: String },

  #[error("failed to construct '{kind}' plugin for {node}: {reason}")]
  Construct {
    kind: String,
    node: String,
    reason: String,
  },
}

/// Kind-specific behavior of one component.
pub trait ComponentPlugin {
  /// Validate configuration against the kind's own rules. Runs exactly once
  /// per distinct component, after the whole graph has been resolved.
  fn preflight(&self) -> Result<(), ComponentError>;
}

/// Kind-specific behavior of one source.
pub trait SourcePlugin {
  fn preflight(&self) -> Result<(), SourceError>;

  /// Current consistency state.
  fn consistency(&self) -> Consistency;

  /// Pin this source to an exact, reproducible reference, rewriting its
  /// declaration `node` in place. Returns whether anything changed.
  fn refresh(&mut self, node: &mut serde_yaml::Mapping) -> Result<bool, SourceError>;

  /// Material this source contributes to its component's cache key, or
  /// `None` while the source is inconsistent.
  fn unique_key(&self) -> Option<serde_json::Value>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn consistency_orders_from_inconsistent_to_cached() {
    assert!(Consistency::Inconsistent < Consistency::Resolved);
    assert!(Consistency::Resolved < Consistency::Cached);
  }

  #[test]
  fn consistency_display() {
    assert_eq!(Consistency::Inconsistent.to_string(), "inconsistent");
    assert_eq!(Consistency::Resolved.to_string(), "resolved");
    assert_eq!(Consistency::Cached.to_string(), "cached");
  }
}
