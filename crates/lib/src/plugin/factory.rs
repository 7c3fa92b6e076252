//! Kind registries for component and source plugins.
//!
//! A factory maps a kind string to a constructor closure. The builtin kinds
//! are registered by [`ComponentFactory::with_builtins`] and
//! [`SourceFactory::with_builtins`]; embedders and tests may register
//! additional kinds at runtime. Registering a kind again replaces the
//! previous constructor.

use std::collections::HashMap;

use super::builtins;
use super::{ComponentPlugin, PluginError, PluginSetup, SourcePlugin};

pub type ComponentConstructor = Box<dyn Fn(&PluginSetup<'_>) -> Result<Box<dyn ComponentPlugin>, PluginError>>;
pub type SourceConstructor = Box<dyn Fn(&PluginSetup<'_>) -> Result<Box<dyn SourcePlugin>, PluginError>>;

/// Registry of component kinds.
pub struct ComponentFactory {
  constructors: HashMap<String, ComponentConstructor>,
}

impl ComponentFactory {
  /// An empty registry, for embedders that supply every kind themselves.
  pub fn empty() -> Self {
    Self {
      constructors: HashMap::new(),
    }
  }

  /// A registry populated with the builtin component kinds.
  pub fn with_builtins() -> Self {
    let mut factory = Self::empty();
    builtins::register_components(&mut factory);
    factory
  }

  pub fn register(&mut self, kind: impl Into<String>, constructor: ComponentConstructor) {
    self.constructors.insert(kind.into(), constructor);
  }

  pub fn knows(&self, kind: &str) -> bool {
    self.constructors.contains_key(kind)
  }

  /// Construct the plugin for `setup.kind`.
  pub fn create(&self, setup: &PluginSetup<'_>) -> Result<Box<dyn ComponentPlugin>, PluginError> {
    let constructor = self
      .constructors
      .get(setup.kind)
      .ok_or_else(|| PluginError::UnknownComponentKind {
        kind: setup.kind.to_string(),
      })?;
    constructor(setup)
  }
}

/// Registry of source kinds.
pub struct SourceFactory {
  constructors: HashMap<String, SourceConstructor>,
}

impl SourceFactory {
  pub fn empty() -> Self {
    Self {
      constructors: HashMap::new(),
    }
  }

  /// A registry populated with the builtin source kinds.
  pub fn with_builtins() -> Self {
    let mut factory = Self::empty();
    builtins::register_sources(&mut factory);
    factory
  }

  pub fn register(&mut self, kind: impl Into<String>, constructor: SourceConstructor) {
    self.constructors.insert(kind.into(), constructor);
  }

  pub fn knows(&self, kind: &str) -> bool {
    self.constructors.contains_key(kind)
  }

  pub fn create(&self, setup: &PluginSetup<'_>) -> Result<Box<dyn SourcePlugin>, PluginError> {
    let constructor = self
      .constructors
      .get(setup.kind)
      .ok_or_else(|| PluginError::UnknownSourceKind {
        kind: setup.kind.to_string(),
      })?;
    constructor(setup)
  }
}
