//! Runtime source instances.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::description::{FileDocument, Provenance, SourceDescription};
use crate::plugin::{Consistency, SourceError, SourcePlugin};

/// One resolved content origin feeding a component.
///
/// Unlike components, sources are never shared: every source declaration
/// produces its own instance. The plugin behind it is the only thing that
/// mutates, and only through [`Source::refresh`]; the core is
/// single-threaded, so interior mutability is plain `RefCell`.
pub struct Source {
  kind: String,
  provenance: Provenance,
  document: FileDocument,
  plugin: RefCell<Box<dyn SourcePlugin>>,
}

impl Source {
  pub(crate) fn new(description: &SourceDescription, plugin: Box<dyn SourcePlugin>) -> Self {
    Self {
      kind: description.kind.clone(),
      provenance: description.provenance.clone(),
      document: description.document.clone(),
      plugin: RefCell::new(plugin),
    }
  }

  pub fn kind(&self) -> &str {
    &self.kind
  }

  /// Where this source was declared.
  pub fn provenance(&self) -> &Provenance {
    &self.provenance
  }

  /// Validate the source's configuration.
  pub fn preflight(&self) -> Result<(), SourceError> {
    self.plugin.borrow().preflight()
  }

  /// Current consistency state.
  pub fn consistency(&self) -> Consistency {
    self.plugin.borrow().consistency()
  }

  pub fn is_consistent(&self) -> bool {
    self.consistency() != Consistency::Inconsistent
  }

  /// Cache-key material, or `None` while inconsistent.
  pub fn unique_key(&self) -> Option<serde_json::Value> {
    self.plugin.borrow().unique_key()
  }

  /// Pin this source to an exact reference, rewriting its declaration node
  /// inside the shared file document.
  ///
  /// Returns the file that must be rewritten when the reference changed,
  /// or `None` when the source was already pinned to the same reference.
  pub(crate) fn refresh(&self) -> Result<Option<(String, FileDocument)>, SourceError> {
    let changed = {
      let mut document = self.document.borrow_mut();
      let node = document
        .get_mut("sources")
        .and_then(|sources| sources.get_mut(self.provenance.index))
        .and_then(serde_yaml::Value::as_mapping_mut)
        .ok_or_else(|| {
          SourceError::new(format!("source node missing from document for {}", self.provenance))
        })?;
      self.plugin.borrow_mut().refresh(node)?
    };

    trace!(source = %self.provenance, changed, "refreshed source");
    if changed {
      Ok(Some((self.provenance.filename.clone(), Rc::clone(&self.document))))
    } else {
      Ok(None)
    }
  }
}
