//! Immutable description nodes produced by the loader.
//!
//! A [`DescriptionTree`] is the pre-resolution form of a build: one
//! [`ComponentDescription`] per declared component file, holding ordered
//! dependency and source lists, plus the parsed top-level document of every
//! file that was visited. Nodes are identified by arena index
//! ([`ComponentId`]); a component shared by several parents is one node
//! referenced from several dependency lists, which is what makes
//! identity-keyed resolution collapse diamonds.
//!
//! Description nodes are read-only after loading. The shared file documents
//! are the single exception: source refresh rewrites the `ref` of exactly
//! the source node that changed, through the handle its description carries.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Handle identifying one component description within its tree.
///
/// Two handles are equal exactly when they name the same description node,
/// regardless of how many parents reference it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(pub(crate) usize);

/// A parsed top-level YAML document, shared by every description node that
/// was declared in the same file.
pub type FileDocument = Rc<RefCell<serde_yaml::Value>>;

/// Where a source was declared: the component file and the position in that
/// file's `sources` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
  pub filename: String,
  pub index: usize,
}

impl std::fmt::Display for Provenance {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} [source {}]", self.filename, self.index)
  }
}

/// Description of one content origin feeding a component.
///
/// Source descriptions are never deduplicated: every entry in a component's
/// `sources` list is its own node, even when two entries are
/// configuration-identical.
#[derive(Debug, Clone)]
pub struct SourceDescription {
  pub kind: String,
  /// Snapshot of the source's configuration mapping at load time,
  /// including `kind` and any existing `ref`.
  pub config: serde_yaml::Mapping,
  pub provenance: Provenance,
  /// The top-level document this source was declared in, shared with every
  /// other node from the same file.
  pub document: FileDocument,
}

/// Description of one declared build component.
#[derive(Debug, Clone)]
pub struct ComponentDescription {
  /// Project-relative component filename, e.g. `base/runtime.yaml`.
  pub name: String,
  pub kind: String,
  /// Build-time dependencies, in declaration order.
  pub build_depends: Vec<ComponentId>,
  /// Runtime dependencies, in declaration order.
  pub runtime_depends: Vec<ComponentId>,
  /// Sources, in declaration order.
  pub sources: Vec<SourceDescription>,
  /// Kind-specific configuration (the `config` mapping).
  pub config: serde_yaml::Mapping,
}

/// The complete description tree for one target.
///
/// Owns the arena of description nodes and the parsed document of every
/// visited file. Consumed by exactly one resolver pass.
#[derive(Debug)]
pub struct DescriptionTree {
  target: ComponentId,
  components: Vec<ComponentDescription>,
  files: BTreeMap<String, FileDocument>,
}

impl DescriptionTree {
  pub(crate) fn new(
    target: ComponentId,
    components: Vec<ComponentDescription>,
    files: BTreeMap<String, FileDocument>,
  ) -> Self {
    Self {
      target,
      components,
      files,
    }
  }

  /// The node the whole tree was loaded for.
  pub fn target(&self) -> ComponentId {
    self.target
  }

  pub fn component(&self, id: ComponentId) -> &ComponentDescription {
    &self.components[id.0]
  }

  /// Number of distinct component descriptions in the tree.
  pub fn len(&self) -> usize {
    self.components.len()
  }

  pub fn is_empty(&self) -> bool {
    self.components.is_empty()
  }

  /// The parsed top-level document of a visited file, if any.
  pub fn file(&self, filename: &str) -> Option<&FileDocument> {
    self.files.get(filename)
  }
}
