//! The resolved runtime graph.
//!
//! [`Resolver`] turns a description tree into runtime [`Component`] and
//! [`Source`] nodes; components expose the scope-filtered traversal the
//! pipeline and the build driver run on.

mod component;
mod resolver;
mod source;

pub use component::{Component, Dependencies, Scope};
pub use resolver::{ResolveError, Resolver};
pub use source::Source;
