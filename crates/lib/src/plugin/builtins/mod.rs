//! Builtin component and source kinds.
//!
//! These cover local, network-free builds: `script` runs configured
//! commands, `stack` aggregates dependencies, `import` stages its sources
//! verbatim, and the `local` source pins project files by content hash.
//! Anything else (fetch protocols, language-specific build kinds) is
//! expected to be registered by the embedder.

mod import;
mod local;
mod script;
mod stack;

pub use import::Import;
pub use local::Local;
pub use script::Script;
pub use stack::Stack;

use super::{ComponentFactory, SourceFactory};

pub(crate) fn register_components(factory: &mut ComponentFactory) {
  factory.register("script", Box::new(Script::create));
  factory.register("stack", Box::new(Stack::create));
  factory.register("import", Box::new(Import::create));
}

pub(crate) fn register_sources(factory: &mut SourceFactory) {
  factory.register("local", Box::new(Local::create));
}
