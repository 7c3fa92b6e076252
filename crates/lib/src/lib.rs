//! strata-lib: the strata build orchestration engine.
//!
//! A strata project declares build components in YAML files; this crate
//! turns those declarations into a deduplicated runtime graph and drives
//! it through validation, consistency checking and source pinning:
//!
//! - [`loader`]: parses description files into a shared-node tree
//! - [`graph`]: the memoizing resolver and the runtime component graph
//! - [`pipeline`]: whole-graph preflight, traversal, consistency, refresh
//! - [`plan`]: topological order and parallel waves for a build driver
//! - [`plugin`]: kind registries and the builtin component/source kinds
//! - [`cache`]: the content-addressed artifact store
//! - [`context`] / [`remote`]: invocation configuration and remote specs

pub mod cache;
pub mod context;
pub mod description;
pub mod graph;
pub mod loader;
pub mod pipeline;
pub mod plan;
pub mod plugin;
pub mod project;
pub mod remote;
pub mod util;

pub use cache::ArtifactCache;
pub use context::Context;
pub use graph::{Component, Scope, Source};
pub use pipeline::{Node, Pipeline, PipelineError, RefreshError};
pub use plan::ExecutionPlan;
pub use plugin::{ComponentFactory, Consistency, SourceFactory};
pub use project::Project;
pub use util::hash::CacheKey;
