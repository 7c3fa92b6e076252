//! Implementation of the `strata show` command.
//!
//! Lists the target's dependency closure under the selected scope, one
//! line per component with its cache state and cache key.

use anyhow::Result;
use owo_colors::OwoColorize;

use strata_lib::{Context, Node, Pipeline, Project, Scope};

use crate::output::symbols;

/// List the closure of `target`.
///
/// With `sources` set, each component's sources are printed directly
/// above it, with their consistency state.
pub fn cmd_show(context: &Context, project: Project, target: &str, scope: Scope, sources: bool) -> Result<()> {
  let pipeline = Pipeline::new(context, project, target)?;

  if sources {
    for node in pipeline.dependencies_with_sources(scope) {
      match node {
        Node::Source(source) => {
          let state = source.consistency().to_string();
          println!(
            "  {} {} ({}) {}",
            symbols::INFO.dimmed(),
            source.provenance(),
            source.kind().dimmed(),
            state.yellow()
          );
        }
        Node::Component(component) => print_component(&component),
      }
    }
  } else {
    for component in pipeline.dependencies(scope) {
      print_component(&component);
    }
  }

  Ok(())
}

fn print_component(component: &strata_lib::Component) {
  let key = component.cache_key();
  let key_display = match &key {
    Some(key) => key.short().to_string(),
    None => "-".repeat(12),
  };

  if key.is_none() {
    println!(
      "{} {:<12} {} ({})",
      "inconsistent".yellow(),
      key_display.dimmed(),
      component.name(),
      component.kind().dimmed()
    );
  } else if component.cached() {
    println!(
      "{} {:<12} {} ({})",
      "cached      ".green(),
      key_display.dimmed(),
      component.name(),
      component.kind().dimmed()
    );
  } else {
    println!(
      "{} {:<12} {} ({})",
      "buildable   ",
      key_display.dimmed(),
      component.name(),
      component.kind().dimmed()
    );
  }
}
