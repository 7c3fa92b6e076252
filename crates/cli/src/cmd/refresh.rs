//! Implementation of the `strata refresh` command.
//!
//! Pins every source in the target's closure to an exact reference and
//! rewrites the description files that changed.

use std::time::Instant;

use anyhow::Result;
use owo_colors::OwoColorize;

use strata_lib::{Context, Pipeline, Project};

use crate::output::{format_duration, symbols};

pub fn cmd_refresh(context: &Context, project: Project, target: &str) -> Result<()> {
  let start = Instant::now();
  let pipeline = Pipeline::new(context, project, target)?;

  let changed = pipeline.refresh()?;

  if changed.is_empty() {
    println!("{} All sources are already pinned.", symbols::SUCCESS.green());
    return Ok(());
  }

  for source in &changed {
    println!(
      "  {} Pinned {} ({})",
      symbols::MODIFY.yellow(),
      source.provenance().to_string().cyan(),
      source.kind().dimmed()
    );
  }

  println!(
    "{} {} source(s) pinned in {}",
    symbols::SUCCESS.green(),
    changed.len(),
    format_duration(start.elapsed()).dimmed()
  );

  Ok(())
}
