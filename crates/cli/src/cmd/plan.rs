//! Implementation of the `strata plan` command.
//!
//! Prints the staged execution waves for a target: components in the same
//! wave have no dependencies on each other and can build concurrently.

use anyhow::Result;
use owo_colors::OwoColorize;

use strata_lib::{Context, ExecutionPlan, Pipeline, Project, Scope};

use crate::output::symbols;

pub fn cmd_plan(context: &Context, project: Project, target: &str, scope: Scope) -> Result<()> {
  let pipeline = Pipeline::new(context, project, target)?;
  let plan = ExecutionPlan::new(&pipeline, scope)?;

  let reusable = plan.reusable().len();

  for (index, wave) in plan.waves().iter().enumerate() {
    println!("{}", format!("wave {index}").bold());
    for component in wave {
      if component.cached() {
        println!(
          "  {} {} ({}) {}",
          symbols::SUCCESS.green(),
          component.name(),
          component.kind().dimmed(),
          "cached".green()
        );
      } else {
        println!("  {} {} ({})", symbols::INFO, component.name(), component.kind().dimmed());
      }
    }
  }

  println!(
    "{} {} component(s), {} cached",
    symbols::INFO.dimmed(),
    plan.len(),
    reusable
  );

  Ok(())
}
