//! strata command line frontend.

mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use strata_lib::{Context, Project, Scope};

/// strata - declarative build orchestration
#[derive(Parser)]
#[command(name = "strata")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Project directory
  #[arg(long, global = true, default_value = ".")]
  project: PathBuf,

  /// User configuration file
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum ScopeArg {
  #[default]
  All,
  Build,
  Run,
}

impl From<ScopeArg> for Scope {
  fn from(arg: ScopeArg) -> Self {
    match arg {
      ScopeArg::All => Scope::All,
      ScopeArg::Build => Scope::Build,
      ScopeArg::Run => Scope::Run,
    }
  }
}

#[derive(Subcommand)]
enum Commands {
  /// List a target's dependency closure
  Show {
    /// Target component file, e.g. app.yaml
    target: String,

    /// Which dependency edges to follow
    #[arg(long, value_enum, default_value_t = ScopeArg::All)]
    scope: ScopeArg,

    /// Also list each component's sources
    #[arg(long)]
    sources: bool,
  },

  /// Pin every source in a target's closure to an exact reference
  Refresh {
    /// Target component file, e.g. app.yaml
    target: String,
  },

  /// Show the staged execution plan for a target
  Plan {
    /// Target component file, e.g. app.yaml
    target: String,

    /// Which dependency edges to follow
    #[arg(long, value_enum, default_value_t = ScopeArg::All)]
    scope: ScopeArg,
  },
}

fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .without_time()
    .init();

  let cli = Cli::parse();
  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      output::print_error(&format!("{e:#}"));
      ExitCode::FAILURE
    }
  }
}

fn run(cli: Cli) -> Result<()> {
  let context = Context::load(cli.config.as_deref()).context("failed to load configuration")?;
  let project = Project::load(&cli.project).context("failed to load project")?;

  match cli.command {
    Commands::Show {
      target,
      scope,
      sources,
    } => cmd::cmd_show(&context, project, &target, scope.into(), sources),
    Commands::Refresh { target } => cmd::cmd_refresh(&context, project, &target),
    Commands::Plan { target, scope } => cmd::cmd_plan(&context, project, &target, scope.into()),
  }
}
