//! Implementation of the `cforge build` command.
//!
//! Loads the manifest, declares every target, runs the manifest's commands
//! against the finished artifacts and waits for all outstanding tasks.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::info;

use cforge_lib::consts::MANIFEST_FILE;
use cforge_lib::execute::{ExecuteConfig, ExecutionMode, FailurePolicy};
use cforge_lib::manifest::Manifest;
use cforge_lib::session::{BuildSession, DeclaredTarget};

use crate::output::{RUN_ARROW, format_duration, print_error, print_info, print_stat, print_success, print_warning};

pub struct BuildArgs {
  pub root: Option<PathBuf>,
  pub manifest: Option<PathBuf>,
  pub jobs: Option<usize>,
  pub inline: bool,
  pub strict: bool,
  pub no_run: bool,
}

impl BuildArgs {
  fn execute_config(&self) -> ExecuteConfig {
    let mut config = ExecuteConfig::from_env();
    if let Some(jobs) = self.jobs.filter(|j| *j > 0) {
      config.parallelism = jobs;
    }
    if self.inline {
      config.mode = ExecutionMode::Inline;
    }
    if self.strict {
      config.policy = FailurePolicy::Strict;
    }
    config
  }
}

/// Execute the build command.
///
/// Under the default best-effort policy, failed compiles, links and runs are
/// reported but the command still succeeds. With `--strict` any failure makes
/// it return an error. Every submitted task has finished before this returns,
/// whichever way it returns.
pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let start = Instant::now();
  let root = super::project_root(args.root.clone())?;
  let manifest_path = args.manifest.clone().unwrap_or_else(|| root.join(MANIFEST_FILE));
  let config = args.execute_config();

  let manifest = Manifest::load(&manifest_path).context("Failed to load manifest")?;
  info!(manifest = %manifest_path.display(), targets = manifest.targets.len(), "loaded manifest");

  let session = BuildSession::for_project(&root, &manifest, &config).context("Failed to set up build")?;
  let declared = declare_and_run(&session, &manifest, !args.no_run, config.policy);
  let joined = session.finish();

  let declared = declared?;
  let report = joined.context("Build failed")?;

  for failure in &report.failed {
    print_warning(&format!("{} failed: {}", failure.label, failure.message));
  }

  println!();
  if report.is_success() {
    print_success("Build complete!");
  } else {
    print_warning("Build finished with failures");
  }
  print_stat("Targets", &declared.len().to_string());
  print_stat("Tasks completed", &report.completed.to_string());
  print_stat("Tasks failed", &report.failed.len().to_string());
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(())
}

fn declare_and_run(
  session: &BuildSession,
  manifest: &Manifest,
  run: bool,
  policy: FailurePolicy,
) -> Result<Vec<DeclaredTarget>> {
  let declared = session.declare_manifest(manifest).context("Failed to declare targets")?;
  if run {
    for target in &declared {
      run_target(session, target, policy)?;
    }
  }
  Ok(declared)
}

fn run_target(session: &BuildSession, declared: &DeclaredTarget, policy: FailurePolicy) -> Result<()> {
  for run_args in &declared.runs {
    print_info(&format!(
      "{} {} {}",
      declared.name,
      RUN_ARROW,
      run_args.join(" ")
    ));
    match session.execute(&declared.target, run_args) {
      Ok(stdout) => {
        if !stdout.is_empty() {
          println!("{}", stdout);
        }
      }
      Err(e) if policy == FailurePolicy::Strict => {
        print_error(&format!("{}: {}", declared.name, e));
        bail!("Running target '{}' failed", declared.name);
      }
      Err(e) => print_warning(&format!("{}: {}", declared.name, e)),
    }
  }
  Ok(())
}
