//! Link targets.
//!
//! A [`LinkTarget`] is a final artifact, an executable or shared library,
//! linked from lazy object paths and libraries. Declaring a target submits a
//! single link task that waits for every input before invoking the linker.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::execute::{ExecuteError, Scheduler, Task, run_command};
use crate::lazy_path::LazyPath;
use crate::library::Library;
use crate::platform::Os;
use crate::toolchain::Toolchain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
  Executable,
  SharedLibrary,
}

impl TargetKind {
  /// Flags selecting the kind of artifact the linker produces.
  pub fn flags(self, os: Os) -> &'static [&'static str] {
    match (self, os) {
      (TargetKind::Executable, _) => &[],
      (TargetKind::SharedLibrary, Os::MacOs) => &["-Wl,-flat_namespace", "-Wl,-undefined,suppress", "-dynamiclib"],
      (TargetKind::SharedLibrary, Os::Linux | Os::Windows) => &["-shared"],
    }
  }
}

/// Linker flags for `os`: runtime search path, dead code stripping and binding policy.
pub fn os_link_flags(os: Os, lib_dir: &Path) -> Vec<String> {
  let lib_dir = lib_dir.display().to_string();
  match os {
    Os::Linux => vec![
      "-Wl,-z,now".to_string(),
      format!("-Wl,-rpath={}", lib_dir),
      "-Wl,-gc-sections".to_string(),
      "-Wl,-E".to_string(),
    ],
    Os::MacOs => vec![
      "-Xlinker".to_string(),
      "-rpath".to_string(),
      "-Xlinker".to_string(),
      lib_dir,
      "-Wl,-dead_strip".to_string(),
    ],
    Os::Windows => Vec::new(),
  }
}

/// Assemble the linker argument list.
///
/// Order: base flags, stdlib selection, kind flags, `-o <output>`,
/// `-L<lib_dir>`, OS flags, then sources, objects and library arguments.
pub fn link_args(
  toolchain: &Toolchain,
  lib_dir: &Path,
  kind: TargetKind,
  output: &Path,
  sources: &[PathBuf],
  objects: &[PathBuf],
  libraries: &[String],
) -> Vec<String> {
  let mut args: Vec<String> = toolchain.base_flags().to_vec();
  args.extend(toolchain.stdlib_flags().iter().map(|f| f.to_string()));
  args.extend(kind.flags(toolchain.os).iter().map(|f| f.to_string()));
  args.push("-o".to_string());
  args.push(output.display().to_string());
  args.push(format!("-L{}", lib_dir.display()));
  args.extend(os_link_flags(toolchain.os, lib_dir));
  args.extend(sources.iter().map(|p| p.display().to_string()));
  args.extend(objects.iter().map(|p| p.display().to_string()));
  args.extend(libraries.iter().cloned());
  args
}

/// Inputs of a link target.
#[derive(Debug, Clone, Default)]
pub struct LinkInputs {
  /// Objects compiled from the target's own sources.
  pub sources: Vec<LazyPath>,
  /// Precompiled objects and other targets' outputs.
  pub objects: Vec<LazyPath>,
  pub libraries: Vec<Library>,
}

#[derive(Debug, Clone)]
pub struct LinkTarget {
  kind: TargetKind,
  output: PathBuf,
  artifact: LazyPath,
}

impl LinkTarget {
  /// Declare a link target and submit its link task.
  ///
  /// The output's parent directory is created immediately; the link itself runs
  /// once every source and object path has resolved.
  pub fn build(
    scheduler: &Scheduler,
    toolchain: Arc<Toolchain>,
    lib_dir: &Path,
    kind: TargetKind,
    output: PathBuf,
    inputs: LinkInputs,
  ) -> Result<Self, ExecuteError> {
    if let Some(parent) = output.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let source_count = inputs.sources.len();
    let lib_dir = lib_dir.to_path_buf();
    let libraries = inputs.libraries;
    let task_output = output.clone();
    let task = Task::new(format!("link {}", output.display()))
      .output(output.clone())
      .inputs(inputs.sources.into_iter().chain(inputs.objects));

    let handle = scheduler.submit(task, move |mut resolved| async move {
      let objects = resolved.split_off(source_count);
      let mut library_args = Vec::new();
      for library in &libraries {
        library_args.extend(library.linker_args(toolchain.os).await);
      }

      let args = link_args(
        &toolchain,
        &lib_dir,
        kind,
        &task_output,
        &resolved,
        &objects,
        &library_args,
      );
      info!(output = %task_output.display(), kind = ?kind, inputs = resolved.len() + objects.len(), "linking");
      run_command(&toolchain.cxx, &args).await?;
      Ok(())
    });

    Ok(Self {
      kind,
      output,
      artifact: LazyPath::from(handle),
    })
  }

  pub fn kind(&self) -> TargetKind {
    self.kind
  }

  /// Where the artifact will be written.
  pub fn output(&self) -> &Path {
    &self.output
  }

  /// The artifact as a lazy path, usable as another target's object input.
  pub fn artifact(&self) -> &LazyPath {
    &self.artifact
  }

  /// Block until the link has finished and return the artifact path.
  pub fn wait(&self) -> Result<PathBuf, ExecuteError> {
    self.artifact.resolve()
  }

  /// Wait for the link, then run the artifact with `args`.
  ///
  /// Returns the artifact's trimmed stdout.
  pub fn execute(&self, scheduler: &Scheduler, args: &[String]) -> Result<String, ExecuteError> {
    let artifact = self.wait()?;
    info!(artifact = %artifact.display(), "executing target");
    scheduler.block_on(run_command(&artifact, args))?
  }
}
