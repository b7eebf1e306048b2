//! Build sessions.
//!
//! A [`BuildSession`] owns the process-scoped pieces of a build: the
//! scheduler, the compile cache, the library resolver and the toolchain. Every
//! declaration goes through it, and [`BuildSession::finish`] is the barrier that
//! waits for all outstanding work.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::compile::CompileCache;
use crate::discover::FileFinder;
use crate::execute::{ExecuteConfig, ExecuteError, JoinReport, Scheduler};
use crate::layout::Layout;
use crate::lazy_path::LazyPath;
use crate::library::{Library, LibraryResolver};
use crate::manifest::{Manifest, ManifestError, TargetSpec};
use crate::platform::{self, PlatformError};
use crate::target::{LinkInputs, LinkTarget, TargetKind};
use crate::toolchain::Toolchain;
use crate::util::path::resolve_against;

#[derive(Debug, Error)]
pub enum SessionError {
  #[error(transparent)]
  Platform(#[from] PlatformError),

  #[error(transparent)]
  Manifest(#[from] ManifestError),

  #[error(transparent)]
  Execute(#[from] ExecuteError),
}

/// A target declared from a manifest.
#[derive(Debug, Clone)]
pub struct DeclaredTarget {
  pub name: String,
  pub target: LinkTarget,
  pub runs: Vec<Vec<String>>,
}

pub struct BuildSession {
  layout: Layout,
  toolchain: Arc<Toolchain>,
  scheduler: Scheduler,
  cache: CompileCache,
  resolver: LibraryResolver,
}

impl BuildSession {
  pub fn new(layout: Layout, toolchain: Toolchain, config: &ExecuteConfig) -> Result<Self, ExecuteError> {
    let toolchain = Arc::new(toolchain);
    let scheduler = Scheduler::new(config)?;
    let cache = CompileCache::new(layout.object_dir.clone(), toolchain.clone());
    let resolver = LibraryResolver::from_layout(&layout);

    debug!(root = %layout.root.display(), cxx = %toolchain.cxx.display(), os = %toolchain.os, "build session ready");

    Ok(Self {
      layout,
      toolchain,
      scheduler,
      cache,
      resolver,
    })
  }

  /// Session for the project at `root`, with the manifest's toolchain additions.
  ///
  /// Fails if the host platform is not recognized.
  pub fn for_project(root: &Path, manifest: &Manifest, config: &ExecuteConfig) -> Result<Self, SessionError> {
    let os = platform::detect()?;
    let layout = Layout::from_root(root);
    let toolchain = manifest.toolchain.apply(Toolchain::new(&layout, os), &layout.root);
    Ok(Self::new(layout, toolchain, config)?)
  }

  pub fn layout(&self) -> &Layout {
    &self.layout
  }

  pub fn toolchain(&self) -> &Toolchain {
    &self.toolchain
  }

  pub fn scheduler(&self) -> &Scheduler {
    &self.scheduler
  }

  pub fn cache(&self) -> &CompileCache {
    &self.cache
  }

  pub fn compile(&self, source: &Path, flags: &[String]) -> Result<LazyPath, ExecuteError> {
    self.cache.compile(&self.scheduler, source, flags)
  }

  pub fn compile_all(&self, sources: &[PathBuf], flags: &[String]) -> Result<Vec<LazyPath>, ExecuteError> {
    sources.iter().map(|source| self.compile(source, flags)).collect()
  }

  pub fn find_library(&self, name: &str) -> PathBuf {
    self.resolver.find_library(name)
  }

  pub fn target(&self, kind: TargetKind, output: &Path, inputs: LinkInputs) -> Result<LinkTarget, ExecuteError> {
    let output = resolve_against(&self.layout.root, output);
    LinkTarget::build(
      &self.scheduler,
      self.toolchain.clone(),
      &self.layout.lib_dir,
      kind,
      output,
      inputs,
    )
  }

  pub fn executable(&self, output: &Path, inputs: LinkInputs) -> Result<LinkTarget, ExecuteError> {
    self.target(TargetKind::Executable, output, inputs)
  }

  pub fn shared_library(&self, output: &Path, inputs: LinkInputs) -> Result<LinkTarget, ExecuteError> {
    self.target(TargetKind::SharedLibrary, output, inputs)
  }

  /// Run a built target once its link has finished.
  pub fn execute(&self, target: &LinkTarget, args: &[String]) -> Result<String, ExecuteError> {
    target.execute(&self.scheduler, args)
  }

  /// Declare every target in `manifest`, in order.
  ///
  /// Nothing waits here: the returned targets are backed by submitted tasks.
  pub fn declare_manifest(&self, manifest: &Manifest) -> Result<Vec<DeclaredTarget>, SessionError> {
    manifest.validate()?;
    let mut declared: Vec<DeclaredTarget> = Vec::with_capacity(manifest.targets.len());

    for spec in &manifest.targets {
      let inputs = self.link_inputs(spec, &declared)?;
      let target = self.target(spec.kind, &spec.output, inputs)?;
      info!(target = %spec.name, output = %target.output().display(), "declared target");
      declared.push(DeclaredTarget {
        name: spec.name.clone(),
        target,
        runs: spec.run.clone(),
      });
    }

    Ok(declared)
  }

  fn link_inputs(&self, spec: &TargetSpec, declared: &[DeclaredTarget]) -> Result<LinkInputs, SessionError> {
    let mut finder = FileFinder::new(&spec.sources.extension);
    for dir in &spec.sources.dirs {
      finder.search_dir(resolve_against(&self.layout.root, dir));
    }
    for file in &spec.sources.files {
      finder.add_file(resolve_against(&self.layout.root, file));
    }
    if finder.is_empty() && spec.objects.is_empty() && spec.link.is_empty() {
      warn!(target = %spec.name, "target has no inputs");
    }

    let sources = self.compile_all(&finder.into_vec(), &spec.sources.flags)?;

    let mut objects = Vec::with_capacity(spec.link.len());
    for name in &spec.link {
      let linked = declared
        .iter()
        .find(|d| &d.name == name)
        .ok_or_else(|| ManifestError::UnknownTarget {
          target: spec.name.clone(),
          name: name.clone(),
        })?;
      objects.push(linked.target.artifact().clone());
    }

    // Prebuilt objects keep the resolver's answer as is, bare names included.
    let mut libraries: Vec<Library> = spec
      .objects
      .iter()
      .map(|name| Library::Prebuilt(self.find_library(name)))
      .collect();
    for lib in &spec.libraries {
      libraries.push(lib.to_library(&self.resolver)?);
    }

    Ok(LinkInputs {
      sources,
      objects,
      libraries,
    })
  }

  /// Wait for every submitted task. See [`Scheduler::join_all`].
  pub fn finish(&self) -> Result<JoinReport, ExecuteError> {
    self.scheduler.join_all()
  }
}

impl Drop for BuildSession {
  /// Outstanding compiles and links never outlive the session.
  fn drop(&mut self) {
    if let Err(e) = self.scheduler.wait_idle() {
      warn!(error = %e, "could not wait for outstanding tasks");
    }
  }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
  use super::*;
  use crate::execute::{ExecutionMode, FailurePolicy};
  use crate::platform::Os;
  use crate::util::testutil::{FakeCompiler, write_sources};
  use serial_test::serial;
  use std::collections::BTreeSet;
  use tempfile::TempDir;

  fn session(root: &Path, fake: &FakeCompiler, mode: ExecutionMode, policy: FailurePolicy) -> BuildSession {
    let layout = Layout::from_root(root);
    let toolchain = fake.toolchain(&layout, Os::Linux);
    BuildSession::new(
      layout,
      toolchain,
      &ExecuteConfig {
        parallelism: 4,
        mode,
        policy,
      },
    )
    .unwrap()
  }

  fn files_under(dir: &Path) -> BTreeSet<PathBuf> {
    walkdir::WalkDir::new(dir)
      .into_iter()
      .filter_map(Result::ok)
      .filter(|e| e.file_type().is_file())
      .map(|e| e.path().strip_prefix(dir).unwrap().to_path_buf())
      .collect()
  }

  fn build_three_objects(root: &Path, fake: &FakeCompiler, mode: ExecutionMode) -> BTreeSet<PathBuf> {
    let sess = session(root, fake, mode, FailurePolicy::BestEffort);
    let sources = write_sources(root, &["a.cpp", "b.cpp", "c.cpp"]);
    let objects = sess.compile_all(&sources, &[]).unwrap();
    let app = sess
      .executable(
        Path::new("build/bin/app"),
        LinkInputs {
          sources: objects,
          ..LinkInputs::default()
        },
      )
      .unwrap();
    let report = sess.finish().unwrap();
    assert!(report.is_success(), "{:?}", report);
    assert!(app.wait().unwrap().exists());
    files_under(&root.join("build"))
  }

  #[test]
  #[serial]
  fn link_waits_for_all_objects() {
    let temp = TempDir::new().unwrap();
    let fake = FakeCompiler::install(temp.path());
    let sess = session(temp.path(), &fake, ExecutionMode::Pooled, FailurePolicy::BestEffort);
    let sources = write_sources(temp.path(), &["a.cpp", "b.cpp", "c.cpp"]);

    let objects = sess.compile_all(&sources, &[]).unwrap();
    let app = sess
      .executable(
        Path::new("build/bin/app"),
        LinkInputs {
          sources: objects.clone(),
          ..LinkInputs::default()
        },
      )
      .unwrap();

    let artifact = app.wait().unwrap();
    assert_eq!(artifact, temp.path().join("build/bin/app"));

    let calls = fake.invocations();
    let link_call = calls.last().unwrap();
    for object in &objects {
      let path = object.resolve().unwrap();
      assert!(path.exists());
      assert!(link_call.contains(&path.display().to_string()));
    }
    assert!(link_call.contains("-Wl,-rpath="));
  }

  #[test]
  #[serial]
  fn inline_and_pooled_produce_same_files() {
    let pooled_dir = TempDir::new().unwrap();
    let inline_dir = TempDir::new().unwrap();
    let pooled_fake = FakeCompiler::install(pooled_dir.path());
    let inline_fake = FakeCompiler::install(inline_dir.path());

    let pooled = build_three_objects(pooled_dir.path(), &pooled_fake, ExecutionMode::Pooled);
    let inline = build_three_objects(inline_dir.path(), &inline_fake, ExecutionMode::Inline);

    // Object names hash the absolute source path, which differs per temp dir.
    let shape = |files: &BTreeSet<PathBuf>| {
      files
        .iter()
        .map(|p| p.parent().unwrap().to_path_buf())
        .collect::<Vec<_>>()
    };
    assert_eq!(shape(&pooled), shape(&inline));
    assert!(pooled.contains(Path::new("bin/app")));
    assert!(inline.contains(Path::new("bin/app")));
  }

  #[test]
  #[serial]
  fn same_project_builds_identically_in_both_modes() {
    let temp = TempDir::new().unwrap();
    let fake = FakeCompiler::install(temp.path());

    let pooled = build_three_objects(temp.path(), &fake, ExecutionMode::Pooled);
    std::fs::remove_dir_all(temp.path().join("build")).unwrap();
    let inline = build_three_objects(temp.path(), &fake, ExecutionMode::Inline);

    assert_eq!(pooled, inline);
    assert_eq!(pooled.len(), 4);
  }

  #[test]
  #[serial]
  fn dropping_session_waits_for_outstanding_work() {
    let temp = TempDir::new().unwrap();
    let fake = FakeCompiler::install(temp.path());
    let sess = session(temp.path(), &fake, ExecutionMode::Pooled, FailurePolicy::Strict);
    let sources = write_sources(temp.path(), &["slow.cpp"]);

    let object = sess.compile(&sources[0], &[]).unwrap();
    let pending = match &object {
      LazyPath::Pending(handle) => {
        assert!(!handle.status().is_finished());
        handle.clone()
      }
      LazyPath::Literal(_) => panic!("compile returned a literal path"),
    };
    drop(sess);

    assert!(pending.status().is_finished());
    assert_eq!(fake.compiles_of(&sources[0]), 1);
    assert_eq!(std::fs::read_dir(temp.path().join("build/obj")).unwrap().count(), 1);
  }

  #[test]
  #[serial]
  fn execute_runs_built_artifact() {
    let temp = TempDir::new().unwrap();
    let fake = FakeCompiler::install(temp.path());
    let sess = session(temp.path(), &fake, ExecutionMode::Pooled, FailurePolicy::BestEffort);
    let sources = write_sources(temp.path(), &["main.cpp"]);

    let app = sess
      .executable(
        Path::new("build/bin/app"),
        LinkInputs {
          sources: sess.compile_all(&sources, &[]).unwrap(),
          ..LinkInputs::default()
        },
      )
      .unwrap();

    let out = sess.execute(&app, &["--self-test".to_string()]).unwrap();
    assert_eq!(out, "artifact --self-test");
  }

  #[test]
  #[serial]
  fn best_effort_failure_still_links() {
    let temp = TempDir::new().unwrap();
    let fake = FakeCompiler::install(temp.path());
    let sess = session(temp.path(), &fake, ExecutionMode::Pooled, FailurePolicy::BestEffort);
    let sources = write_sources(temp.path(), &["ok.cpp", "broken.cpp"]);

    let app = sess
      .executable(
        Path::new("build/bin/app"),
        LinkInputs {
          sources: sess.compile_all(&sources, &[]).unwrap(),
          ..LinkInputs::default()
        },
      )
      .unwrap();

    let report = sess.finish().unwrap();
    // The broken compile fails; the link still runs against its nominal object.
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.completed, 2);
    assert!(report.failed[0].label.contains("broken.cpp"));
    assert!(app.wait().unwrap().exists());
  }

  #[test]
  #[serial]
  fn strict_failure_stops_link() {
    let temp = TempDir::new().unwrap();
    let fake = FakeCompiler::install(temp.path());
    let sess = session(temp.path(), &fake, ExecutionMode::Pooled, FailurePolicy::Strict);
    let sources = write_sources(temp.path(), &["broken.cpp"]);

    let app = sess
      .executable(
        Path::new("build/bin/app"),
        LinkInputs {
          sources: sess.compile_all(&sources, &[]).unwrap(),
          ..LinkInputs::default()
        },
      )
      .unwrap();

    assert!(matches!(app.wait(), Err(ExecuteError::TaskFailed { .. })));
    assert!(sess.finish().is_err());
    // Only the compile ran; the link never invoked the compiler driver.
    assert_eq!(fake.invocations().len(), 1);
  }

  #[test]
  #[serial]
  fn declares_manifest_targets_in_order() {
    let temp = TempDir::new().unwrap();
    let fake = FakeCompiler::install(temp.path());
    std::fs::create_dir_all(temp.path().join("src/core")).unwrap();
    std::fs::write(temp.path().join("src/core/core.cpp"), "").unwrap();
    std::fs::write(temp.path().join("src/main.cpp"), "").unwrap();
    std::fs::create_dir_all(temp.path().join("third_party/lib")).unwrap();
    std::fs::write(temp.path().join("third_party/lib/libz.a"), "").unwrap();
    std::fs::write(temp.path().join("third_party/lib/runtime.o"), "").unwrap();

    let manifest: Manifest = serde_json::from_str(
      r#"{ "targets": [
        { "name": "core", "kind": "shared_library", "output": "build/lib/libcore.so",
          "sources": { "dirs": ["src/core"] } },
        { "name": "app", "kind": "executable", "output": "build/bin/app",
          "sources": { "files": ["src/main.cpp"] },
          "link": ["core"],
          "objects": ["runtime"],
          "libraries": [{ "prebuilt": "z" }, { "linker": { "name": "objc", "os": "mac" } }],
          "run": [["--version"]] }
      ] }"#,
    )
    .unwrap();

    let sess = session(temp.path(), &fake, ExecutionMode::Pooled, FailurePolicy::BestEffort);
    let declared = sess.declare_manifest(&manifest).unwrap();
    let report = sess.finish().unwrap();

    assert!(report.is_success(), "{:?}", report);
    assert_eq!(declared.len(), 2);
    assert_eq!(declared[1].runs, vec![vec!["--version".to_string()]]);

    let calls = fake.invocations();
    let app_link = calls.iter().find(|c| c.contains("-o ") && c.contains("build/bin/app")).unwrap();
    assert!(app_link.contains("build/lib/libcore.so"));
    assert!(app_link.contains("third_party/lib/libz.a"));
    assert!(app_link.contains("third_party/lib/runtime.o"));
    assert!(!app_link.contains("-lobjc"));

    let core_link = calls
      .iter()
      .find(|c| c.contains("-shared") && c.contains("libcore.so"))
      .unwrap();
    assert!(!core_link.contains("-c "));
  }
}
