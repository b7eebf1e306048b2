//! Memoized compilation.
//!
//! The [`CompileCache`] maps each [`Fingerprint`] to the single task compiling
//! it. A request whose fingerprint is already known gets the existing
//! [`LazyPath`] back and no new work is scheduled, so every source/flags pair
//! is compiled at most once per process. Entries are never evicted.

pub mod fingerprint;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::execute::{ExecuteError, Scheduler, Task, run_command};
use crate::lazy_path::LazyPath;
use crate::toolchain::Toolchain;
use crate::util::lock;

pub use fingerprint::Fingerprint;

pub struct CompileCache {
  object_dir: PathBuf,
  toolchain: Arc<Toolchain>,
  entries: Mutex<HashMap<Fingerprint, LazyPath>>,
}

impl CompileCache {
  pub fn new(object_dir: impl Into<PathBuf>, toolchain: Arc<Toolchain>) -> Self {
    Self {
      object_dir: object_dir.into(),
      toolchain,
      entries: Mutex::new(HashMap::new()),
    }
  }

  pub fn object_dir(&self) -> &Path {
    &self.object_dir
  }

  /// Compile `source` with `flags` appended to the toolchain's base flags.
  ///
  /// Returns the lazy object path. The object lands at
  /// `<object_dir>/<fingerprint hash>.o`. A failing compiler is logged by the
  /// task; the object path is still what the returned value resolves to under
  /// the best-effort policy.
  pub fn compile(&self, scheduler: &Scheduler, source: &Path, flags: &[String]) -> Result<LazyPath, ExecuteError> {
    let fingerprint = Fingerprint::new(source, flags);

    let mut entries = lock(&self.entries);
    if let Some(existing) = entries.get(&fingerprint) {
      debug!(source = %fingerprint.source.display(), "compile cache hit");
      return Ok(existing.clone());
    }

    let object = self.object_dir.join(fingerprint.object_name()?);
    std::fs::create_dir_all(&self.object_dir)?;

    let program = self.toolchain.cxx.clone();
    let args = self.toolchain.compile_args(&fingerprint.source, &object, flags);
    let label = format!("compile {}", fingerprint.source.display());
    let source_display = fingerprint.source.display().to_string();

    let handle = scheduler.submit(Task::new(label).output(object.clone()), move |_| async move {
      if let Some(parent) = object.parent() {
        tokio::fs::create_dir_all(parent).await?;
      }
      info!(source = %source_display, object = %object.display(), "compiling");
      run_command(&program, &args).await?;
      Ok(())
    });

    let lazy = LazyPath::from(handle);
    entries.insert(fingerprint, lazy.clone());
    Ok(lazy)
  }

  /// Number of distinct compile requests seen so far.
  pub fn len(&self) -> usize {
    lock(&self.entries).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
