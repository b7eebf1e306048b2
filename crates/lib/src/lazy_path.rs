//! Paths that may still be pending.
//!
//! A [`LazyPath`] is either a path known up front or the output of a task that
//! has been submitted but may not have run yet. Consumers resolve it when they
//! actually need the path, which lets a build graph be declared in dependency
//! order without sequencing any execution by hand.

use std::path::{Path, PathBuf};

use crate::execute::{ExecuteError, FailurePolicy, Handle, TaskOutcome};
use crate::util::path::absolute;

#[derive(Debug, Clone)]
pub enum LazyPath {
  /// A path that is already known.
  Literal(PathBuf),
  /// The output of a submitted task.
  Pending(Handle),
}

impl LazyPath {
  /// Whether resolving would return without waiting.
  pub fn is_ready(&self) -> bool {
    match self {
      LazyPath::Literal(_) => true,
      LazyPath::Pending(handle) => handle.outcome().is_some(),
    }
  }

  /// Block until the path is known and return it in absolute form.
  ///
  /// For a failed task the nominal output path is returned under
  /// `BestEffort`; under `Strict` the failure is returned instead.
  pub fn resolve(&self) -> Result<PathBuf, ExecuteError> {
    match self {
      LazyPath::Literal(path) => Ok(absolute(path)),
      LazyPath::Pending(handle) => outcome_path(handle, handle.resolve()?),
    }
  }

  /// Like [`LazyPath::resolve`], for use from inside a running task.
  pub async fn resolve_async(&self) -> Result<PathBuf, ExecuteError> {
    match self {
      LazyPath::Literal(path) => Ok(absolute(path)),
      LazyPath::Pending(handle) => outcome_path(handle, handle.resolve_async().await),
    }
  }
}

fn outcome_path(handle: &Handle, outcome: TaskOutcome) -> Result<PathBuf, ExecuteError> {
  match outcome {
    TaskOutcome::Completed { output: Some(path) } => Ok(absolute(&path)),
    TaskOutcome::Completed { output: None } => Err(ExecuteError::NoOutput {
      label: handle.label().to_string(),
    }),
    TaskOutcome::Failed {
      nominal: Some(path), ..
    } if handle.policy() == FailurePolicy::BestEffort => Ok(absolute(&path)),
    TaskOutcome::Failed { message, .. } => Err(ExecuteError::TaskFailed {
      label: handle.label().to_string(),
      message,
    }),
  }
}

impl From<PathBuf> for LazyPath {
  fn from(path: PathBuf) -> Self {
    LazyPath::Literal(path)
  }
}

impl From<&Path> for LazyPath {
  fn from(path: &Path) -> Self {
    LazyPath::Literal(path.to_path_buf())
  }
}

impl From<&str> for LazyPath {
  fn from(path: &str) -> Self {
    LazyPath::Literal(PathBuf::from(path))
  }
}

impl From<Handle> for LazyPath {
  fn from(handle: Handle) -> Self {
    LazyPath::Pending(handle)
  }
}
