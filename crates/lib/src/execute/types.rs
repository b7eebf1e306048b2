//! Types for task execution.
//!
//! This module defines the error types, task states and outcomes, and the
//! configuration for running build tasks.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::consts::{DEFAULT_PARALLELISM, ENV_JOBS};
use crate::util::hash::HashError;

/// Errors that can occur while running build tasks.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// External command exited unsuccessfully.
  #[error("command failed with exit code {code:?}: {cmd}")]
  CmdFailed { cmd: String, code: Option<i32> },

  /// External command could not be started.
  #[error("failed to start command {cmd}: {source}")]
  CmdSpawn {
    cmd: String,
    #[source]
    source: std::io::Error,
  },

  /// I/O error during execution.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// Fingerprint could not be hashed.
  #[error("hash error: {0}")]
  Hash(#[from] HashError),

  /// A task failed and strict mode refuses to continue with its nominal output.
  #[error("task '{label}' failed: {message}")]
  TaskFailed { label: String, message: String },

  /// A task completed without declaring an output path.
  #[error("task '{label}' produced no output path")]
  NoOutput { label: String },

  /// A blocking wait was requested from inside an async runtime.
  #[error("cannot block on '{label}' from inside an async runtime")]
  BlockingInRuntime { label: String },

  /// Neither a worker pool nor an inline runtime could be created.
  #[error("no execution runtime available: {0}")]
  RuntimeUnavailable(#[source] std::io::Error),
}

/// How submitted tasks are run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
  /// Tasks run concurrently on a bounded worker pool.
  #[default]
  Pooled,
  /// Tasks run to completion inside `submit`, one at a time.
  Inline,
}

/// What happens after an external command fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
  /// Log the failure and carry on with the task's nominal output path.
  #[default]
  BestEffort,
  /// Propagate the failure to everything that depends on the task.
  Strict,
}

/// Configuration for task execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteConfig {
  /// Maximum number of tasks running at the same time.
  pub parallelism: usize,

  pub mode: ExecutionMode,

  pub policy: FailurePolicy,
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      parallelism: DEFAULT_PARALLELISM,
      mode: ExecutionMode::default(),
      policy: FailurePolicy::default(),
    }
  }
}

impl ExecuteConfig {
  /// Default configuration with `CFORGE_JOBS` applied, when set to a positive number.
  pub fn from_env() -> Self {
    let parallelism = std::env::var(ENV_JOBS)
      .ok()
      .and_then(|v| v.trim().parse::<usize>().ok())
      .filter(|n| *n > 0)
      .unwrap_or(DEFAULT_PARALLELISM);
    Self {
      parallelism,
      ..Self::default()
    }
  }
}

/// Lifecycle of a submitted task.
///
/// `Pending -> Running -> Completed | Failed`, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
  Pending,
  Running,
  Completed,
  Failed,
}

impl TaskStatus {
  pub fn is_finished(self) -> bool {
    matches!(self, TaskStatus::Completed | TaskStatus::Failed)
  }
}

/// Final result of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
  Completed { output: Option<PathBuf> },
  /// The task failed. `nominal` is the output the task was supposed to produce.
  Failed { nominal: Option<PathBuf>, message: String },
}

impl TaskOutcome {
  pub fn status(&self) -> TaskStatus {
    match self {
      TaskOutcome::Completed { .. } => TaskStatus::Completed,
      TaskOutcome::Failed { .. } => TaskStatus::Failed,
    }
  }

  /// The produced path, or the nominal one for a failed task.
  pub fn path(&self) -> Option<&Path> {
    match self {
      TaskOutcome::Completed { output } => output.as_deref(),
      TaskOutcome::Failed { nominal, .. } => nominal.as_deref(),
    }
  }
}

/// A task that ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
  pub label: String,
  pub message: String,
}

/// Summary returned by the final barrier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
  pub completed: usize,
  pub failed: Vec<TaskFailure>,
}

impl JoinReport {
  pub fn is_success(&self) -> bool {
    self.failed.is_empty()
  }

  pub fn total(&self) -> usize {
    self.completed + self.failed.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  fn default_config_is_pooled_best_effort() {
    let config = ExecuteConfig::default();
    assert_eq!(config.parallelism, 32);
    assert_eq!(config.mode, ExecutionMode::Pooled);
    assert_eq!(config.policy, FailurePolicy::BestEffort);
  }

  #[test]
  #[serial]
  fn jobs_env_sets_parallelism() {
    temp_env::with_var(ENV_JOBS, Some("6"), || {
      assert_eq!(ExecuteConfig::from_env().parallelism, 6);
    });
  }

  #[test]
  #[serial]
  fn invalid_jobs_env_is_ignored() {
    temp_env::with_var(ENV_JOBS, Some("0"), || {
      assert_eq!(ExecuteConfig::from_env().parallelism, DEFAULT_PARALLELISM);
    });
    temp_env::with_var(ENV_JOBS, Some("many"), || {
      assert_eq!(ExecuteConfig::from_env().parallelism, DEFAULT_PARALLELISM);
    });
  }

  #[test]
  fn failed_outcome_keeps_nominal_path() {
    let outcome = TaskOutcome::Failed {
      nominal: Some(PathBuf::from("/obj/a.o")),
      message: "boom".to_string(),
    };
    assert_eq!(outcome.status(), TaskStatus::Failed);
    assert_eq!(outcome.path(), Some(Path::new("/obj/a.o")));
  }

  #[test]
  fn join_report_counts() {
    let report = JoinReport {
      completed: 2,
      failed: vec![TaskFailure {
        label: "link app".to_string(),
        message: "exit 1".to_string(),
      }],
    };
    assert!(!report.is_success());
    assert_eq!(report.total(), 3);
    assert!(JoinReport::default().is_success());
  }

  #[test]
  fn cmd_failed_display() {
    let err = ExecuteError::CmdFailed {
      cmd: "c++ -c a.cpp".to_string(),
      code: Some(1),
    };
    assert_eq!(err.to_string(), "command failed with exit code Some(1): c++ -c a.cpp");
  }
}
