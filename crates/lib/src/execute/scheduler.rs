//! Future/task scheduler.
//!
//! `Scheduler::submit` hands a unit of work to the runtime and immediately
//! returns a [`Handle`] to its eventual outcome. Two backends sit behind the
//! same API:
//!
//! - **Pooled**: tasks are spawned on a multi-threaded tokio runtime and at most
//!   `parallelism` of them run at once, gated by a semaphore.
//! - **Inline**: `submit` drives the task to completion before returning, so
//!   every handle it hands out is already finished.
//!
//! A task waits for its input [`LazyPath`]s before it takes a worker slot, so a
//! task blocked on its dependencies never starves those dependencies of workers.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::runtime::{Builder, Runtime};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::execute::types::{
  ExecuteConfig, ExecuteError, ExecutionMode, FailurePolicy, JoinReport, TaskFailure, TaskOutcome, TaskStatus,
};
use crate::lazy_path::LazyPath;
use crate::util::lock;

/// A unit of work to submit: a label for logs, the path it will produce and
/// the paths it needs first.
#[derive(Debug, Clone)]
pub struct Task {
  label: String,
  output: Option<PathBuf>,
  inputs: Vec<LazyPath>,
}

impl Task {
  pub fn new(label: impl Into<String>) -> Self {
    Self {
      label: label.into(),
      output: None,
      inputs: Vec::new(),
    }
  }

  /// The path this task produces. Failed tasks still report it as their nominal output.
  pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
    self.output = Some(path.into());
    self
  }

  /// Paths resolved before the work runs, handed to the work in the same order.
  pub fn inputs(mut self, inputs: impl IntoIterator<Item = LazyPath>) -> Self {
    self.inputs.extend(inputs);
    self
  }
}

#[derive(Debug, Clone)]
enum TaskState {
  Pending,
  Running,
  Finished(TaskOutcome),
}

impl TaskState {
  fn outcome(&self) -> Option<&TaskOutcome> {
    match self {
      TaskState::Finished(outcome) => Some(outcome),
      TaskState::Pending | TaskState::Running => None,
    }
  }
}

struct TaskCell {
  label: String,
  policy: FailurePolicy,
  state: watch::Sender<TaskState>,
}

impl TaskCell {
  fn set_running(&self) {
    self.state.send_replace(TaskState::Running);
  }

  /// Record the outcome. The first outcome wins; later calls are ignored.
  fn finish(&self, outcome: TaskOutcome) {
    self.state.send_if_modified(|state| {
      if state.outcome().is_some() {
        return false;
      }
      *state = TaskState::Finished(outcome);
      true
    });
  }
}

/// Fails the task if its future is dropped or panics before recording an outcome.
struct FinishGuard {
  cell: Arc<TaskCell>,
  nominal: Option<PathBuf>,
}

impl Drop for FinishGuard {
  fn drop(&mut self) {
    self.cell.finish(TaskOutcome::Failed {
      nominal: self.nominal.take(),
      message: "task abandoned before finishing".to_string(),
    });
  }
}

/// Accessor for the outcome of a submitted task.
///
/// Cloning a handle is cheap; all clones observe the same task. The outcome is
/// computed once and every `resolve` returns that same value.
#[derive(Clone)]
pub struct Handle {
  cell: Arc<TaskCell>,
  runtime: tokio::runtime::Handle,
}

impl Handle {
  pub fn label(&self) -> &str {
    &self.cell.label
  }

  pub fn policy(&self) -> FailurePolicy {
    self.cell.policy
  }

  pub fn status(&self) -> TaskStatus {
    match &*self.cell.state.borrow() {
      TaskState::Pending => TaskStatus::Pending,
      TaskState::Running => TaskStatus::Running,
      TaskState::Finished(outcome) => outcome.status(),
    }
  }

  /// The outcome, if the task has finished. Never blocks.
  pub fn outcome(&self) -> Option<TaskOutcome> {
    self.cell.state.borrow().outcome().cloned()
  }

  /// Wait for the task to finish and return its outcome.
  pub async fn resolve_async(&self) -> TaskOutcome {
    let mut rx = self.cell.state.subscribe();
    let outcome = rx
      .wait_for(|state| state.outcome().is_some())
      .await
      .ok()
      .and_then(|state| state.outcome().cloned());
    outcome.unwrap_or_else(|| TaskOutcome::Failed {
      nominal: None,
      message: "task state dropped".to_string(),
    })
  }

  /// Block the calling thread until the task finishes and return its outcome.
  ///
  /// A finished task's outcome is returned from anywhere. Waiting on an
  /// unfinished one from inside an async runtime is refused with
  /// [`ExecuteError::BlockingInRuntime`]; work running on the scheduler declares
  /// its dependencies as [`Task::inputs`] or uses [`Handle::resolve_async`].
  pub fn resolve(&self) -> Result<TaskOutcome, ExecuteError> {
    if let Some(outcome) = self.outcome() {
      return Ok(outcome);
    }
    ensure_blocking_allowed(self.label())?;
    Ok(self.runtime.block_on(self.resolve_async()))
  }
}

impl fmt::Debug for Handle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Handle")
      .field("label", &self.cell.label)
      .field("status", &self.status())
      .finish()
  }
}

struct Inner {
  runtime: Runtime,
  mode: ExecutionMode,
  policy: FailurePolicy,
  parallelism: usize,
  permits: Arc<Semaphore>,
  running: Mutex<Vec<(String, JoinHandle<()>)>>,
  submitted: Mutex<Vec<Handle>>,
}

/// Submits work and tracks every task until the final barrier.
///
/// Cloning shares the same pool and task list.
#[derive(Clone)]
pub struct Scheduler {
  inner: Arc<Inner>,
}

impl Scheduler {
  /// Create a scheduler.
  ///
  /// If a pooled runtime is requested but cannot be started, the scheduler
  /// falls back to inline execution with a warning.
  pub fn new(config: &ExecuteConfig) -> Result<Self, ExecuteError> {
    let (runtime, mode) = match config.mode {
      ExecutionMode::Pooled => match pooled_runtime() {
        Ok(runtime) => (runtime, ExecutionMode::Pooled),
        Err(e) => {
          warn!(error = %e, "worker pool unavailable, running tasks inline");
          (inline_runtime()?, ExecutionMode::Inline)
        }
      },
      ExecutionMode::Inline => (inline_runtime()?, ExecutionMode::Inline),
    };
    let parallelism = config.parallelism.max(1);

    info!(mode = ?mode, parallelism, policy = ?config.policy, "scheduler ready");

    Ok(Self {
      inner: Arc::new(Inner {
        runtime,
        mode,
        policy: config.policy,
        parallelism,
        permits: Arc::new(Semaphore::new(parallelism)),
        running: Mutex::new(Vec::new()),
        submitted: Mutex::new(Vec::new()),
      }),
    })
  }

  /// The backend actually in use, after any fallback.
  pub fn mode(&self) -> ExecutionMode {
    self.inner.mode
  }

  pub fn policy(&self) -> FailurePolicy {
    self.inner.policy
  }

  pub fn parallelism(&self) -> usize {
    self.inner.parallelism
  }

  /// Submit `work` and return a handle to its outcome.
  ///
  /// The task's inputs are resolved first and passed to `work`. In pooled mode
  /// this returns immediately; in inline mode the task has finished by the time
  /// it returns. A `work` error marks the task failed and is logged.
  pub fn submit<F, Fut>(&self, task: Task, work: F) -> Handle
  where
    F: FnOnce(Vec<PathBuf>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), ExecuteError>> + Send + 'static,
  {
    let (state, _) = watch::channel(TaskState::Pending);
    let cell = Arc::new(TaskCell {
      label: task.label,
      policy: self.inner.policy,
      state,
    });
    let handle = Handle {
      cell: cell.clone(),
      runtime: self.inner.runtime.handle().clone(),
    };
    lock(&self.inner.submitted).push(handle.clone());
    debug!(task = %cell.label, inputs = task.inputs.len(), "task submitted");

    let future = run_task(cell, task.output, task.inputs, self.inner.permits.clone(), work);
    match self.inner.mode {
      ExecutionMode::Inline => self.inner.runtime.block_on(future),
      ExecutionMode::Pooled => {
        let join = self.inner.runtime.spawn(future);
        lock(&self.inner.running).push((handle.label().to_string(), join));
      }
    }

    handle
  }

  /// Run a future to completion on the scheduler's runtime.
  ///
  /// Refused with [`ExecuteError::BlockingInRuntime`] inside an async runtime.
  pub fn block_on<F: Future>(&self, future: F) -> Result<F::Output, ExecuteError> {
    ensure_blocking_allowed("block_on")?;
    Ok(self.inner.runtime.block_on(future))
  }

  /// Block until no spawned task is still running.
  ///
  /// Tasks spawned while waiting are waited for too.
  pub fn wait_idle(&self) -> Result<(), ExecuteError> {
    ensure_blocking_allowed("wait_idle")?;
    loop {
      let running = std::mem::take(&mut *lock(&self.inner.running));
      if running.is_empty() {
        return Ok(());
      }
      self.inner.runtime.block_on(async {
        for (label, join) in running {
          if let Err(e) = join.await {
            error!(task = %label, error = %e, "task panicked");
          }
        }
      });
    }
  }

  /// Wait until every submitted task has finished.
  ///
  /// Under `BestEffort` failures are logged and reported in the returned
  /// [`JoinReport`]. Under `Strict` the first failure is returned as an error.
  pub fn join_all(&self) -> Result<JoinReport, ExecuteError> {
    self.wait_idle()?;

    let mut report = JoinReport::default();
    for handle in lock(&self.inner.submitted).iter() {
      match handle.outcome() {
        Some(TaskOutcome::Completed { .. }) => report.completed += 1,
        Some(TaskOutcome::Failed { message, .. }) => report.failed.push(TaskFailure {
          label: handle.label().to_string(),
          message,
        }),
        None => report.failed.push(TaskFailure {
          label: handle.label().to_string(),
          message: "task never finished".to_string(),
        }),
      }
    }

    info!(
      completed = report.completed,
      failed = report.failed.len(),
      "all tasks finished"
    );

    if self.inner.policy == FailurePolicy::Strict
      && let Some(first) = report.failed.first()
    {
      return Err(ExecuteError::TaskFailed {
        label: first.label.clone(),
        message: first.message.clone(),
      });
    }

    if !report.is_success() {
      warn!(failed = report.failed.len(), "continuing past failed tasks");
    }

    Ok(report)
  }
}

fn ensure_blocking_allowed(label: &str) -> Result<(), ExecuteError> {
  if tokio::runtime::Handle::try_current().is_ok() {
    return Err(ExecuteError::BlockingInRuntime {
      label: label.to_string(),
    });
  }
  Ok(())
}

fn pooled_runtime() -> std::io::Result<Runtime> {
  Builder::new_multi_thread()
    .enable_all()
    .thread_name("cforge-worker")
    .build()
}

fn inline_runtime() -> Result<Runtime, ExecuteError> {
  Builder::new_current_thread()
    .enable_all()
    .build()
    .map_err(ExecuteError::RuntimeUnavailable)
}

async fn run_task<F, Fut>(
  cell: Arc<TaskCell>,
  output: Option<PathBuf>,
  inputs: Vec<LazyPath>,
  permits: Arc<Semaphore>,
  work: F,
) where
  F: FnOnce(Vec<PathBuf>) -> Fut,
  Fut: Future<Output = Result<(), ExecuteError>>,
{
  let _guard = FinishGuard {
    cell: cell.clone(),
    nominal: output.clone(),
  };

  let mut resolved = Vec::with_capacity(inputs.len());
  for input in &inputs {
    match input.resolve_async().await {
      Ok(path) => resolved.push(path),
      Err(e) => {
        warn!(task = %cell.label, error = %e, "input unavailable, task not run");
        cell.finish(TaskOutcome::Failed {
          nominal: output,
          message: format!("input unavailable: {}", e),
        });
        return;
      }
    }
  }

  let Ok(_permit) = permits.acquire_owned().await else {
    cell.finish(TaskOutcome::Failed {
      nominal: output,
      message: "worker pool closed".to_string(),
    });
    return;
  };

  cell.set_running();
  debug!(task = %cell.label, "task running");

  let outcome = match work(resolved).await {
    Ok(()) => TaskOutcome::Completed { output },
    Err(e) => {
      error!(task = %cell.label, error = %e, "task failed");
      TaskOutcome::Failed {
        nominal: output,
        message: e.to_string(),
      }
    }
  };
  cell.finish(outcome);
}
