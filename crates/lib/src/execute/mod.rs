//! Task execution.
//!
//! This module provides everything needed to run build steps:
//! - a scheduler with pooled and inline backends behind one API
//! - handles to task outcomes, awaited or blocked on
//! - the external command runner used by compile and link tasks
//! - the best-effort and strict failure policies

pub mod command;
pub mod scheduler;
pub mod types;

pub use command::{command_line, run_command};
pub use scheduler::{Handle, Scheduler, Task};
pub use types::{
  ExecuteConfig, ExecuteError, ExecutionMode, FailurePolicy, JoinReport, TaskFailure, TaskOutcome, TaskStatus,
};
