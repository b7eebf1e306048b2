//! Shared utilities.
//!
//! Common utilities used across the crate including hashing, path helpers and test helpers.

pub mod hash;
pub mod path;

#[cfg(test)]
pub mod testutil;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the guard if a previous holder panicked.
///
/// Tables guarded this way are append-only.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
