//! Host platform detection.
//!
//! The set of recognized platforms is closed: anything outside it is a fatal
//! configuration error, since compile macros and link flags depend on the OS tag.

pub mod os;

use thiserror::Error;
use tracing::debug;

pub use os::Os;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
  #[error("unrecognized platform: {0}")]
  Unrecognized(String),
}

/// Detect the host OS, failing on platforms outside the supported set.
pub fn detect() -> Result<Os, PlatformError> {
  let os = Os::current()?;
  debug!(os = %os, shared_lib_ext = os.shared_lib_ext(), "detected platform");
  Ok(os)
}
