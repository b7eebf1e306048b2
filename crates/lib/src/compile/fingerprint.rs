//! Identity of a compile request.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::util::hash::{HashError, Hashable};
use crate::util::path::absolute;

/// Absolute source path plus the ordered extra flags.
///
/// Equal fingerprints always name the same object file, so identical requests
/// share an output location even across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Fingerprint {
  pub source: PathBuf,
  pub flags: Vec<String>,
}

impl Hashable for Fingerprint {}

impl Fingerprint {
  pub fn new(source: &Path, flags: &[String]) -> Self {
    Self {
      source: absolute(source),
      flags: flags.to_vec(),
    }
  }

  /// File name of the object this request compiles to.
  pub fn object_name(&self) -> Result<String, HashError> {
    Ok(format!("{}.o", self.compute_hash()?))
  }
}
