//! Hashing utilities for content-addressed object names.
//!
//! This module provides:
//! - `ObjectHash`: a truncated hex hash used to name compiled objects
//! - `Hashable`: hashing of any serializable value through its JSON form

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::OBJ_HASH_PREFIX_LEN;

pub type HashError = serde_json::Error;

/// A content-addressed hash identifying a unique object.
///
/// The hash is a truncated SHA-256 of the JSON-serialized value. Hashing the
/// serialized form keeps field boundaries intact, so `["-a", "b"]` and `["-ab"]`
/// never collide.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string of `OBJ_HASH_PREFIX_LEN` characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHash(pub String);

impl std::fmt::Display for ObjectHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<ObjectHash, HashError> {
    let serialized = serde_json::to_string(self)?;
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    let full = format!("{:x}", hasher.finalize());
    Ok(ObjectHash(full[..OBJ_HASH_PREFIX_LEN].to_string()))
  }
}
