//! Crate-wide constants.

pub const APP_NAME: &str = "cforge";

/// Default name of the project manifest, looked up in the project root.
pub const MANIFEST_FILE: &str = "cforge.json";

/// Number of hex characters of a fingerprint hash used in object file names.
pub const OBJ_HASH_PREFIX_LEN: usize = 32;

/// Maximum number of tasks running at once when nothing else is configured.
pub const DEFAULT_PARALLELISM: usize = 32;

pub const ENV_JOBS: &str = "CFORGE_JOBS";
pub const ENV_BUILD_DIR: &str = "CFORGE_BUILD_DIR";
pub const ENV_OBJECT_DIR: &str = "CFORGE_OBJECT_DIR";
pub const ENV_CXX: &str = "CFORGE_CXX";
pub const ENV_CC: &str = "CFORGE_CC";
