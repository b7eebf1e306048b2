//! Project directory layout.
//!
//! A project has a fixed set of directory roles, all derived from its root:
//!
//! ```text
//! <root>/src                    sources
//! <root>/build                  build outputs (CFORGE_BUILD_DIR)
//! <root>/build/obj              compiled objects (CFORGE_OBJECT_DIR)
//! <root>/generated              generated code
//! <root>/third_party/include    system includes
//! <root>/third_party/bin        prebuilt tools, including the compiler
//! <root>/third_party/lib        prebuilt libraries
//! ```
//!
//! The layout is read-only configuration; cforge only ever creates the
//! parents of the outputs it writes.

use std::path::{Path, PathBuf};

use crate::consts::{ENV_BUILD_DIR, ENV_OBJECT_DIR};
use crate::util::path::absolute;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
  pub root: PathBuf,
  pub source_dir: PathBuf,
  pub build_dir: PathBuf,
  pub object_dir: PathBuf,
  pub gen_dir: PathBuf,
  pub include_dir: PathBuf,
  pub bin_dir: PathBuf,
  pub lib_dir: PathBuf,
}

impl Layout {
  /// Compute the layout of the project rooted at `root`.
  ///
  /// `CFORGE_BUILD_DIR` relocates the build directory and `CFORGE_OBJECT_DIR`
  /// the object directory. Relative overrides are taken relative to the root.
  pub fn from_root(root: impl AsRef<Path>) -> Self {
    let root = absolute(root.as_ref());
    let third_party = root.join("third_party");

    let build_dir = env_dir(ENV_BUILD_DIR, &root).unwrap_or_else(|| root.join("build"));
    let object_dir = env_dir(ENV_OBJECT_DIR, &root).unwrap_or_else(|| build_dir.join("obj"));

    Self {
      source_dir: root.join("src"),
      gen_dir: root.join("generated"),
      include_dir: third_party.join("include"),
      bin_dir: third_party.join("bin"),
      lib_dir: third_party.join("lib"),
      build_dir,
      object_dir,
      root,
    }
  }

  /// Directories probed for prebuilt libraries, in priority order.
  pub fn library_search_paths(&self) -> Vec<PathBuf> {
    vec![self.lib_dir.clone(), self.build_dir.clone()]
  }
}

fn env_dir(var: &str, root: &Path) -> Option<PathBuf> {
  let value = std::env::var_os(var)?;
  if value.is_empty() {
    return None;
  }
  Some(absolute(&root.join(value)))
}
