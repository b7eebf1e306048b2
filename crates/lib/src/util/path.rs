//! Path helpers.

use std::path::{Path, PathBuf};

/// Make a path absolute without touching the file system.
///
/// Unlike canonicalization this neither requires the path to exist nor resolves
/// symlinks, so it can be applied to outputs that have not been produced yet.
pub fn absolute(path: &Path) -> PathBuf {
  match std::path::absolute(path) {
    Ok(abs) => dunce::simplified(&abs).to_path_buf(),
    Err(_) => path.to_path_buf(),
  }
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
  if path.is_absolute() {
    path.to_path_buf()
  } else {
    absolute(&base.join(path))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn absolute_keeps_absolute_paths() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("missing.o");
    assert_eq!(absolute(&path), dunce::simplified(&path).to_path_buf());
  }

  #[test]
  fn absolute_joins_relative_paths_with_cwd() {
    let cwd = std::env::current_dir().unwrap();
    let abs = absolute(Path::new("build/foo.o"));
    assert!(abs.is_absolute());
    assert!(abs.starts_with(dunce::simplified(&cwd)));
    assert!(abs.ends_with("build/foo.o"));
  }

  #[test]
  fn resolve_against_uses_base_for_relative_paths() {
    let temp = tempfile::tempdir().unwrap();
    let resolved = resolve_against(temp.path(), Path::new("src/main.cpp"));
    assert_eq!(resolved, absolute(&temp.path().join("src/main.cpp")));
  }
}
