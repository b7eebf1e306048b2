//! Source file discovery.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::util::path::absolute;

/// Collects files sharing one extension from several directories.
///
/// Directories are searched one level deep. Files are deduplicated and kept
/// in sorted order.
#[derive(Debug, Clone, Default)]
pub struct FileFinder {
  extension: String,
  files: BTreeSet<PathBuf>,
}

impl FileFinder {
  pub fn new(extension: impl Into<String>) -> Self {
    Self {
      extension: extension.into().trim_start_matches('.').to_string(),
      files: BTreeSet::new(),
    }
  }

  pub fn add_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
    self.files.insert(absolute(path.as_ref()));
    self
  }

  /// Add every `*.<extension>` file directly inside `dir`.
  ///
  /// A missing directory contributes nothing.
  pub fn search_dir(&mut self, dir: impl AsRef<Path>) -> &mut Self {
    let dir = dir.as_ref();
    if !dir.is_dir() {
      debug!(dir = %dir.display(), "source directory does not exist");
      return self;
    }

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
      let entry = match entry {
        Ok(entry) => entry,
        Err(e) => {
          warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
          continue;
        }
      };
      let matches = entry.file_type().is_file()
        && entry.path().extension().and_then(|e| e.to_str()) == Some(self.extension.as_str());
      if matches {
        self.files.insert(absolute(entry.path()));
      }
    }
    self
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Path> {
    self.files.iter().map(PathBuf::as_path)
  }

  pub fn into_vec(self) -> Vec<PathBuf> {
    self.files.into_iter().collect()
  }
}

/// All `*.<extension>` files directly inside `dir`, sorted.
pub fn find_files(dir: impl AsRef<Path>, extension: &str) -> Vec<PathBuf> {
  let mut finder = FileFinder::new(extension);
  finder.search_dir(dir);
  finder.into_vec()
}
