//! Library lookup and linker library arguments.
//!
//! [`LibraryResolver::find_library`] locates prebuilt objects and libraries in
//! a fixed set of search directories. Lookups are synchronous and uncached.
//! A name that cannot be found is passed through unchanged, leaving the final
//! say to the linker's own search path.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::execute::{command_line, run_command};
use crate::layout::Layout;
use crate::platform::Os;
use crate::util::path::absolute;

/// Extensions probed, in order: object, bitcode, shared, dynamic shared, static archive.
const EXTENSIONS: &[&str] = &["o", "bc", "so", "dylib", "a"];

const PREFIXES: &[&str] = &["lib", ""];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryResolver {
  search_paths: Vec<PathBuf>,
}

impl LibraryResolver {
  pub fn new(search_paths: Vec<PathBuf>) -> Self {
    Self { search_paths }
  }

  /// Resolver probing the layout's prebuilt library and build directories.
  pub fn from_layout(layout: &Layout) -> Self {
    Self::new(layout.library_search_paths())
  }

  pub fn search_paths(&self) -> &[PathBuf] {
    &self.search_paths
  }

  /// Find a library by name.
  ///
  /// A name that is itself an existing path is returned in absolute form.
  /// Otherwise each search directory is probed for `{prefix}{name}.{ext}` over
  /// every extension and prefix, first match wins. With no match a warning is
  /// logged and the bare name is returned.
  pub fn find_library(&self, name: &str) -> PathBuf {
    let direct = absolute(Path::new(name));
    if direct.exists() {
      return direct;
    }

    for dir in &self.search_paths {
      for ext in EXTENSIONS {
        for prefix in PREFIXES {
          let candidate = dir.join(format!("{}{}.{}", prefix, name, ext));
          if candidate.exists() {
            debug!(library = name, path = %candidate.display(), "found library");
            return candidate;
          }
        }
      }
    }

    warn!(library = name, "cannot find library, leaving it to the linker");
    PathBuf::from(name)
  }
}

/// A library handed to the linker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Library {
  /// A file passed to the linker as is, usually from [`LibraryResolver::find_library`].
  Prebuilt(PathBuf),
  /// A library the linker finds itself (`-l<name>`), optionally only on one OS.
  Linker { name: String, os: Option<Os> },
  /// Linker arguments printed by a configuration tool, e.g. `llvm-config --libs`.
  Config { command: Vec<String> },
}

impl Library {
  /// Linker arguments for this library when linking on `host`.
  ///
  /// A `Config` library runs its command and splits the stdout on whitespace.
  /// If the command fails the library contributes no arguments.
  pub async fn linker_args(&self, host: Os) -> Vec<String> {
    match self {
      Library::Prebuilt(path) => vec![path.display().to_string()],
      Library::Linker { name, os } => {
        if os.is_some_and(|os| os != host) {
          return Vec::new();
        }
        vec![format!("-l{}", name)]
      }
      Library::Config { command } => {
        let Some((program, args)) = command.split_first() else {
          return Vec::new();
        };
        match run_command(Path::new(program), args).await {
          Ok(stdout) => stdout.split_whitespace().map(str::to_string).collect(),
          Err(e) => {
            warn!(command = %command_line(Path::new(program), args), error = %e, "library config command failed");
            Vec::new()
          }
        }
      }
    }
  }
}
