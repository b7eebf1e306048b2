//! Project manifest.
//!
//! A `cforge.json` file describes what to build: toolchain additions, link
//! targets with their sources and libraries, and commands to run against the
//! finished artifacts.
//!
//! ```json
//! {
//!   "toolchain": { "flags": ["-O2"], "defines": { "USE_ZLIB": "1" } },
//!   "targets": [
//!     {
//!       "name": "core",
//!       "kind": "shared_library",
//!       "output": "build/lib/libcore.so",
//!       "sources": { "dirs": ["src/core"] }
//!     },
//!     {
//!       "name": "app",
//!       "kind": "executable",
//!       "output": "build/bin/app",
//!       "sources": { "dirs": ["src/app"], "extension": "cpp", "flags": ["-DAPP"] },
//!       "objects": ["runtime"],
//!       "link": ["core"],
//!       "libraries": [{ "linker": { "name": "pthread", "os": "linux" } }, { "prebuilt": "z" }],
//!       "run": [["--self-test"]]
//!     }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::library::{Library, LibraryResolver};
use crate::platform::{Os, PlatformError};
use crate::target::TargetKind;
use crate::toolchain::Toolchain;
use crate::util::path::resolve_against;

#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to read manifest {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse manifest {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("target '{name}' is defined more than once")]
  DuplicateTarget { name: String },

  #[error("target '{target}' links '{name}', which is not defined before it")]
  UnknownTarget { target: String, name: String },

  #[error("invalid platform in manifest: {0}")]
  Platform(#[from] PlatformError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
  #[serde(default)]
  pub toolchain: ToolchainSpec,
  #[serde(default)]
  pub targets: Vec<TargetSpec>,
}

/// Additions to the default toolchain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolchainSpec {
  #[serde(default)]
  pub cxx: Option<PathBuf>,
  #[serde(default)]
  pub cc: Option<PathBuf>,
  #[serde(default)]
  pub flags: Vec<String>,
  #[serde(default)]
  pub defines: BTreeMap<String, Option<String>>,
}

impl ToolchainSpec {
  /// Apply these additions to `toolchain`. Relative compiler paths containing a
  /// separator are taken relative to `base_dir`; bare names are looked up on `PATH`.
  pub fn apply(&self, mut toolchain: Toolchain, base_dir: &Path) -> Toolchain {
    if let Some(cxx) = &self.cxx {
      toolchain = toolchain.with_cxx(program_path(base_dir, cxx));
    }
    if let Some(cc) = &self.cc {
      toolchain = toolchain.with_cc(program_path(base_dir, cc));
    }
    toolchain = toolchain.with_flags(self.flags.iter().cloned());
    for (name, value) in &self.defines {
      toolchain = toolchain.with_define(name, value.as_deref());
    }
    toolchain
  }
}

fn program_path(base_dir: &Path, program: &Path) -> PathBuf {
  if program.components().count() > 1 {
    resolve_against(base_dir, program)
  } else {
    program.to_path_buf()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSpec {
  pub name: String,
  pub kind: TargetKind,
  pub output: PathBuf,
  #[serde(default)]
  pub sources: SourceSpec,
  /// Prebuilt objects, looked up with the library resolver.
  #[serde(default)]
  pub objects: Vec<String>,
  /// Earlier targets whose artifacts are linked into this one.
  #[serde(default)]
  pub link: Vec<String>,
  #[serde(default)]
  pub libraries: Vec<LibrarySpec>,
  /// Argument lists the finished artifact is executed with.
  #[serde(default)]
  pub run: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
  #[serde(default)]
  pub dirs: Vec<PathBuf>,
  #[serde(default)]
  pub files: Vec<PathBuf>,
  #[serde(default = "default_extension")]
  pub extension: String,
  /// Extra compile flags for this target's sources.
  #[serde(default)]
  pub flags: Vec<String>,
}

impl Default for SourceSpec {
  fn default() -> Self {
    Self {
      dirs: Vec::new(),
      files: Vec::new(),
      extension: default_extension(),
      flags: Vec::new(),
    }
  }
}

fn default_extension() -> String {
  "cpp".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibrarySpec {
  /// Found by name in the prebuilt library directories.
  Prebuilt(String),
  /// Left to the linker as `-l<name>`, optionally only on one OS.
  Linker {
    name: String,
    #[serde(default)]
    os: Option<String>,
  },
  /// Command printing linker arguments.
  Config(Vec<String>),
}

impl LibrarySpec {
  pub fn to_library(&self, resolver: &LibraryResolver) -> Result<Library, ManifestError> {
    Ok(match self {
      LibrarySpec::Prebuilt(name) => Library::Prebuilt(resolver.find_library(name)),
      LibrarySpec::Linker { name, os } => Library::Linker {
        name: name.clone(),
        os: os.as_deref().map(Os::from_host_id).transpose()?,
      },
      LibrarySpec::Config(command) => Library::Config {
        command: command.clone(),
      },
    })
  }
}

impl Manifest {
  /// Read, parse and validate a manifest file.
  pub fn load(path: &Path) -> Result<Self, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let manifest: Manifest = serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    manifest.validate()?;
    Ok(manifest)
  }

  /// Check target names are unique, `link` only names earlier targets and
  /// every library OS is recognized.
  pub fn validate(&self) -> Result<(), ManifestError> {
    let mut seen = HashSet::new();
    for target in &self.targets {
      for name in &target.link {
        if !seen.contains(name.as_str()) {
          return Err(ManifestError::UnknownTarget {
            target: target.name.clone(),
            name: name.clone(),
          });
        }
      }
      for library in &target.libraries {
        if let LibrarySpec::Linker { os: Some(os), .. } = library {
          Os::from_host_id(os)?;
        }
      }
      if !seen.insert(target.name.as_str()) {
        return Err(ManifestError::DuplicateTarget {
          name: target.name.clone(),
        });
      }
    }
    Ok(())
  }
}
