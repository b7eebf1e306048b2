mod build;
mod info;

pub use build::{BuildArgs, cmd_build};
pub use info::cmd_info;

use std::path::PathBuf;

use anyhow::{Context, Result};

/// The project root: `root` if given, otherwise the current directory.
fn project_root(root: Option<PathBuf>) -> Result<PathBuf> {
  match root {
    Some(root) => Ok(root),
    None => std::env::current_dir().context("Failed to determine current directory"),
  }
}
