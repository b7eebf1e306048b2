//! Info command implementation.
//!
//! Displays the detected platform, the project layout and the toolchain that a
//! build in this directory would use.

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use cforge_lib::consts::MANIFEST_FILE;
use cforge_lib::execute::ExecuteConfig;
use cforge_lib::layout::Layout;
use cforge_lib::platform;
use cforge_lib::toolchain::Toolchain;

use crate::output::{OutputFormat, print_json, print_stat, print_success};

#[derive(Debug, Serialize)]
struct Info {
  version: &'static str,
  os: String,
  shared_lib_ext: &'static str,
  root: PathBuf,
  manifest: PathBuf,
  build_dir: PathBuf,
  object_dir: PathBuf,
  library_paths: Vec<PathBuf>,
  cxx: PathBuf,
  cc: PathBuf,
  parallelism: usize,
}

pub fn cmd_info(root: Option<PathBuf>, output: OutputFormat) -> Result<()> {
  let root = super::project_root(root)?;
  let os = platform::detect()?;
  let layout = Layout::from_root(&root);
  let toolchain = Toolchain::new(&layout, os);

  let info = Info {
    version: env!("CARGO_PKG_VERSION"),
    os: os.to_string(),
    shared_lib_ext: os.shared_lib_ext(),
    manifest: layout.root.join(MANIFEST_FILE),
    build_dir: layout.build_dir.clone(),
    object_dir: layout.object_dir.clone(),
    library_paths: layout.library_search_paths(),
    root: layout.root.clone(),
    cxx: toolchain.cxx.clone(),
    cc: toolchain.cc.clone(),
    parallelism: ExecuteConfig::from_env().parallelism,
  };

  if output.is_json() {
    return print_json(&info);
  }

  print_success(&format!("cforge v{}", info.version));
  println!();
  print_stat("OS", &info.os);
  print_stat("Shared libraries", &format!(".{}", info.shared_lib_ext));
  print_stat("Root", &info.root.display().to_string());
  print_stat("Manifest", &info.manifest.display().to_string());
  print_stat("Build dir", &info.build_dir.display().to_string());
  print_stat("Object dir", &info.object_dir.display().to_string());
  for dir in &info.library_paths {
    print_stat("Library path", &dir.display().to_string());
  }
  print_stat("C++ compiler", &info.cxx.display().to_string());
  print_stat("C compiler", &info.cc.display().to_string());
  print_stat("Parallelism", &info.parallelism.to_string());

  Ok(())
}
