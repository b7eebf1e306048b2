//! Test utilities for cforge-lib.
//!
//! Provides a fake compiler driver so tests can exercise compile and link tasks
//! without a real toolchain. The fake records every invocation, one line per
//! call, and writes a small executable script to the `-o` path.

use std::fs;
use std::path::{Path, PathBuf};

use crate::layout::Layout;
use crate::platform::Os;
use crate::toolchain::Toolchain;

/// A fake compiler installed into a temporary directory.
pub struct FakeCompiler {
  pub path: PathBuf,
  pub log: PathBuf,
}

impl FakeCompiler {
  /// Install the fake compiler into `dir`.
  ///
  /// Any invocation whose arguments mention `broken` exits with status 1
  /// without producing output, and one mentioning `slow` takes a second.
  #[cfg(unix)]
  pub fn install(dir: &Path) -> Self {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-cxx");
    let log = dir.join("fake-cxx.log");
    let script = format!(
      r#"#!/bin/sh
echo "$@" >> "{log}"
case "$*" in
  *broken*) echo "fake-cxx: error: broken input" >&2; exit 1 ;;
  *slow*) sleep 1 ;;
esac
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then
    shift
    out="$1"
  fi
  shift
done
if [ -n "$out" ]; then
  cat > "$out" <<'ARTIFACT'
#!/bin/sh
echo "artifact $*"
ARTIFACT
  chmod +x "$out"
fi
"#,
      log = log.display()
    );
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    Self { path, log }
  }

  /// All recorded invocations, one entry per call.
  pub fn invocations(&self) -> Vec<String> {
    fs::read_to_string(&self.log)
      .map(|s| s.lines().map(str::to_string).collect())
      .unwrap_or_default()
  }

  /// Invocations that compiled `source`.
  pub fn compiles_of(&self, source: &Path) -> usize {
    let needle = format!("-c {}", source.display());
    self.invocations().iter().filter(|line| line.contains(&needle)).count()
  }

  /// A toolchain for `layout` that drives this fake compiler.
  pub fn toolchain(&self, layout: &Layout, os: Os) -> Toolchain {
    Toolchain::new(layout, os).with_cxx(&self.path).with_cc(&self.path)
  }
}

/// Create a project tree under `root` with empty source files.
pub fn write_sources(root: &Path, names: &[&str]) -> Vec<PathBuf> {
  let src = root.join("src");
  fs::create_dir_all(&src).unwrap();
  names
    .iter()
    .map(|name| {
      let path = src.join(name);
      fs::write(&path, format!("// {}\n", name)).unwrap();
      path
    })
    .collect()
}
