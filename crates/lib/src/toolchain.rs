//! Compiler toolchain configuration.
//!
//! A `Toolchain` names the compiler binaries and carries the base flag set that
//! every compile and link invocation starts with.

use std::path::{Path, PathBuf};

use crate::consts::{APP_NAME, ENV_CC, ENV_CXX};
use crate::layout::Layout;
use crate::platform::Os;

const WARNING_FLAGS: &[&str] = &[
  "-Wall",
  "-Werror",
  "-pedantic",
  "-Wno-nested-anon-types",
  "-Wno-extended-offsetof",
  "-Wno-gnu-anonymous-struct",
  "-Wno-variadic-macros",
  "-Wno-gnu-zero-variadic-macro-arguments",
  "-Wno-error=unused-command-line-argument",
  "-Wno-override-module",
];

const FEATURE_FLAGS: &[&str] = &[
  "-fno-omit-frame-pointer",
  "-fno-rtti",
  "-fno-exceptions",
  "-fvisibility-inlines-hidden",
  "-std=gnu++11",
];

const FIXED_DEFINES: &[&str] = &["__STDC_LIMIT_MACROS", "__STDC_CONSTANT_MACROS", "NDEBUG"];

const OUTPUT_FLAGS: &[&str] = &["-fPIC", "-fpie", "-g3", "-m64"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
  pub cc: PathBuf,
  pub cxx: PathBuf,
  pub os: Os,
  base_flags: Vec<String>,
}

impl Toolchain {
  /// Default toolchain for a project layout on `os`.
  ///
  /// Compilers come from `CFORGE_CXX`/`CFORGE_CC`, then the prebuilt
  /// `third_party/bin/clang++`/`clang`, then the system `c++`/`cc`.
  pub fn new(layout: &Layout, os: Os) -> Self {
    let cxx = pick_compiler(ENV_CXX, &layout.bin_dir.join("clang++"), "c++");
    let cc = pick_compiler(ENV_CC, &layout.bin_dir.join("clang"), "cc");

    let prefix = APP_NAME.to_uppercase();
    let mut base_flags: Vec<String> = WARNING_FLAGS.iter().chain(FEATURE_FLAGS).map(|f| f.to_string()).collect();
    base_flags.push(format!("-D{}_DIR=\"{}\"", prefix, layout.root.display()));
    base_flags.push(format!("-D{}_OS=\"{}\"", prefix, os.as_str()));
    base_flags.extend(FIXED_DEFINES.iter().map(|d| format!("-D{}", d)));
    base_flags.push("-isystem".to_string());
    base_flags.push(layout.include_dir.display().to_string());
    base_flags.push(format!("-I{}", layout.root.display()));
    base_flags.extend(OUTPUT_FLAGS.iter().map(|f| f.to_string()));

    Self {
      cc,
      cxx,
      os,
      base_flags,
    }
  }

  pub fn with_cxx(mut self, cxx: impl AsRef<Path>) -> Self {
    self.cxx = cxx.as_ref().to_path_buf();
    self
  }

  pub fn with_cc(mut self, cc: impl AsRef<Path>) -> Self {
    self.cc = cc.as_ref().to_path_buf();
    self
  }

  /// Append flags to the base flag set.
  pub fn with_flags<I, S>(mut self, flags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.base_flags.extend(flags.into_iter().map(Into::into));
    self
  }

  /// Append a preprocessor definition, `-DNAME` or `-DNAME=value`.
  pub fn with_define(mut self, name: &str, value: Option<&str>) -> Self {
    self.base_flags.push(match value {
      Some(value) => format!("-D{}={}", name, value),
      None => format!("-D{}", name),
    });
    self
  }

  pub fn base_flags(&self) -> &[String] {
    &self.base_flags
  }

  /// Standard library selection, required on macOS only.
  pub fn stdlib_flags(&self) -> &'static [&'static str] {
    match self.os {
      Os::MacOs => &["-stdlib=libc++"],
      Os::Linux | Os::Windows => &[],
    }
  }

  /// Full argument list compiling `source` into `object`.
  pub fn compile_args(&self, source: &Path, object: &Path, extra_flags: &[String]) -> Vec<String> {
    let mut args: Vec<String> = self.stdlib_flags().iter().map(|f| f.to_string()).collect();
    args.extend(self.base_flags.iter().cloned());
    args.extend(extra_flags.iter().cloned());
    args.extend([
      "-c".to_string(),
      source.display().to_string(),
      "-o".to_string(),
      object.display().to_string(),
    ]);
    args
  }
}

fn pick_compiler(var: &str, prebuilt: &Path, fallback: &str) -> PathBuf {
  if let Some(value) = std::env::var_os(var).filter(|v| !v.is_empty()) {
    return PathBuf::from(value);
  }
  if prebuilt.is_file() {
    return prebuilt.to_path_buf();
  }
  PathBuf::from(fallback)
}

#[cfg(test)]
#[cfg(not(windows))]
mod tests {
  use super::*;
  use serial_test::serial;

  fn toolchain(os: Os) -> Toolchain {
    temp_env::with_vars([(ENV_CXX, None::<&str>), (ENV_CC, None::<&str>)], || {
      Toolchain::new(&Layout::from_root("/work/project"), os)
    })
  }

  #[test]
  #[serial]
  fn env_overrides_compiler() {
    temp_env::with_vars([(ENV_CXX, Some("/opt/llvm/bin/clang++")), (ENV_CC, None::<&str>)], || {
      let tc = Toolchain::new(&Layout::from_root("/work/project"), Os::Linux);
      assert_eq!(tc.cxx, PathBuf::from("/opt/llvm/bin/clang++"));
      assert_eq!(tc.cc, PathBuf::from("cc"));
    });
  }

  #[test]
  #[serial]
  fn prebuilt_compiler_is_preferred_over_system() {
    let temp = tempfile::tempdir().unwrap();
    let bin = temp.path().join("third_party/bin");
    std::fs::create_dir_all(&bin).unwrap();
    std::fs::write(bin.join("clang++"), "").unwrap();

    temp_env::with_vars([(ENV_CXX, None::<&str>), (ENV_CC, None::<&str>)], || {
      let tc = Toolchain::new(&Layout::from_root(temp.path()), Os::Linux);
      assert_eq!(tc.cxx, bin.join("clang++"));
      assert_eq!(tc.cc, PathBuf::from("cc"));
    });
  }

  #[test]
  #[serial]
  fn base_flags_carry_project_macros() {
    let tc = toolchain(Os::Linux);
    let flags = tc.base_flags();
    assert!(flags.contains(&"-DCFORGE_DIR=\"/work/project\"".to_string()));
    assert!(flags.contains(&"-DCFORGE_OS=\"linux\"".to_string()));
    assert!(flags.contains(&"-I/work/project".to_string()));
    let isystem = flags.iter().position(|f| f == "-isystem").unwrap();
    assert_eq!(flags[isystem + 1], "/work/project/third_party/include");
  }

  #[test]
  #[serial]
  fn compile_args_end_with_source_and_object() {
    let tc = toolchain(Os::Linux).with_define("USE_FOO", Some("1"));
    let args = tc.compile_args(Path::new("/src/a.cpp"), Path::new("/obj/a.o"), &["-O2".to_string()]);
    let tail = &args[args.len() - 5..];
    assert_eq!(tail, ["-O2", "-c", "/src/a.cpp", "-o", "/obj/a.o"]);
    assert!(args.contains(&"-DUSE_FOO=1".to_string()));
    assert!(!args.contains(&"-stdlib=libc++".to_string()));
  }

  #[test]
  #[serial]
  fn mac_compiles_select_libcxx_first() {
    let tc = toolchain(Os::MacOs);
    let args = tc.compile_args(Path::new("/src/a.cpp"), Path::new("/obj/a.o"), &[]);
    assert_eq!(args[0], "-stdlib=libc++");
  }
}
