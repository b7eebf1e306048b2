use std::fmt;

use super::PlatformError;

/// Operating systems cforge knows how to drive a toolchain on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
}

impl Os {
  /// Detect the current operating system at runtime.
  pub fn current() -> Result<Self, PlatformError> {
    Self::from_host_id(std::env::consts::OS)
  }

  /// Map a host identifier to an OS.
  ///
  /// Accepts both Rust's `std::env::consts::OS` values and the traditional
  /// `sys.platform`-style identifiers (`linux2`, `darwin`, `win32`).
  pub fn from_host_id(id: &str) -> Result<Self, PlatformError> {
    match id {
      "linux" | "linux2" => Ok(Self::Linux),
      "darwin" | "macos" | "mac" => Ok(Self::MacOs),
      "win32" | "windows" | "win" => Ok(Self::Windows),
      other => Err(PlatformError::Unrecognized(other.to_string())),
    }
  }

  /// Canonical OS tag, as passed to compiled code.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "mac",
      Self::Windows => "win",
    }
  }

  /// File extension of shared libraries, without the dot.
  pub fn shared_lib_ext(&self) -> &'static str {
    match self {
      Self::Linux => "so",
      Self::MacOs => "dylib",
      Self::Windows => "dll",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
