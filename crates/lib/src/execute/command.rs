//! External command execution.
//!
//! Commands are run directly from an argument vector, never through a shell.
//! Arguments reach the program verbatim.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, error, info};

use crate::execute::types::ExecuteError;

/// Render a command line for logs and error messages.
pub fn command_line(program: &Path, args: &[String]) -> String {
  let mut line = program.display().to_string();
  for arg in args {
    line.push(' ');
    line.push_str(arg);
  }
  line
}

/// Run `program` with `args` and wait for it to finish.
///
/// On failure the full command line is logged so an operator can rerun it by hand.
///
/// # Returns
///
/// The stdout of the command on success (trimmed).
pub async fn run_command(program: &Path, args: &[String]) -> Result<String, ExecuteError> {
  let cmd = command_line(program, args);
  info!(program = %program.display(), "running command");
  debug!(cmd = %cmd, "full command line");

  let output = match Command::new(program).args(args).output().await {
    Ok(output) => output,
    Err(source) => {
      error!(cmd = %cmd, error = %source, "command could not be started");
      return Err(ExecuteError::CmdSpawn { cmd, source });
    }
  };

  let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
  let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

  if !output.status.success() {
    error!(cmd = %cmd, code = ?output.status.code(), "command failed");
    if !stderr.is_empty() {
      error!(stderr = %stderr, "command stderr");
    }
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "command stdout");
    }
    return Err(ExecuteError::CmdFailed {
      cmd,
      code: output.status.code(),
    });
  }

  if !stderr.is_empty() {
    debug!(stderr = %stderr, "command stderr");
  }
  if !stdout.is_empty() {
    debug!(stdout = %stdout, "command output");
  }

  Ok(stdout)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::FakeCompiler;
  use std::path::PathBuf;

  fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn command_line_joins_program_and_args() {
    let line = command_line(Path::new("/usr/bin/c++"), &args(&["-c", "a.cpp"]));
    assert_eq!(line, "/usr/bin/c++ -c a.cpp");
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn run_simple_command() {
    let out = run_command(Path::new("/bin/echo"), &args(&["hello", "world"])).await.unwrap();
    assert_eq!(out, "hello world");
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn args_are_not_shell_expanded() {
    let out = run_command(Path::new("/bin/echo"), &args(&["$HOME", "a b"])).await.unwrap();
    assert_eq!(out, "$HOME a b");
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn failing_command_reports_exit_code() {
    let result = run_command(Path::new("/bin/sh"), &args(&["-c", "exit 3"])).await;
    match result {
      Err(ExecuteError::CmdFailed { cmd, code }) => {
        assert_eq!(code, Some(3));
        assert_eq!(cmd, "/bin/sh -c exit 3");
      }
      other => panic!("expected CmdFailed, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn missing_program_is_a_spawn_error() {
    let program = PathBuf::from("/definitely/not/a/compiler");
    let result = run_command(&program, &[]).await;
    assert!(matches!(result, Err(ExecuteError::CmdSpawn { .. })));
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn fake_compiler_writes_output() {
    let temp = tempfile::tempdir().unwrap();
    let fake = FakeCompiler::install(temp.path());
    let out = temp.path().join("a.o");

    run_command(&fake.path, &args(&["-c", "a.cpp", "-o", out.to_str().unwrap()]))
      .await
      .unwrap();

    assert!(out.exists());
    assert_eq!(fake.invocations().len(), 1);
  }
}
