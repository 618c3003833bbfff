//! Subprocess execution shared by the build and scan steps.

use std::path::Path;
use std::process::Output;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// Errors launching or waiting on a subprocess.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {}s", .timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },
}

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    fn from_output(output: Output) -> Self {
        Self {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    /// All output lines, stdout first.
    pub fn lines(&self) -> Vec<&str> {
        self.stdout.lines().chain(self.stderr.lines()).collect()
    }
}

/// Run `command` through `sh -c` inside `dir`.
///
/// Going through the shell lets configured build commands use pipes,
/// `&&` chains and environment assignments.
pub async fn run_shell(
    command: &str,
    dir: &Path,
    timeout: Option<Duration>,
) -> Result<CommandOutput, CommandError> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).current_dir(dir);
    run(cmd, command, timeout).await
}

/// Run `program` with `args` inside `dir`, without a shell.
pub async fn run_program(
    program: &str,
    args: &[String],
    dir: &Path,
    timeout: Option<Duration>,
) -> Result<CommandOutput, CommandError> {
    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(dir);
    run(cmd, program, timeout).await
}

async fn run(
    mut cmd: Command,
    label: &str,
    timeout: Option<Duration>,
) -> Result<CommandOutput, CommandError> {
    cmd.kill_on_drop(true);
    let spawn_err = |source| CommandError::Spawn {
        program: label.to_string(),
        source,
    };

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, cmd.output())
            .await
            .map_err(|_| CommandError::TimedOut {
                program: label.to_string(),
                timeout: limit,
            })?
            .map_err(spawn_err)?,
        None => cmd.output().await.map_err(spawn_err)?,
    };

    Ok(CommandOutput::from_output(output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shell_runs_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "hi").unwrap();

        let out = run_shell("cat marker.txt && echo oops >&2", dir.path(), None)
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hi");
        assert_eq!(out.lines(), vec!["hi", "oops"]);
    }

    #[tokio::test]
    async fn non_zero_exit_is_captured_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_shell("echo failing; exit 3", dir.path(), None).await.unwrap();
        assert!(!out.success);
        assert_eq!(out.code, Some(3));
    }

    #[tokio::test]
    async fn timeout_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_shell("sleep 5", dir.path(), Some(Duration::from_millis(50))).await;
        assert!(matches!(result, Err(CommandError::TimedOut { .. })));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_program("definitely-not-a-real-binary-xyz", &[], dir.path(), None).await;
        assert!(matches!(result, Err(CommandError::Spawn { .. })));
    }

    #[tokio::test]
    async fn program_receives_args() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_program("echo", &["-n".into(), "a b".into()], dir.path(), None)
            .await
            .unwrap();
        assert_eq!(out.stdout, "a b");
    }
}
