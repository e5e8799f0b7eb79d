//! Single command-line execution for context template markers.
//!
//! The [`CmdRunner`] trait decouples template evaluation from real process
//! execution. Tests use scripted runners that return predetermined results.

use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::io::process::{Echo, run_command};
use crate::io::script::ShellProfile;

/// Captured result of one command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// First line of stderr, or an empty string.
    pub fn first_error_line(&self) -> &str {
        self.stderr.lines().next().unwrap_or("").trim()
    }
}

/// Abstraction over command execution backends.
pub trait CmdRunner {
    /// Run `command` with `args` as its positional arguments.
    ///
    /// A non-zero exit code is reported in the result; only a failure to
    /// launch is an error.
    fn run(&self, command: &str, args: &[&str]) -> Result<CommandResult>;
}

/// Runs command lines through a shell's inline-command flag.
#[derive(Debug, Clone)]
pub struct ShellCmdRunner {
    shell: String,
    profile: ShellProfile,
}

impl ShellCmdRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        let shell = shell.into();
        Self {
            profile: ShellProfile::detect(&shell),
            shell,
        }
    }

    fn command(&self, command: &str, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.shell);
        match self.profile {
            // `$0` is the script name; positional args start at `$1`.
            ShellProfile::Posix => {
                cmd.arg("-c").arg(command).arg("houston").args(args);
            }
            ShellProfile::PowerShell => {
                cmd.arg("-NoProfile")
                    .arg("-Command")
                    .arg(format!("& {{ {command} }}"))
                    .args(args);
            }
            ShellProfile::Interpreter => {
                cmd.arg("-c").arg(command).args(args);
            }
        }
        cmd
    }
}

impl CmdRunner for ShellCmdRunner {
    #[instrument(skip_all, fields(shell = %self.shell, command = %command))]
    fn run(&self, command: &str, args: &[&str]) -> Result<CommandResult> {
        let output = run_command(self.command(command, args), Stdio::null(), Echo::NONE)
            .with_context(|| format!("run '{command}' with {}", self.shell))?;
        debug!(exit_code = output.exit_code(), "context command finished");
        Ok(CommandResult {
            exit_code: output.exit_code(),
            stdout: output.stdout_lossy(),
            stderr: output.stderr_lossy(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_error_line_takes_only_the_first_line() {
        let result = CommandResult::failed(1, "boom\nmore detail\n");
        assert_eq!(result.first_error_line(), "boom");
        assert_eq!(CommandResult::ok("x").first_error_line(), "");
    }

    #[test]
    fn posix_invocation_passes_args_positionally() {
        let runner = ShellCmdRunner::new("bash");
        let cmd = runner.command("echo $1", &["a", "b"]);
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["-c", "echo $1", "houston", "a", "b"]);
    }

    #[test]
    fn powershell_invocation_wraps_command_in_script_block() {
        let runner = ShellCmdRunner::new("pwsh");
        let cmd = runner.command("Write-Output $args", &["x"]);
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec!["-NoProfile", "-Command", "& { Write-Output $args }", "x"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn runs_command_with_args() {
        let runner = ShellCmdRunner::new("sh");
        let result = runner.run("echo \"$1-$2\"", &["left", "right"]).expect("run");
        assert_eq!(result, CommandResult::ok("left-right\n"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_reports_exit_code_and_stderr() {
        let runner = ShellCmdRunner::new("sh");
        let result = runner.run("echo nope >&2; exit 4", &[]).expect("run");
        assert_eq!(result.exit_code, 4);
        assert_eq!(result.first_error_line(), "nope");
    }
}
