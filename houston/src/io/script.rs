//! Run arbitrary script text through a shell or interpreter.
//!
//! The script is materialized as a temporary file, launched with the shell's
//! invocation convention, and its output is drained concurrently (optionally
//! echoed live). The temporary file is removed on every exit path.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{Context, Result};
use tempfile::TempPath;
use tracing::{debug, instrument};

use crate::io::process::{Echo, run_command};
use crate::io::reporter::Reporter;

/// Invocation conventions for the shells we know how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellProfile {
    /// `sh`, `bash`, `zsh`, ...: `shell <file> <args..>`.
    Posix,
    /// `powershell`, `pwsh`: `shell -File <file> <args..>`.
    PowerShell,
    /// Any other interpreter: `shell <file> <args..>`, no file extension.
    Interpreter,
}

impl ShellProfile {
    /// Select a profile from a shell name or path (`/bin/bash`, `pwsh.exe`, ...).
    pub fn detect(shell: &str) -> Self {
        match shell_name(shell).to_ascii_lowercase().as_str() {
            "sh" | "shell" | "bash" | "zsh" | "dash" | "ksh" | "ash" => Self::Posix,
            "powershell" | "pwsh" => Self::PowerShell,
            _ => Self::Interpreter,
        }
    }

    /// Extension (without dot) for temporary script files.
    pub fn file_extension(self) -> &'static str {
        match self {
            Self::Posix => "sh",
            Self::PowerShell => "ps1",
            Self::Interpreter => "",
        }
    }

    /// Arguments placed between the shell binary and the script path.
    pub fn script_flags(self) -> &'static [&'static str] {
        match self {
            Self::PowerShell => &["-NoProfile", "-File"],
            Self::Posix | Self::Interpreter => &[],
        }
    }
}

/// Final name component of a shell path, without a `.exe` suffix.
pub fn shell_name(shell: &str) -> &str {
    let name = shell.rsplit(['/', '\\']).next().unwrap_or(shell);
    name.strip_suffix(".exe").unwrap_or(name)
}

/// Prepend an interpreter directive unless `content` already starts with one.
pub fn with_interpreter_directive(content: &str, shell: &str) -> String {
    if content.starts_with("#!") {
        content.to_string()
    } else {
        format!("#!/usr/bin/env {}\n{}", shell_name(shell), content)
    }
}

/// Outcome of a script run. A non-zero `exit_code` is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ScriptResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs script text through a fixed shell.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    shell: String,
    profile: ShellProfile,
    echo: Echo,
    reporter: Arc<Reporter>,
}

impl ScriptRunner {
    pub fn new(shell: impl Into<String>, reporter: Arc<Reporter>) -> Self {
        let shell = shell.into();
        Self {
            profile: ShellProfile::detect(&shell),
            shell,
            echo: Echo::ALL,
            reporter,
        }
    }

    /// Configure which streams are echoed live (default: both).
    pub fn with_echo(mut self, echo: Echo) -> Self {
        self.echo = echo;
        self
    }

    /// Write `content` to a temporary script, run it with `args`, and collect its output.
    ///
    /// Fails only if the script cannot be materialized or the shell cannot be
    /// launched.
    #[instrument(skip_all, fields(shell = %self.shell, args = args.len()))]
    pub fn run(&self, content: &str, args: &[&str]) -> Result<ScriptResult> {
        let script = self.write_script(content)?;
        let result = self.launch(&script, args);
        let path = script.to_path_buf();
        if let Err(e) = script.close() {
            self.reporter.warn(format!(
                "Could not delete temporary script file {}: {e}",
                path.display()
            ));
        }
        result
    }

    fn write_script(&self, content: &str) -> Result<TempPath> {
        let extension = self.profile.file_extension();
        let suffix = if extension.is_empty() {
            String::new()
        } else {
            format!(".{extension}")
        };
        let mut file = tempfile::Builder::new()
            .prefix("houston")
            .suffix(&suffix)
            .tempfile()
            .context("create temporary script file")?;
        file.write_all(with_interpreter_directive(content, &self.shell).as_bytes())
            .context("write temporary script file")?;
        file.flush().context("flush temporary script file")?;

        let path = file.into_temp_path();
        mark_executable(&path)?;
        debug!(path = %path.display(), "script written");
        Ok(path)
    }

    fn launch(&self, script: &Path, args: &[&str]) -> Result<ScriptResult> {
        let mut cmd = Command::new(&self.shell);
        cmd.args(self.profile.script_flags()).arg(script).args(args);

        let output = run_command(cmd, Stdio::inherit(), self.echo)
            .with_context(|| format!("run script with {}", self.shell))?;
        Ok(ScriptResult {
            exit_code: output.exit_code(),
            stdout: output.stdout_lossy(),
            stderr: output.stderr_lossy(),
        })
    }
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .permissions();
    permissions.set_mode(permissions.mode() | 0o700);
    fs::set_permissions(path, permissions)
        .with_context(|| format!("chmod {}", path.display()))
}

#[cfg(not(unix))]
fn mark_executable(path: &Path) -> Result<()> {
    fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    Ok(())
}
