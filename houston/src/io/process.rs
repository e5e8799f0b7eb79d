//! Helpers for running child processes and capturing their output.
//!
//! There is no timeout: a child that never exits blocks the caller.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Exit code of the child. Signal terminations map to `128 + signal` on
    /// unix and `-1` elsewhere.
    pub fn exit_code(&self) -> i32 {
        exit_code(self.status)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Which captured streams are also echoed to the terminal while draining.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Echo {
    pub stdout: bool,
    pub stderr: bool,
}

impl Echo {
    pub const NONE: Echo = Echo {
        stdout: false,
        stderr: false,
    };
    pub const ALL: Echo = Echo {
        stdout: true,
        stderr: true,
    };
}

/// Run a command to completion, capturing stdout/stderr without risking pipe deadlocks.
///
/// Both pipes are drained concurrently on their own threads while the child
/// runs; each line is optionally echoed to this process's stdout/stderr as it
/// arrives. Returns once the child has exited and both streams hit EOF.
#[instrument(skip_all, fields(program = ?cmd.get_program(), echo_stdout = echo.stdout, echo_stderr = echo.stderr))]
pub fn run_command(mut cmd: Command, stdin: Stdio, echo: Echo) -> Result<CommandOutput> {
    cmd.stdin(stdin);
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).with_context(|| format!("spawn {:?}", cmd.get_program()));
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle =
        thread::spawn(move || drain_lines(stdout, echo.stdout.then(std::io::stdout)));
    let stderr_handle =
        thread::spawn(move || drain_lines(stderr, echo.stderr.then(std::io::stderr)));

    let status = child.wait().context("wait for command")?;

    let stdout = join_output(stdout_handle).context("join stdout")?;
    let stderr = join_output(stderr_handle).context("join stderr")?;

    debug!(exit_code = ?status.code(), "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
    })
}

fn join_output(handle: thread::JoinHandle<Result<Vec<u8>>>) -> Result<Vec<u8>> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Read a stream line by line until EOF, optionally tee-ing each line to `echo`.
fn drain_lines<R: Read, W: Write>(reader: R, mut echo: Option<W>) -> Result<Vec<u8>> {
    let mut buf_reader = BufReader::new(reader);
    let mut collected = Vec::new();

    loop {
        let mut line = Vec::new();
        let n = buf_reader
            .read_until(b'\n', &mut line)
            .context("read line")?;
        if n == 0 {
            break;
        }

        if let Some(writer) = echo.as_mut() {
            // Flush per line so interleaving with the other stream stays readable.
            if let Err(e) = writer.write_all(&line) {
                warn!(err = %e, "failed to echo output, disabling echo");
                echo = None;
            } else if let Err(e) = writer.flush() {
                warn!(err = %e, "failed to flush echoed output");
            }
        }

        collected.extend_from_slice(&line);
    }

    Ok(collected)
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_lines_collects_and_echoes() {
        let input: &[u8] = b"one\ntwo\nthree";
        let mut echoed = Vec::new();
        let collected = drain_lines(input, Some(&mut echoed)).expect("drain");
        assert_eq!(collected, b"one\ntwo\nthree");
        assert_eq!(echoed, b"one\ntwo\nthree");
    }

    #[test]
    fn drain_lines_without_echo() {
        let input: &[u8] = b"quiet\n";
        let collected = drain_lines(input, None::<Vec<u8>>).expect("drain");
        assert_eq!(collected, b"quiet\n");
    }

    #[cfg(unix)]
    #[test]
    fn captures_both_streams_and_exit_code() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo out; echo err >&2; exit 3");
        let output = run_command(cmd, Stdio::null(), Echo::NONE).expect("run");
        assert_eq!(output.exit_code(), 3);
        assert_eq!(output.stdout_lossy(), "out\n");
        assert_eq!(output.stderr_lossy(), "err\n");
    }

    #[cfg(unix)]
    #[test]
    fn heavy_output_on_both_streams_does_not_deadlock() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(
            "i=0; while [ $i -lt 20000 ]; do echo \"line $i\"; echo \"err $i\" >&2; i=$((i+1)); done",
        );
        let output = run_command(cmd, Stdio::null(), Echo::NONE).expect("run");
        assert_eq!(output.exit_code(), 0);
        assert_eq!(output.stdout_lossy().lines().count(), 20000);
        assert_eq!(output.stderr_lossy().lines().count(), 20000);
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let cmd = Command::new("houston-definitely-missing-binary");
        let err = run_command(cmd, Stdio::null(), Echo::NONE).unwrap_err();
        assert!(format!("{err:#}").contains("spawn"));
    }
}
