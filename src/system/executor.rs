// src/system/executor.rs

use crate::{CancellationToken, constants::INTERRUPTED_EXIT_CODE, core::text};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command as StdCommand, ExitStatus, Stdio};
use std::sync::atomic::Ordering;
use std::time::Duration;
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command '{command}' could not be started: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to wait for command '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("Could not open stream target '{path}': {source}")]
    Stream {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Could not prepare lock file '{path}': {source}")]
    Lock {
        path: String,
        #[source]
        source: io::Error,
    },
    /// Ctrl-C arrived while no child process was running.
    #[error("Interrupted by user")]
    Interrupted,
}

/// Where one of a child's standard streams is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTarget {
    Inherit,
    Null,
    /// Read from (stdin) or append to (stdout/stderr) a file.
    File(PathBuf),
}

impl StreamTarget {
    fn to_stdio(&self, writable: bool) -> Result<Stdio, ExecutionError> {
        match self {
            Self::Inherit => Ok(Stdio::inherit()),
            Self::Null => Ok(Stdio::null()),
            Self::File(path) => {
                let file = if writable {
                    OpenOptions::new().create(true).append(true).open(path)
                } else {
                    File::open(path)
                };
                file.map(Stdio::from).map_err(|e| ExecutionError::Stream {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        }
    }
}

/// The three standard streams a child process is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdStreams {
    pub stdin: StreamTarget,
    pub stdout: StreamTarget,
    pub stderr: StreamTarget,
}

impl StdStreams {
    pub fn inherit() -> Self {
        Self {
            stdin: StreamTarget::Inherit,
            stdout: StreamTarget::Inherit,
            stderr: StreamTarget::Inherit,
        }
    }

    pub fn null() -> Self {
        Self {
            stdin: StreamTarget::Null,
            stdout: StreamTarget::Null,
            stderr: StreamTarget::Null,
        }
    }
}

impl Default for StdStreams {
    fn default() -> Self {
        Self::inherit()
    }
}

/// Builds a command that runs `command_line` through the platform shell.
/// On Unix the text is encoded with `encoding` before it reaches `/bin/sh`.
fn shell_command(command_line: &str, encoding: &str) -> StdCommand {
    #[cfg(unix)]
    {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let bytes = text::encode_lossy(command_line, encoding);
        let mut command = StdCommand::new("/bin/sh");
        command.arg("-c").arg(OsStr::from_bytes(&bytes));
        command
    }
    #[cfg(not(unix))]
    {
        let _ = encoding;
        let mut command = StdCommand::new("cmd");
        command.arg("/C").arg(command_line);
        command
    }
}

/// Starts `command_line` in the shell with the given working directory, environment overlay and
/// standard streams. The child is returned running; see [`wait_for_exit`].
pub fn spawn_command(
    command_line: &str,
    encoding: &str,
    cwd: Option<&Path>,
    env_vars: &BTreeMap<String, String>,
    streams: &StdStreams,
) -> Result<Child, ExecutionError> {
    let mut command = shell_command(command_line, encoding);
    command
        .envs(env_vars)
        .stdin(streams.stdin.to_stdio(false)?)
        .stdout(streams.stdout.to_stdio(true)?)
        .stderr(streams.stderr.to_stdio(true)?);
    if let Some(dir) = cwd {
        command.current_dir(dunce::simplified(dir));
    }

    command.spawn().map_err(|e| ExecutionError::Spawn {
        command: command_line.to_string(),
        source: e,
    })
}

/// Waits for `child` to finish and returns its exit code.
///
/// The cancellation token is polled while waiting. Once it is tripped the child is killed (if it
/// is still running), the token is reset and [`INTERRUPTED_EXIT_CODE`] is returned.
pub fn wait_for_exit(
    child: &mut Child,
    command_line: &str,
    cancellation_token: &CancellationToken,
) -> Result<i32, ExecutionError> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if cancellation_token.swap(false, Ordering::SeqCst) {
                    return Ok(INTERRUPTED_EXIT_CODE);
                }
                return Ok(exit_code(status));
            }
            Ok(None) => {
                if cancellation_token.swap(false, Ordering::SeqCst) {
                    log::debug!(
                        "Cancellation requested, killing child process (PID: {})...",
                        child.id()
                    );
                    if let Err(e) = child.kill() {
                        log::warn!("Failed to kill child process {}: {}", child.id(), e);
                    }
                    child.wait().ok();
                    return Ok(INTERRUPTED_EXIT_CODE);
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                return Err(ExecutionError::Wait {
                    command: command_line.to_string(),
                    source: e,
                });
            }
        }
    }
}

/// Consumes a pending interrupt. Returns `Err(Interrupted)` if the token was tripped since it
/// was last reset, and re-arms it either way.
pub fn take_interrupt(cancellation_token: &CancellationToken) -> Result<(), ExecutionError> {
    if cancellation_token.swap(false, Ordering::SeqCst) {
        return Err(ExecutionError::Interrupted);
    }
    Ok(())
}

/// Maps a process status to a shell-style exit code (128 + signal for signal deaths).
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Runs `command_line` in the shell and returns everything it wrote to standard output.
/// The exit code and standard error are ignored.
pub fn capture_output(command_line: &str, encoding: &str, cwd: Option<&Path>) -> io::Result<Vec<u8>> {
    let mut command = shell_command(command_line, encoding);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dunce::simplified(dir));
    }
    let output = command.output()?;
    log::debug!(
        "Captured {} bytes from '{}' (status: {})",
        output.stdout.len(),
        command_line,
        output.status
    );
    Ok(output.stdout)
}
