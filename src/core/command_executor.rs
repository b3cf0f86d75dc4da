// src/core/command_executor.rs

use crate::{
    CancellationToken,
    models::{Command, CommandLine},
    system::{
        executor::{self, ExecutionError, StdStreams},
        lock::{LockRegistry, ProcessProbe},
    },
};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::atomic::Ordering;

/// Runs the command lines of a [`Command`] in order and tracks locked ones in a [`LockRegistry`].
#[derive(Debug)]
pub struct CommandExecutor {
    streams: StdStreams,
    locks: LockRegistry,
    cancellation_token: CancellationToken,
}

impl CommandExecutor {
    /// Children inherit this process's standard streams.
    pub fn new(pid_dir: impl Into<PathBuf>, cancellation_token: CancellationToken) -> Self {
        Self {
            streams: StdStreams::inherit(),
            locks: LockRegistry::new(pid_dir),
            cancellation_token,
        }
    }

    pub fn with_streams(mut self, streams: StdStreams) -> Self {
        self.streams = streams;
        self
    }

    pub fn with_probe(mut self, probe: Box<dyn ProcessProbe>) -> Self {
        self.locks = LockRegistry::with_probe(self.locks.dir().to_path_buf(), probe);
        self
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    /// Runs every command line in sequence and returns the first non-zero exit code, or 0.
    ///
    /// Lines after a failing one are not started. A line marked `lock` records its child's PID
    /// before the child is waited on.
    ///
    /// # Errors
    /// Only when a process cannot be started or waited on, or a lock directory cannot be created.
    pub fn execute(&self, command: &Command) -> Result<i32, ExecutionError> {
        for command_line in &command.command_lines {
            let code = self.execute_line(command_line)?;
            if code != 0 {
                return Ok(code);
            }
        }
        Ok(0)
    }

    fn execute_line(&self, command_line: &CommandLine) -> Result<i32, ExecutionError> {
        let lock_path = if command_line.meta.lock {
            let path = self
                .locks
                .prepare(command_line)
                .map_err(|e| ExecutionError::Lock {
                    path: self.locks.lock_path(command_line).display().to_string(),
                    source: e,
                })?;
            Some(path)
        } else {
            None
        };

        // Only an interrupt that arrives while this child runs may cancel it.
        self.cancellation_token.store(false, Ordering::SeqCst);
        info!("Starting: {}", command_line.cmd);
        let mut child = executor::spawn_command(
            &command_line.cmd,
            &command_line.encoding,
            command_line.meta.work_dir.as_deref(),
            &command_line.meta.env,
            &self.streams,
        )?;

        if let Some(path) = &lock_path {
            if let Err(e) = self.locks.record(path, child.id()) {
                warn!("Could not write lock file {}: {}", path.display(), e);
            }
        }

        let code = executor::wait_for_exit(&mut child, &command_line.cmd, &self.cancellation_token)?;
        info!("Finished: {} (exit code {})", command_line.cmd, code);
        Ok(code)
    }

    /// True if any locked line of `command` has a live holder.
    pub fn is_running(&self, command: &Command) -> bool {
        command
            .command_lines
            .iter()
            .filter(|line| line.meta.lock)
            .any(|line| self.locks.is_locked(line))
    }
}
