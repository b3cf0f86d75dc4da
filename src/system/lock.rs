// src/system/lock.rs

use crate::{core::paths, models::CommandLine};
use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Answers whether a process with a given identifier currently exists on this host.
pub trait ProcessProbe: Debug + Send + Sync {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Probes the OS process table (signal 0 on Unix).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl ProcessProbe for SystemProbe {
    #[cfg(unix)]
    fn is_alive(&self, pid: u32) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        // pid 0 would address our own process group.
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        if raw <= 0 {
            return false;
        }
        match kill(Pid::from_raw(raw), None) {
            Ok(()) => true,
            // Exists, but belongs to someone else.
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    #[cfg(not(unix))]
    fn is_alive(&self, _pid: u32) -> bool {
        true
    }
}

/// Advisory lock files, one per logical operation, recording the PID of the latest holder.
///
/// Layout: `{dir}/{hash[..2]}/{hash[2..]}` where `hash` is [`CommandLine::to_hash_string`].
/// Nothing here prevents a second process from running the same command; callers use
/// [`LockRegistry::is_locked`] to warn or refuse. Stale files are left in place and simply
/// overwritten by the next holder.
#[derive(Debug)]
pub struct LockRegistry {
    dir: PathBuf,
    probe: Box<dyn ProcessProbe>,
}

impl LockRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_probe(dir, Box::new(SystemProbe))
    }

    pub fn with_probe(dir: impl Into<PathBuf>, probe: Box<dyn ProcessProbe>) -> Self {
        Self {
            dir: dir.into(),
            probe,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn lock_path(&self, line: &CommandLine) -> PathBuf {
        paths::hashed_entry_path(&self.dir, &line.to_hash_string())
    }

    /// Returns the lock path for `line`, creating its parent directory if needed.
    pub fn prepare(&self, line: &CommandLine) -> io::Result<PathBuf> {
        let path = self.lock_path(line);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    pub fn record(&self, lock_path: &Path, pid: u32) -> io::Result<()> {
        log::debug!("Recording PID {} at {}", pid, lock_path.display());
        fs::write(lock_path, pid.to_string())
    }

    /// The PID recorded for `line`, if a readable lock file exists.
    pub fn holder(&self, line: &CommandLine) -> Option<u32> {
        let content = fs::read_to_string(self.lock_path(line)).ok()?;
        content.trim().parse().ok()
    }

    /// True when a lock file exists for `line` and the process it names is alive.
    pub fn is_locked(&self, line: &CommandLine) -> bool {
        match self.holder(line) {
            Some(pid) => {
                let alive = self.probe.is_alive(pid);
                log::debug!("Lock holder {} for '{}' alive: {}", pid, line.cmd, alive);
                alive
            }
            None => false,
        }
    }
}
