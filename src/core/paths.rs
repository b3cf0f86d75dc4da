// src/core/paths.rs

use crate::constants::{EVAL_CACHE_DIRNAME, PID_DIRNAME, STATE_DIR};
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

lazy_static! {
    static ref STATE_DIR_PATH: Mutex<Option<PathBuf>> = Mutex::new(None);
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find the home directory.")]
    HomeDirNotFound,
    #[error("Failed to expand path template '{template}': {message}")]
    Expansion { template: String, message: String },
}

/// Returns `~/.easy-menu`. The directory is not created here; writers create what they need.
///
/// Memoized: the home directory lookup only happens once per process.
pub fn get_state_dir() -> Result<PathBuf, PathError> {
    let mut cached = STATE_DIR_PATH
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(path) = &*cached {
        return Ok(path.clone());
    }

    let path = dirs::home_dir()
        .ok_or(PathError::HomeDirNotFound)?
        .join(STATE_DIR);
    *cached = Some(path.clone());
    Ok(path)
}

/// Default directory for captured `eval` output (`~/.easy-menu/eval`).
pub fn default_eval_cache_dir() -> Result<PathBuf, PathError> {
    get_state_dir().map(|dir| dir.join(EVAL_CACHE_DIRNAME))
}

/// Default directory for lock files (`~/.easy-menu/pid`).
pub fn default_pid_dir() -> Result<PathBuf, PathError> {
    get_state_dir().map(|dir| dir.join(PID_DIRNAME))
}

/// Expands `~` and `$VAR`/`${VAR}` in a user-supplied directory.
pub fn expand_path_template(template: &str) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(template).map_err(|e| PathError::Expansion {
        template: template.to_string(),
        message: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Content-addressed entry: the first two characters of `hash` name a subdirectory,
/// the rest name the file.
pub fn hashed_entry_path(base: &Path, hash: &str) -> PathBuf {
    match (hash.get(..2), hash.get(2..)) {
        (Some(prefix), Some(rest)) if !rest.is_empty() => base.join(prefix).join(rest),
        _ => base.join(hash),
    }
}
