//! # easy-menu
//!
//! Builds a hierarchical menu of shell commands from a declarative YAML document and runs the
//! selected commands with per-step working directory, environment overlay and advisory locking.
//!
//! - **`models`**: the read-only menu tree (`Menu`, `Command`, `CommandLine`, `Meta`).
//! - **`core`**: configuration loading, entity parsing, settings and the command executor.
//! - **`system`**: process spawning and the cross-process lock registry.
//! - **`cli`**: argument parsing and the interactive front-end.

include!(concat!(env!("OUT_DIR"), "/translations.rs"));

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Shared flag tripped by the Ctrl-C handler and polled while a child process runs.
pub type CancellationToken = Arc<AtomicBool>;

pub mod cli;
pub mod constants;
pub mod core;
pub mod errors;
pub mod models;
pub mod system;
