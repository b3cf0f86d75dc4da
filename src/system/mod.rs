//! # System Interaction Layer
//!
//! Boundary between the menu logic and the operating system.
//!
//! ## Modules
//!
//! - **`executor`**: spawns commands through the platform shell, attaches their standard
//!   streams, waits with Ctrl-C awareness and captures output for `eval` sources.
//! - **`lock`**: the advisory PID-file registry used to detect whether a command is already
//!   running in another process, plus the process liveness probe behind it.

pub mod executor;
pub mod lock;
