// src/cli/handlers/mod.rs

// One module per front-end mode.

pub mod browse;
pub mod print;
