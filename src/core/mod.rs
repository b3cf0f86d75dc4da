// src/core/mod.rs

pub mod cache;
pub mod command_executor;
pub mod loader;
pub mod menu_parser;
pub mod paths;
pub mod setting;
pub mod text;
