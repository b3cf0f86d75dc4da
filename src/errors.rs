// src/errors.rs

use thiserror::Error;

/// User-facing failures that abort resolution of the menu for the current run.
///
/// Command failures are not represented here: a non-zero exit code is returned as data.
#[derive(Error, Debug)]
pub enum MenuError {
    /// A configuration source is missing, unreachable or malformed.
    #[error("{path}: {message}")]
    Config { path: String, message: String },
    /// Source bytes could not be decoded with the configured encoding nor with UTF-8.
    #[error("Failed to decode with {encoding}: {path}")]
    Encoding { encoding: String, path: String },
    /// No configuration source could be determined at all.
    #[error("{0}")]
    Setting(String),
}

impl MenuError {
    pub fn config(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// The error class name shown to operators, e.g. `ConfigError`.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Config { .. } => "ConfigError",
            Self::Encoding { .. } => "EncodingError",
            Self::Setting(_) => "SettingError",
        }
    }
}
