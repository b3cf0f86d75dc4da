// src/constants.rs

/// The configuration file searched for in the work directory and its ancestors.
pub const DEFAULT_CONFIG_FILENAME: &str = "easy-menu.yml";

/// Environment variable overriding [`DEFAULT_CONFIG_FILENAME`].
pub const CONFIG_FILENAME_ENV: &str = "EASY_MENU_CONFIG";

/// Per-user state directory (inside the home directory).
pub const STATE_DIR: &str = ".easy-menu";

/// Subdirectory of [`STATE_DIR`] holding captured `eval` output.
pub const EVAL_CACHE_DIRNAME: &str = "eval";

/// Subdirectory of [`STATE_DIR`] holding lock files.
pub const PID_DIRNAME: &str = "pid";

/// Encoding used when none is configured, and the decoding fallback.
pub const DEFAULT_ENCODING: &str = "utf-8";

/// Menus nested this deep (through includes, evals or plain submenus) are rejected.
pub const MAX_NESTING_DEPTH: u32 = 50;

/// Exit code reported for a command interrupted by the user (128 + SIGINT).
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Reserved keys of the configuration document.
pub const KEYWORD_META: &str = "meta";
pub const KEYWORD_INCLUDE: &str = "include";
pub const KEYWORD_EVAL: &str = "eval";
pub const KEYWORD_CACHE: &str = "cache";
