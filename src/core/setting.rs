// src/core/setting.rs

//! Run-wide settings: where the configuration comes from, where commands run, which encoding
//! the sources use and where the eval cache and lock files live.

use crate::{
    constants::{CONFIG_FILENAME_ENV, DEFAULT_CONFIG_FILENAME, DEFAULT_ENCODING},
    core::{
        loader::{Loader, SourceKind, is_url},
        menu_parser::ParseError,
        paths::{self, PathError},
    },
    errors::MenuError,
    models::{Menu, Meta},
};
use log::debug;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Setting {
    /// Absolute file path or URL of the root document.
    pub config_path: Option<String>,
    pub work_dir: Option<PathBuf>,
    pub encoding: Option<String>,
    pub clear_cache: bool,
    pub cache_dir: Option<PathBuf>,
    pub pid_dir: Option<PathBuf>,
}

/// The configuration file name to search for, honoring `EASY_MENU_CONFIG`.
pub fn config_filename() -> String {
    env::var(CONFIG_FILENAME_ENV)
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_FILENAME.to_string())
}

/// Searches `start` and each of its ancestors for a file called `filename`.
pub fn find_config_upwards(start: &Path, filename: &str) -> Option<PathBuf> {
    start.ancestors().find_map(|dir| {
        let candidate = dir.join(filename);
        debug!("Looking for configuration at {}", candidate.display());
        candidate.is_file().then_some(candidate)
    })
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

impl Setting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the root source. File paths are made absolute; URLs are kept as given.
    pub fn with_config_path(mut self, source: impl Into<String>) -> Self {
        let source = source.into();
        self.config_path = Some(if is_url(&source) {
            source
        } else {
            absolutize(Path::new(&source)).to_string_lossy().into_owned()
        });
        self
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(absolutize(&work_dir.into()));
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_clear_cache(mut self, clear_cache: bool) -> Self {
        self.clear_cache = clear_cache;
        self
    }

    /// `~` and `$VAR` are expanded.
    pub fn with_cache_dir(mut self, cache_dir: &str) -> Result<Self, PathError> {
        self.cache_dir = Some(paths::expand_path_template(cache_dir)?);
        Ok(self)
    }

    /// `~` and `$VAR` are expanded.
    pub fn with_pid_dir(mut self, pid_dir: &str) -> Result<Self, PathError> {
        self.pid_dir = Some(paths::expand_path_template(pid_dir)?);
        Ok(self)
    }

    /// Fills every unset field that has a default.
    ///
    /// Without an explicit config path, the work directory (or the current directory) and its
    /// ancestors are searched for the configuration file. Without an explicit work directory,
    /// the directory holding a file configuration is used.
    pub fn with_defaults(mut self) -> Result<Self, PathError> {
        if self.config_path.is_none() {
            self.config_path = self.lookup_config().map(|p| p.to_string_lossy().into_owned());
        }
        if self.work_dir.is_none() {
            self.work_dir = self
                .config_path
                .as_deref()
                .filter(|source| !is_url(source))
                .and_then(|source| Path::new(source).parent())
                .map(Path::to_path_buf);
        }
        if self.encoding.is_none() {
            self.encoding = Some(DEFAULT_ENCODING.to_string());
        }
        if self.cache_dir.is_none() {
            self.cache_dir = Some(paths::default_eval_cache_dir()?);
        }
        if self.pid_dir.is_none() {
            self.pid_dir = Some(paths::default_pid_dir()?);
        }
        Ok(self)
    }

    /// Searches upwards from the work directory, or from the current directory.
    pub fn lookup_config(&self) -> Option<PathBuf> {
        let start = match &self.work_dir {
            Some(dir) => dir.clone(),
            None => env::current_dir().ok()?,
        };
        find_config_upwards(&start, &config_filename())
    }

    pub fn encoding(&self) -> &str {
        self.encoding.as_deref().unwrap_or(DEFAULT_ENCODING)
    }

    /// Eval cache directory, falling back to `~/.easy-menu/eval`.
    pub fn cache_dir(&self) -> Result<PathBuf, PathError> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::default_eval_cache_dir(),
        }
    }

    /// Lock file directory, falling back to `~/.easy-menu/pid`.
    pub fn pid_dir(&self) -> Result<PathBuf, PathError> {
        match &self.pid_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::default_pid_dir(),
        }
    }

    /// A fresh loader (with an empty per-run cache) configured from these settings.
    pub fn loader(&self) -> Result<Loader, PathError> {
        Ok(
            Loader::new(self.work_dir.clone(), self.encoding(), self.cache_dir()?)
                .with_clear_cache(self.clear_cache),
        )
    }

    /// Loads and parses the root menu.
    ///
    /// # Errors
    /// `MenuError::Setting` when no configuration source is known; otherwise whatever loading
    /// or parsing the tree fails with.
    pub fn load_config(&self) -> Result<Menu, MenuError> {
        let mut loader = self
            .loader()
            .map_err(|e| MenuError::Setting(e.to_string()))?;
        self.load_config_with(&mut loader)
    }

    /// Same as [`Setting::load_config`] but with a caller-provided loader.
    pub fn load_config_with(&self, loader: &mut Loader) -> Result<Menu, MenuError> {
        let source = self
            .config_path
            .as_deref()
            .ok_or_else(|| MenuError::Setting("Not found configuration file.".to_string()))?;

        let data = loader.load(SourceKind::Document, source, None)?;
        let meta = Meta::new(self.work_dir.clone());
        Menu::parse(&data, &meta, loader, 0).map_err(|e| match e {
            ParseError::Source(inner) => *inner,
            other => MenuError::config(source, other.to_string()),
        })
    }
}
