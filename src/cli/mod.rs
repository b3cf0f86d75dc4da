// src/cli/mod.rs

use crate::core::{
    paths::{self, PathError},
    setting::Setting,
};
use clap::Parser;

pub mod handlers;

/// easy-menu: a hierarchical menu of shell commands, described in YAML.
///
/// Without a configuration argument, `easy-menu.yml` (or the name in `EASY_MENU_CONFIG`) is
/// searched for in the work directory and its parents.
#[derive(Parser, Debug, Default)]
#[command(
    author,
    version,
    about,
    long_about = None,
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
pub struct Cli {
    /// Path or URL of the configuration document.
    pub config: Option<String>,

    /// Directory commands run in unless the configuration says otherwise.
    #[arg(long, short = 'd')]
    pub work_dir: Option<String>,

    /// Encoding of configuration sources and command text (e.g. `shift_jis`).
    #[arg(long = "encode", value_name = "ENCODING")]
    pub encoding: Option<String>,

    /// Ignore cached `eval` output and refresh it.
    #[arg(long)]
    pub clear_cache: bool,

    /// Directory for cached `eval` output. Defaults to `~/.easy-menu/eval`.
    #[arg(long)]
    pub cache_dir: Option<String>,

    /// Directory for lock files. Defaults to `~/.easy-menu/pid`.
    #[arg(long)]
    pub pid_dir: Option<String>,

    /// Print the resolved menu tree and exit.
    #[arg(long)]
    pub print: bool,
}

impl Cli {
    /// Explicit arguments win; everything else is filled by [`Setting::with_defaults`].
    pub fn to_setting(&self) -> Result<Setting, PathError> {
        let mut setting = Setting::new().with_clear_cache(self.clear_cache);
        if let Some(config) = &self.config {
            setting = setting.with_config_path(config.as_str());
        }
        if let Some(work_dir) = &self.work_dir {
            setting = setting.with_work_dir(paths::expand_path_template(work_dir)?);
        }
        if let Some(encoding) = &self.encoding {
            setting = setting.with_encoding(encoding.as_str());
        }
        if let Some(cache_dir) = &self.cache_dir {
            setting = setting.with_cache_dir(cache_dir)?;
        }
        if let Some(pid_dir) = &self.pid_dir {
            setting = setting.with_pid_dir(pid_dir)?;
        }
        setting.with_defaults()
    }
}
