// src/bin/easy-menu.rs

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use easy_menu::{
    CancellationToken,
    cli::{Cli, handlers},
    constants::INTERRUPTED_EXIT_CODE,
    core::{command_executor::CommandExecutor, setting::Setting},
    errors::MenuError,
    system::executor::{self, ExecutionError},
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Exit status for configuration-class failures.
const CONFIG_FAILURE_EXIT_CODE: i32 = 2;

/// Sets up logging and Ctrl-C handling, runs the CLI and reports errors centrally.
fn main() {
    let cancellation_token: CancellationToken = Arc::new(AtomicBool::new(false));
    env_logger::init();

    let handler_token = cancellation_token.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.store(true, Ordering::SeqCst)) {
        log::warn!("Could not install the Ctrl-C handler: {}", e);
    }

    if let Err(e) = run_cli(Cli::parse(), cancellation_token) {
        // Ctrl-C outside a running command ends the program quietly.
        if let Some(ExecutionError::Interrupted) = e.downcast_ref::<ExecutionError>() {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }

        // Configuration problems are reported as `<Class>: <message>`.
        if let Some(menu_err) = e.downcast_ref::<MenuError>() {
            eprintln!("{}: {}", menu_err.class_name().red().bold(), menu_err);
            std::process::exit(CONFIG_FAILURE_EXIT_CODE);
        }

        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli, cancellation_token: CancellationToken) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let setting: Setting = cli
        .to_setting()
        .map_err(|e| MenuError::Setting(e.to_string()))?;
    log::debug!("Effective setting: {:?}", setting);

    // A load cut short by Ctrl-C reports the interrupt, not the half-read source.
    let loaded = setting.load_config();
    executor::take_interrupt(&cancellation_token)?;
    let root = loaded?;
    let source = setting.config_path.clone().unwrap_or_default();

    if cli.print {
        return handlers::print::handle(&root, &source);
    }

    let pid_dir = setting
        .pid_dir()
        .context("Could not determine the lock directory")?;
    let executor = CommandExecutor::new(pid_dir, cancellation_token);
    handlers::browse::handle(&root, &executor)
}
