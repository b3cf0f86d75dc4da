// src/cli/handlers/browse.rs

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::{Confirm, Select, theme::ColorfulTheme};
use std::env;

use crate::{
    core::command_executor::CommandExecutor,
    models::{Command, Item, Menu},
};

/// What a line of the selection list leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice<'a> {
    Open(&'a Menu),
    Run(&'a Command),
    Return,
    Quit,
}

/// The selectable lines for `current`: its items, then "Return to <parent>" below the root,
/// then "Quit".
pub fn entries<'a>(current: &'a Menu, parent: Option<&Menu>) -> Vec<(String, Choice<'a>)> {
    let mut ret: Vec<(String, Choice<'a>)> = current
        .items
        .iter()
        .map(|item| match item {
            Item::Menu(menu) => (
                format!(t!("browse.item.sub_menu"), title = menu.title),
                Choice::Open(menu),
            ),
            Item::Command(command) => (command.title.clone(), Choice::Run(command)),
        })
        .collect();
    if let Some(parent) = parent {
        ret.push((
            format!(t!("browse.item.return"), title = parent.title),
            Choice::Return,
        ));
    }
    ret.push((t!("browse.item.quit").to_string(), Choice::Quit));
    ret
}

/// `Main > Sub > Leaf`
pub fn breadcrumb(stack: &[&Menu]) -> String {
    stack
        .iter()
        .map(|menu| menu.title.as_str())
        .collect::<Vec<_>>()
        .join(" > ")
}

fn current_user() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Navigates the tree interactively until the user quits. Escape goes up one level.
pub fn handle(root: &Menu, executor: &CommandExecutor) -> Result<()> {
    let theme = ColorfulTheme::default();
    println!(
        "{}",
        format!(t!("browse.header.user"), user = current_user()).dimmed()
    );

    let mut stack: Vec<&Menu> = vec![root];
    while let Some(&current) = stack.last() {
        let parent = stack
            .len()
            .checked_sub(2)
            .and_then(|i| stack.get(i))
            .copied();
        let mut entries = entries(current, parent);
        let labels: Vec<&str> = entries.iter().map(|(label, _)| label.as_str()).collect();

        let selection = Select::with_theme(&theme)
            .with_prompt(breadcrumb(&stack))
            .items(&labels)
            .default(0)
            .interact_opt()?;

        let choice = match selection {
            Some(index) if index < entries.len() => entries.swap_remove(index).1,
            _ => Choice::Return,
        };

        match choice {
            Choice::Open(menu) => stack.push(menu),
            Choice::Run(command) => run_with_confirmation(command, executor, &theme)?,
            Choice::Return => {
                stack.pop();
            }
            Choice::Quit => break,
        }
    }
    Ok(())
}

fn run_with_confirmation(
    command: &Command,
    executor: &CommandExecutor,
    theme: &ColorfulTheme,
) -> Result<()> {
    println!("\n{}", t!("browse.confirm.title").bold());
    println!("{}", format!(t!("browse.confirm.would_execute"), title = command.title));
    println!("{}", command.formatted().dimmed());
    if executor.is_running(command) {
        println!(
            "{}",
            format!(t!("browse.confirm.already_running"), title = command.title).yellow()
        );
    }

    if !Confirm::with_theme(theme)
        .with_prompt(t!("browse.confirm.question"))
        .default(false)
        .interact()?
    {
        println!("{}", t!("browse.info.cancelled"));
        return Ok(());
    }

    println!(
        "\n{}",
        format!(t!("browse.run.title"), title = command.title).cyan().bold()
    );
    let code = executor
        .execute(command)
        .with_context(|| format!(t!("browse.run.failed"), title = command.title))?;

    let report = format!(t!("browse.run.return_code"), code = code);
    if code == 0 {
        println!("{}\n", report.green());
    } else {
        println!("{}\n", report.red().bold());
    }
    Ok(())
}
