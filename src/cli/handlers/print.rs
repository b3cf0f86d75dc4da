// src/cli/handlers/print.rs

use anyhow::Result;
use colored::Colorize;

use crate::models::{Item, Menu};

/// Header line plus the whole resolved tree.
pub fn render(menu: &Menu, source: &str) -> String {
    let header = format!(t!("print.header"), path = source);
    let tree = Item::Menu(menu.clone()).formatted();
    format!("{}\n{}", header.bold(), tree)
}

pub fn handle(menu: &Menu, source: &str) -> Result<()> {
    println!("{}", render(menu, source));
    Ok(())
}
