// src/core/menu_parser.rs

//! Turns loaded YAML values into the menu tree.
//!
//! Parsing is mutually recursive: a menu parses its items, an item may be a submenu, and
//! `include`/`eval` directives call back into the [`Loader`] and parse the fetched document as a
//! menu one level deeper. The depth counter is the only thing that stops an include cycle, since
//! the loader's per-run cache makes repeated fetches cheap but not finite.

use crate::{
    constants::{KEYWORD_CACHE, KEYWORD_EVAL, KEYWORD_INCLUDE, KEYWORD_META, MAX_NESTING_DEPTH},
    core::loader::{Loader, SourceKind},
    errors::MenuError,
    models::{Command, CommandLine, Item, Menu, Meta, value_kind},
};
use serde_yaml::{Mapping, Value};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Nesting level too deep.")]
    TooDeep,
    #[error("{what} must be dict, not {found}.")]
    NotAMapping {
        what: &'static str,
        found: &'static str,
    },
    #[error("{what} should have only one element, not {found}.")]
    WrongSize { what: &'static str, found: usize },
    #[error("{what} title must be string, not {found}.")]
    TitleNotString {
        what: &'static str,
        found: &'static str,
    },
    #[error("Menu content must be list, not {0}.")]
    MenuContentNotList(&'static str),
    #[error("Invalid command content type: {0}.")]
    InvalidCommandContent(&'static str),
    #[error("CommandLine must be string or dict, not {0}.")]
    InvalidCommandLine(&'static str),
    #[error("\"{directive}\" section must have string content, not {found}.")]
    DirectiveNotString {
        directive: &'static str,
        found: &'static str,
    },
    #[error("\"cache\" must be a non-negative number of seconds, not {0}.")]
    InvalidCacheTtl(String),
    #[error("Invalid meta: {0}")]
    Meta(#[from] serde_yaml::Error),
    /// A nested source could not be loaded; it already names its own path.
    #[error(transparent)]
    Source(Box<MenuError>),
}

impl From<MenuError> for ParseError {
    fn from(e: MenuError) -> Self {
        Self::Source(Box::new(e))
    }
}

type ParseResult<T> = Result<T, ParseError>;

// --- HELPERS ---

fn as_mapping<'a>(data: &'a Value, what: &'static str) -> ParseResult<&'a Mapping> {
    data.as_mapping().ok_or(ParseError::NotAMapping {
        what,
        found: value_kind(data),
    })
}

fn single_entry<'a>(mapping: &'a Mapping, what: &'static str) -> ParseResult<(&'a Value, &'a Value)> {
    match mapping.iter().next() {
        Some(entry) if mapping.len() == 1 => Ok(entry),
        _ => Err(ParseError::WrongSize {
            what,
            found: mapping.len(),
        }),
    }
}

fn title_string(title: &Value, what: &'static str) -> ParseResult<String> {
    title
        .as_str()
        .map(str::to_string)
        .ok_or(ParseError::TitleNotString {
            what,
            found: value_kind(title),
        })
}

fn directive_source<'a>(content: &'a Value, directive: &'static str) -> ParseResult<&'a str> {
    content.as_str().ok_or(ParseError::DirectiveNotString {
        directive,
        found: value_kind(content),
    })
}

fn parse_ttl(value: &Value) -> ParseResult<Duration> {
    if let Some(secs) = value.as_u64() {
        return Ok(Duration::from_secs(secs));
    }
    match value.as_f64().and_then(|secs| Duration::try_from_secs_f64(secs).ok()) {
        Some(ttl) => Ok(ttl),
        None => Err(ParseError::InvalidCacheTtl(
            serde_yaml::to_string(value)
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| value_kind(value).to_string()),
        )),
    }
}

/// A plain string, or a list whose elements are all strings or one-key `{cmd: {attrs}}` maps.
fn is_command_like(content: &Value) -> bool {
    match content {
        Value::String(_) => true,
        Value::Sequence(elements) => elements.iter().all(|element| match element {
            Value::String(_) => true,
            Value::Mapping(m) if m.len() == 1 => m
                .iter()
                .next()
                .is_some_and(|(cmd, attrs)| cmd.is_string() && attrs.is_mapping()),
            _ => false,
        }),
        _ => false,
    }
}

// --- ENTITY PARSERS ---

impl Item {
    /// Parses one menu entry.
    ///
    /// A `meta` key makes the node a menu. `include`/`eval` nodes are replaced by the menu
    /// the loaded document describes. Otherwise command-like content makes a [`Command`] and
    /// anything else a submenu.
    pub fn parse(data: &Value, meta: &Meta, loader: &mut Loader, depth: u32) -> ParseResult<Self> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::TooDeep);
        }
        let mapping = as_mapping(data, "Item")?;

        if mapping.contains_key(KEYWORD_META) {
            return Menu::parse(data, meta, loader, depth).map(Self::Menu);
        }

        let mut mapping = mapping.clone();
        let mut eval_ttl = None;
        if mapping.contains_key(KEYWORD_EVAL) {
            if let Some(cache) = mapping.remove(KEYWORD_CACHE) {
                eval_ttl = Some(parse_ttl(&cache)?);
            }
        }

        let (title, content) = single_entry(&mapping, "Item")?;
        match title.as_str() {
            Some(KEYWORD_INCLUDE) => {
                let source = directive_source(content, KEYWORD_INCLUDE)?;
                let loaded = loader.load(SourceKind::Document, source, None)?;
                Menu::parse(&loaded, meta, loader, depth + 1).map(Self::Menu)
            }
            Some(KEYWORD_EVAL) => {
                let source = directive_source(content, KEYWORD_EVAL)?;
                let loaded = loader.load(SourceKind::Command, source, eval_ttl)?;
                Menu::parse(&loaded, meta, loader, depth + 1).map(Self::Menu)
            }
            _ if is_command_like(content) => {
                Command::parse(&Value::Mapping(mapping.clone()), meta, loader.encoding())
                    .map(Self::Command)
            }
            _ => Menu::parse(&Value::Mapping(mapping.clone()), meta, loader, depth).map(Self::Menu),
        }
    }
}

impl Menu {
    /// Parses `{title: [items...]}`, optionally with a sibling `meta` mapping that updates the
    /// inherited context before the items are parsed.
    pub fn parse(data: &Value, meta: &Meta, loader: &mut Loader, depth: u32) -> ParseResult<Self> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::TooDeep);
        }
        let mut mapping = as_mapping(data, "Menu")?.clone();

        let meta = match mapping.remove(KEYWORD_META) {
            Some(overrides) => meta.updated(&overrides)?,
            None => meta.clone(),
        };

        let (title, content) = single_entry(&mapping, "Menu")?;
        let title = title_string(title, "Menu")?;
        let elements = content
            .as_sequence()
            .ok_or(ParseError::MenuContentNotList(value_kind(content)))?;

        let items = elements
            .iter()
            .map(|element| Item::parse(element, &meta, loader, depth + 1))
            .collect::<ParseResult<Vec<_>>>()?;

        Ok(Self::new(title, items, meta))
    }
}

impl Command {
    /// Parses `{title: "cmd"}` or `{title: ["cmd", {"cmd": {attrs}}, ...]}`.
    pub fn parse(data: &Value, meta: &Meta, encoding: &str) -> ParseResult<Self> {
        let mapping = as_mapping(data, "Command")?;
        let (title, content) = single_entry(mapping, "Command")?;
        let title = title_string(title, "Command")?;

        let command_lines = match content {
            Value::String(_) => vec![CommandLine::parse(content, meta, encoding)?],
            Value::Sequence(elements) => elements
                .iter()
                .map(|element| CommandLine::parse(element, meta, encoding))
                .collect::<ParseResult<Vec<_>>>()?,
            other => return Err(ParseError::InvalidCommandContent(value_kind(other))),
        };
        Ok(Self::new(title, command_lines))
    }
}

impl CommandLine {
    /// A bare string inherits `meta` unchanged; `{cmd: {attrs}}` applies `attrs` on top of it.
    pub fn parse(data: &Value, meta: &Meta, encoding: &str) -> ParseResult<Self> {
        match data {
            Value::String(cmd) => Ok(Self::new(cmd.clone(), meta.clone(), encoding)),
            Value::Mapping(mapping) => {
                let (cmd, attrs) = single_entry(mapping, "CommandLine")?;
                let cmd = cmd.as_str().ok_or(ParseError::TitleNotString {
                    what: "CommandLine",
                    found: value_kind(cmd),
                })?;
                Ok(Self::new(cmd, meta.updated(attrs)?, encoding))
            }
            other => Err(ParseError::InvalidCommandLine(value_kind(other))),
        }
    }
}
