// src/models.rs

use md5::{Digest, Md5};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

// --- EXECUTION CONTEXT ---

/// Execution context inherited down the menu tree.
///
/// A `Meta` is never mutated in place: every override produces a new value via [`Meta::updated`],
/// so a parent menu's context is unaffected by what its children declare.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    pub work_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub lock: bool,
}

/// The accepted shape of a `meta` section or of a command line's attribute mapping.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct MetaOverrides {
    work_dir: Option<PathBuf>,
    env: Option<BTreeMap<String, String>>,
    lock: Option<bool>,
}

impl Meta {
    pub fn new(work_dir: Option<PathBuf>) -> Self {
        Self {
            work_dir,
            ..Default::default()
        }
    }

    /// Returns a copy with `overrides` applied.
    ///
    /// `work_dir` and `lock` are replaced when given; `env` is merged, new keys winning.
    ///
    /// # Errors
    /// Fails on unknown keys or on values of the wrong shape (e.g. a non-boolean `lock`).
    pub fn updated(&self, overrides: &serde_yaml::Value) -> Result<Self, serde_yaml::Error> {
        if !overrides.is_mapping() {
            return Err(serde::de::Error::custom(format!(
                "meta attributes must be a mapping, not {}",
                value_kind(overrides)
            )));
        }
        let overrides: MetaOverrides = serde_yaml::from_value(overrides.clone())?;

        let mut ret = self.clone();
        if let Some(work_dir) = overrides.work_dir {
            ret.work_dir = Some(work_dir);
        }
        if let Some(env) = overrides.env {
            ret.env.extend(env);
        }
        if let Some(lock) = overrides.lock {
            ret.lock = lock;
        }
        Ok(ret)
    }
}

/// Short name of a YAML value's type, for error messages.
pub fn value_kind(value: &serde_yaml::Value) -> &'static str {
    use serde_yaml::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "dict",
        Value::Tagged(_) => "tagged value",
    }
}

// --- ENTITIES ---

/// One shell-interpretable command string with its fully resolved context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub cmd: String,
    pub meta: Meta,
    pub encoding: String,
}

impl CommandLine {
    pub fn new(cmd: impl Into<String>, meta: Meta, encoding: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            meta,
            encoding: encoding.into(),
        }
    }

    /// Identifies the logical operation for locking: an md5 hex digest over the command text and
    /// the sorted environment overlay. The working directory and the lock flag are not part of it.
    pub fn to_hash_string(&self) -> String {
        let mut hasher = Md5::new();
        // Length prefixes keep ("ab", {}) and ("a", {"b": ""}) apart.
        let mut feed = |bytes: &[u8]| {
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        };
        feed(self.cmd.as_bytes());
        for (key, value) in &self.meta.env {
            feed(key.as_bytes());
            feed(value.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    pub fn formatted(&self) -> String {
        let cwd = match &self.meta.work_dir {
            Some(dir) => dir.display().to_string(),
            None => std::env::current_dir()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|_| ".".to_string()),
        };
        let mut buf = vec![format!("- cmd: {}", self.cmd), format!("  cwd: {}", cwd)];
        if !self.meta.env.is_empty() {
            let pairs: Vec<String> = self
                .meta
                .env
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect();
            buf.push(format!("  env: {{{}}}", pairs.join(", ")));
        }
        if self.meta.lock {
            buf.push("  lock: True".to_string());
        }
        buf.join("\n")
    }
}

/// A menu leaf: one or more shell operations run in order under a single title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub title: String,
    pub command_lines: Vec<CommandLine>,
}

impl Command {
    pub fn new(title: impl Into<String>, command_lines: Vec<CommandLine>) -> Self {
        Self {
            title: title.into(),
            command_lines,
        }
    }

    pub fn formatted(&self) -> String {
        let mut buf = vec![format!("* {}:", self.title)];
        for command_line in &self.command_lines {
            for line in command_line.formatted().lines() {
                buf.push(format!("  {}", line));
            }
        }
        buf.join("\n")
    }
}

/// An internal node of the tree. Its `meta` is where every descendant's context starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Menu {
    pub title: String,
    pub items: Vec<Item>,
    pub meta: Meta,
}

impl Menu {
    pub fn new(title: impl Into<String>, items: Vec<Item>, meta: Meta) -> Self {
        Self {
            title: title.into(),
            items,
            meta,
        }
    }
}

/// Either kind of node in the menu tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Menu(Menu),
    Command(Command),
}

impl Item {
    pub fn title(&self) -> &str {
        match self {
            Self::Menu(menu) => &menu.title,
            Self::Command(command) => &command.title,
        }
    }

    /// Renders the subtree, indenting each nesting level by two spaces.
    pub fn formatted(&self) -> String {
        match self {
            Self::Command(command) => command.formatted(),
            Self::Menu(menu) => {
                let mut buf = vec![format!("[{}]", menu.title)];
                for item in &menu.items {
                    for line in item.formatted().lines() {
                        buf.push(format!("  {}", line));
                    }
                }
                buf.join("\n")
            }
        }
    }
}

impl From<Menu> for Item {
    fn from(menu: Menu) -> Self {
        Self::Menu(menu)
    }
}

impl From<Command> for Item {
    fn from(command: Command) -> Self {
        Self::Command(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    fn meta_with_env(pairs: &[(&str, &str)]) -> Meta {
        Meta {
            env: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_meta_updated_replaces_work_dir_and_lock() {
        let base = Meta::new(Some(PathBuf::from("/a")));
        let updated = base
            .updated(&yaml("{work_dir: /b, lock: true}"))
            .unwrap();

        assert_eq!(updated.work_dir, Some(PathBuf::from("/b")));
        assert!(updated.lock);
        // The base is untouched.
        assert_eq!(base.work_dir, Some(PathBuf::from("/a")));
        assert!(!base.lock);
    }

    #[test]
    fn test_meta_updated_merges_env_last_writer_wins() {
        let base = meta_with_env(&[("A", "1"), ("B", "2")]);
        let updated = base.updated(&yaml("{env: {B: '20', C: '30'}}")).unwrap();

        assert_eq!(updated, meta_with_env(&[("A", "1"), ("B", "20"), ("C", "30")]));
    }

    #[test]
    fn test_meta_updated_in_steps_matches_single_merge() {
        let base = Meta::default();
        let stepwise = base
            .updated(&yaml("{env: {X: '1', Y: '1'}, work_dir: /one}"))
            .unwrap()
            .updated(&yaml("{env: {Y: '2'}, lock: true}"))
            .unwrap();
        let merged = base
            .updated(&yaml("{env: {X: '1', Y: '2'}, work_dir: /one, lock: true}"))
            .unwrap();

        assert_eq!(stepwise, merged);
    }

    #[test]
    fn test_meta_updated_with_empty_mapping_is_identity() {
        let base = meta_with_env(&[("K", "V")]);
        assert_eq!(base.updated(&yaml("{}")).unwrap(), base);
    }

    #[test]
    fn test_meta_updated_rejects_unknown_key() {
        let err = Meta::default().updated(&yaml("{xxx: 1}")).unwrap_err();
        assert!(err.to_string().contains("unknown field `xxx`"));
    }

    #[test]
    fn test_meta_updated_rejects_wrong_shapes() {
        assert!(Meta::default().updated(&yaml("{lock: 'sometimes'}")).is_err());
        assert!(Meta::default().updated(&yaml("{env: [a, b]}")).is_err());
        assert!(Meta::default().updated(&yaml("{work_dir: [x]}")).is_err());
        let err = Meta::default().updated(&yaml("[work_dir]")).unwrap_err();
        assert!(err.to_string().contains("must be a mapping, not list"));
    }

    #[test]
    fn test_hash_ignores_work_dir_and_lock() {
        let a = CommandLine::new("echo 1", Meta::new(Some(PathBuf::from("/x"))), "utf-8");
        let mut b = CommandLine::new("echo 1", Meta::new(Some(PathBuf::from("/y"))), "utf-8");
        b.meta.lock = true;

        assert_eq!(a.to_hash_string(), b.to_hash_string());
        assert_eq!(a.to_hash_string().len(), 32);
    }

    #[test]
    fn test_hash_differs_on_cmd_or_env() {
        let base = CommandLine::new("echo 1", meta_with_env(&[("A", "1")]), "utf-8");
        let other_cmd = CommandLine::new("echo 2", meta_with_env(&[("A", "1")]), "utf-8");
        let other_env = CommandLine::new("echo 1", meta_with_env(&[("A", "2")]), "utf-8");
        let no_env = CommandLine::new("echo 1", Meta::default(), "utf-8");

        assert_ne!(base.to_hash_string(), other_cmd.to_hash_string());
        assert_ne!(base.to_hash_string(), other_env.to_hash_string());
        assert_ne!(base.to_hash_string(), no_env.to_hash_string());
    }

    #[test]
    fn test_hash_does_not_confuse_cmd_and_env_boundaries() {
        let joined = CommandLine::new("ab", Meta::default(), "utf-8");
        let split = CommandLine::new("a", meta_with_env(&[("b", "")]), "utf-8");
        assert_ne!(joined.to_hash_string(), split.to_hash_string());
    }

    #[test]
    fn test_formatted_command() {
        let mut meta = meta_with_env(&[("B", "2"), ("A", "1")]);
        meta.work_dir = Some(PathBuf::from("/work"));
        meta.lock = true;
        let command = Command::new("Deploy", vec![CommandLine::new("make deploy", meta, "utf-8")]);

        assert_eq!(
            command.formatted(),
            "* Deploy:\n  - cmd: make deploy\n    cwd: /work\n    env: {A: 1, B: 2}\n    lock: True"
        );
    }

    #[test]
    fn test_formatted_menu_indents_children() {
        let meta = Meta::new(Some(PathBuf::from("/w")));
        let leaf = Command::new("Ping", vec![CommandLine::new("ping", meta.clone(), "utf-8")]);
        let sub = Menu::new("Sub", vec![leaf.into()], meta.clone());
        let root = Item::Menu(Menu::new("Main", vec![sub.into()], meta));

        assert_eq!(
            root.formatted(),
            "[Main]\n  [Sub]\n    * Ping:\n      - cmd: ping\n        cwd: /w"
        );
    }
}
