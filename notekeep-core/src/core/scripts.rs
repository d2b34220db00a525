//! SQL script assets consumed by the [`Migrator`](super::migrator::Migrator).
//!
//! A script source exposes one creation script (`create.sql`) and any number
//! of upgrade scripts named `upgrade-<version>.sql`.

use include_dir::{include_dir, Dir};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

static SQL_SCRIPTS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/sql");

/// File name of the script that builds a fresh database.
pub const CREATE_SCRIPT: &str = "create.sql";

const UPGRADE_PREFIX: &str = "upgrade-";
const UPGRADE_SUFFIX: &str = ".sql";

/// Read access to an ordered set of SQL scripts.
pub trait ScriptSource: Send + Sync {
    /// Names of every script the source holds, in no particular order.
    fn list(&self) -> io::Result<Vec<String>>;

    /// Full text of the script called `name`.
    fn read(&self, name: &str) -> io::Result<String>;
}

/// Scripts compiled into the binary from the crate's `sql/` directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledScripts;

impl ScriptSource for BundledScripts {
    fn list(&self) -> io::Result<Vec<String>> {
        Ok(SQL_SCRIPTS
            .files()
            .filter_map(|file| Some(file.path().file_name()?.to_str()?.to_string()))
            .collect())
    }

    fn read(&self, name: &str) -> io::Result<String> {
        SQL_SCRIPTS
            .get_file(name)
            .and_then(|file| file.contents_utf8())
            .map(str::to_string)
            .ok_or_else(|| not_found(name))
    }
}

/// Scripts read from a directory on disk at migration time.
#[derive(Debug, Clone)]
pub struct DirectoryScripts {
    root: PathBuf,
}

impl DirectoryScripts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ScriptSource for DirectoryScripts {
    fn list(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(UPGRADE_SUFFIX) {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    fn read(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.root.join(name))
    }
}

/// Scripts held in memory, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct MemoryScripts {
    scripts: BTreeMap<String, String>,
}

impl MemoryScripts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, sql: impl Into<String>) -> Self {
        self.scripts.insert(name.into(), sql.into());
        self
    }
}

impl ScriptSource for MemoryScripts {
    fn list(&self) -> io::Result<Vec<String>> {
        Ok(self.scripts.keys().cloned().collect())
    }

    fn read(&self, name: &str) -> io::Result<String> {
        self.scripts.get(name).cloned().ok_or_else(|| not_found(name))
    }
}

fn not_found(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("script '{name}' not found"))
}

/// Parses the version out of an `upgrade-<version>.sql` file name.
///
/// Returns `None` for any other name, including the creation script.
pub fn parse_upgrade_version(name: &str) -> Option<u32> {
    name.strip_prefix(UPGRADE_PREFIX)?
        .strip_suffix(UPGRADE_SUFFIX)?
        .parse()
        .ok()
}

pub fn is_upgrade_script(name: &str) -> bool {
    name.starts_with(UPGRADE_PREFIX) && name.ends_with(UPGRADE_SUFFIX)
}

/// Splits a script into individual statements.
///
/// `--` and `/* */` comments are dropped, semicolons inside quoted literals
/// are kept, and `CREATE TRIGGER ... END;` bodies stay in one statement.
pub fn split_statements(script: &str) -> Vec<String> {
    let chars: Vec<char> = script.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match (c, next) {
            ('-', Some('-')) => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                current.push('\n');
            }
            ('/', Some('*')) => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
                current.push(' ');
                continue;
            }
            ('\'', _) | ('"', _) | ('`', _) => {
                quote = Some(c);
                current.push(c);
            }
            (';', _) => {
                if is_open_trigger(&current) {
                    current.push(';');
                } else {
                    push_statement(&mut statements, &current);
                    current.clear();
                }
            }
            _ => current.push(c),
        }
        i += 1;
    }
    push_statement(&mut statements, &current);
    statements
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}

fn is_open_trigger(statement: &str) -> bool {
    let head = statement
        .split_whitespace()
        .take(3)
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase();
    let is_trigger = head.starts_with("CREATE TRIGGER")
        || head.starts_with("CREATE TEMP TRIGGER")
        || head.starts_with("CREATE TEMPORARY TRIGGER");
    if !is_trigger {
        return false;
    }

    // BEGIN and CASE open a block that END closes; the body ends when the
    // outermost BEGIN is closed.
    let mut seen_begin = false;
    let mut depth = 0usize;
    for word in keywords(statement) {
        match word.to_ascii_uppercase().as_str() {
            "BEGIN" => {
                seen_begin = true;
                depth += 1;
            }
            "CASE" => depth += 1,
            "END" => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    !seen_begin || depth > 0
}

/// Bare words of a statement, skipping quoted literals and identifiers.
fn keywords(statement: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut quote: Option<char> = None;
    let mut start: Option<usize> = None;
    for (i, c) in statement.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        if c.is_alphanumeric() || c == '_' {
            start.get_or_insert(i);
            continue;
        }
        if let Some(s) = start.take() {
            words.push(&statement[s..i]);
        }
        if matches!(c, '\'' | '"' | '`') {
            quote = Some(c);
        }
    }
    if let Some(s) = start {
        words.push(&statement[s..]);
    }
    words
}
