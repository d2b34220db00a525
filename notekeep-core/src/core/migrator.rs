//! Schema creation and versioned upgrades.
//!
//! The schema version lives in SQLite's `user_version` pragma. A fresh
//! database (version 0) runs the creation script; an older one runs the
//! pre-upgrade steps and then every `upgrade-<v>.sql` with `old < v <= new`,
//! ascending by `v`.

use crate::core::scripts::{
    is_upgrade_script, parse_upgrade_version, split_statements, BundledScripts, ScriptSource,
    CREATE_SCRIPT,
};
use crate::{Result, StoreError};
use log::{error, info, trace, warn};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Schema version written by this release.
pub const DATABASE_VERSION: u32 = 570;

/// What to do when a single statement of a script fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum StatementPolicy {
    /// Log the failing statement and carry on with the rest of the script.
    #[default]
    Continue,
    /// Stop and fail the whole creation or upgrade.
    Abort,
}

/// A data fix-up that runs before the upgrade scripts.
///
/// Runs when the database is upgraded across `version`, that is when
/// `old < version <= new`.
#[derive(Clone, Copy)]
pub struct UpgradeStep {
    pub version: u32,
    pub name: &'static str,
    pub apply: fn(&Connection) -> rusqlite::Result<()>,
}

impl std::fmt::Debug for UpgradeStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradeStep")
            .field("version", &self.version)
            .field("name", &self.name)
            .finish()
    }
}

/// Pre-upgrade steps, ordered by version.
pub const UPGRADE_STEPS: &[UpgradeStep] = &[
    UpgradeStep {
        version: 501,
        name: "clear_zero_reminders",
        apply: clear_zero_reminders,
    },
    UpgradeStep {
        version: 560,
        name: "uncategorize_orphans",
        apply: uncategorize_orphans,
    },
];

/// Older releases stored "no reminder" as 0 or an empty string.
fn clear_zero_reminders(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE notes SET alarm = NULL WHERE alarm = 0 OR alarm = ''",
        [],
    )?;
    Ok(())
}

/// Older releases uncategorized notes with an empty string and left
/// references to deleted categories behind.
fn uncategorize_orphans(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE notes SET category_id = NULL
         WHERE category_id = ''
            OR (category_id IS NOT NULL
                AND category_id NOT IN (SELECT category_id FROM categories))",
        [],
    )?;
    Ok(())
}

/// Brings a database to the target schema version.
pub struct Migrator {
    source: Box<dyn ScriptSource>,
    target_version: u32,
    policy: StatementPolicy,
    steps: Vec<UpgradeStep>,
}

impl Migrator {
    /// Creates a migrator targeting [`DATABASE_VERSION`] with the default steps.
    pub fn new(source: Box<dyn ScriptSource>) -> Self {
        Self {
            source,
            target_version: DATABASE_VERSION,
            policy: StatementPolicy::default(),
            steps: UPGRADE_STEPS.to_vec(),
        }
    }

    /// Migrator over the scripts bundled with the crate.
    pub fn bundled() -> Self {
        Self::new(Box::new(BundledScripts))
    }

    pub fn with_target_version(mut self, version: u32) -> Self {
        self.target_version = version;
        self
    }

    pub fn with_policy(mut self, policy: StatementPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_steps(mut self, steps: Vec<UpgradeStep>) -> Self {
        self.steps = steps;
        self
    }

    pub fn target_version(&self) -> u32 {
        self.target_version
    }

    /// Creates or upgrades the schema and returns the resulting version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SchemaInit`] if the creation script cannot be read,
    /// [`StoreError::SchemaUpgrade`] if an upgrade script cannot be listed or
    /// read or an upgrade step fails, and [`StoreError::SchemaDowngrade`] if the
    /// database is newer than the target. Under [`StatementPolicy::Abort`] a
    /// failing statement is reported the same way.
    pub fn run(&self, conn: &mut Connection) -> Result<u32> {
        let current = schema_version(conn)?;
        match current.cmp(&self.target_version) {
            Ordering::Equal => Ok(current),
            Ordering::Greater => Err(StoreError::SchemaDowngrade {
                found: current,
                supported: self.target_version,
            }),
            Ordering::Less if current == 0 => self.create(conn),
            Ordering::Less => self.upgrade(conn, current),
        }
    }

    fn create(&self, conn: &mut Connection) -> Result<u32> {
        info!("Database creation");
        let script = self
            .source
            .read(CREATE_SCRIPT)
            .map_err(|e| StoreError::SchemaInit(format!("{CREATE_SCRIPT}: {e}")))?;

        let tx = conn.transaction()?;
        self.exec_script(&tx, CREATE_SCRIPT, &script)
            .map_err(|e| StoreError::SchemaInit(format!("{CREATE_SCRIPT}: {e}")))?;
        tx.pragma_update(None, "user_version", self.target_version)?;
        tx.commit()?;
        Ok(self.target_version)
    }

    fn upgrade(&self, conn: &mut Connection, old: u32) -> Result<u32> {
        let new = self.target_version;
        info!("Upgrading database version from {old} to {new}");

        let upgrade_err = |what: String| StoreError::SchemaUpgrade(what);

        let mut pending: Vec<(u32, String)> = self
            .source
            .list()
            .map_err(|e| upgrade_err(format!("cannot list scripts: {e}")))?
            .into_iter()
            .filter(|name| is_upgrade_script(name))
            .filter_map(|name| match parse_upgrade_version(&name) {
                Some(version) => Some((version, name)),
                None => {
                    warn!("Ignoring upgrade script with unparsable version: {name}");
                    None
                }
            })
            .filter(|(version, _)| *version > old && *version <= new)
            .collect();
        pending.sort_by_key(|(version, _)| *version);

        // Read everything up front so an unreadable script fails before any change.
        let scripts = pending
            .into_iter()
            .map(|(_, name)| {
                let sql = self
                    .source
                    .read(&name)
                    .map_err(|e| upgrade_err(format!("{name}: {e}")))?;
                Ok::<_, StoreError>((name, sql))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut steps: Vec<&UpgradeStep> = self
            .steps
            .iter()
            .filter(|step| step.version > old && step.version <= new)
            .collect();
        steps.sort_by_key(|step| step.version);

        let tx = conn.transaction()?;
        for step in steps {
            info!("  upgrade step {} ({})", step.version, step.name);
            (step.apply)(&*tx).map_err(|e| {
                upgrade_err(format!("step {} ({}) failed: {e}", step.version, step.name))
            })?;
        }
        for (name, sql) in &scripts {
            self.exec_script(&tx, name, sql)
                .map_err(|e| upgrade_err(format!("{name}: {e}")))?;
        }
        tx.pragma_update(None, "user_version", new)?;
        tx.commit()?;

        info!("Database upgrade successful");
        Ok(new)
    }

    fn exec_script(&self, conn: &Connection, name: &str, script: &str) -> rusqlite::Result<()> {
        info!("  exec sql file: {name}");
        for statement in split_statements(script) {
            trace!("    sql: {statement}");
            if let Err(e) = conn.execute_batch(&statement) {
                match self.policy {
                    StatementPolicy::Continue => {
                        error!("Error executing command: {statement}: {e}");
                    }
                    StatementPolicy::Abort => return Err(e),
                }
            }
        }
        Ok(())
    }
}

/// Reads the schema version stored in the database header.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}
