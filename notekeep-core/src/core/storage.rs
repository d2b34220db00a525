use crate::core::crypto::{generate_salt, SALT_LEN};
use crate::core::migrator::Migrator;
use crate::Result;
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const KEY_SALT: &str = "key_salt";

/// The single cached connection to a notes database, migrated on open.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Opens (creating if needed) the database at `path` and brings its schema
    /// up to the migrator's target version before returning.
    pub fn open<P: AsRef<Path>>(path: P, migrator: &Migrator) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening notes database {}", path.display());
        Self::migrated(Connection::open(path)?, migrator)
    }

    pub fn open_in_memory(migrator: &Migrator) -> Result<Self> {
        Self::migrated(Connection::open_in_memory()?, migrator)
    }

    fn migrated(mut conn: Connection, migrator: &Migrator) -> Result<Self> {
        let version = migrator.run(&mut conn)?;
        info!("Notes database ready at schema version {version}");
        Ok(Self { conn })
    }

    /// The key derivation salt of this database, created on first use.
    pub fn key_salt(&self) -> Result<[u8; SALT_LEN]> {
        let stored: Option<Vec<u8>> = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?", [KEY_SALT], |row| row.get(0))
            .optional()?;
        match stored.map(<[u8; SALT_LEN]>::try_from) {
            Some(Ok(salt)) => return Ok(salt),
            Some(Err(bytes)) => warn!("Replacing key salt of invalid length {}", bytes.len()),
            None => info!("Creating key salt for notes database"),
        }
        let salt = generate_salt();
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)",
            params![KEY_SALT, &salt[..]],
        )?;
        Ok(salt)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}
