//! Process-wide access to one lazily opened [`NoteStore`].

use crate::core::crypto::KdfParams;
use crate::core::migrator::StatementPolicy;
use crate::core::store::NoteStore;
use crate::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// Everything needed to open a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    pub db_path: PathBuf,
    /// JSON settings file; defaults are used when `None` or missing.
    pub settings_path: Option<PathBuf>,
    /// Directory of SQL scripts overriding the bundled ones.
    pub scripts_dir: Option<PathBuf>,
    #[serde(default)]
    pub statement_policy: StatementPolicy,
    #[serde(default)]
    pub kdf: KdfParams,
}

impl StoreConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            settings_path: None,
            scripts_dir: None,
            statement_policy: StatementPolicy::default(),
            kdf: KdfParams::default(),
        }
    }
}

pub type SharedStore = Arc<Mutex<NoteStore>>;

/// Opens the store on first use and hands out the same instance afterwards.
///
/// Concurrent first callers wait on one lock, so the schema is migrated once.
pub struct StoreHandle {
    config: StoreConfig,
    slot: Mutex<Option<SharedStore>>,
}

impl StoreHandle {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            slot: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<SharedStore>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The shared store, opening it if this is the first call.
    pub fn get(&self) -> Result<SharedStore> {
        let mut slot = self.lock_slot();
        if let Some(store) = slot.as_ref() {
            return Ok(Arc::clone(store));
        }
        let store = Arc::new(Mutex::new(NoteStore::open(&self.config)?));
        *slot = Some(Arc::clone(&store));
        Ok(store)
    }

    /// Drops the cached instance and opens a fresh one.
    ///
    /// Holders of the previous instance keep it until they release it.
    pub fn reopen(&self) -> Result<SharedStore> {
        let mut slot = self.lock_slot();
        info!("Reopening notes database {}", self.config.db_path.display());
        let store = Arc::new(Mutex::new(NoteStore::open(&self.config)?));
        *slot = Some(Arc::clone(&store));
        Ok(store)
    }

    pub fn is_open(&self) -> bool {
        self.lock_slot().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::Touch;
    use crate::Note;
    use std::thread;
    use tempfile::TempDir;

    fn handle(dir: &TempDir) -> StoreHandle {
        StoreHandle::new(StoreConfig::new(dir.path().join("notes.db")))
    }

    #[test]
    fn test_get_opens_once() {
        let dir = TempDir::new().unwrap();
        let handle = handle(&dir);
        assert!(!handle.is_open());

        let a = handle.get().unwrap();
        let b = handle.get().unwrap();
        assert!(handle.is_open());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_concurrent_callers_share_one_instance() {
        let dir = TempDir::new().unwrap();
        let handle = Arc::new(handle(&dir));

        let stores: Vec<SharedStore> = (0..8)
            .map(|_| {
                let handle = Arc::clone(&handle);
                thread::spawn(move || handle.get().unwrap())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().unwrap())
            .collect();

        assert!(stores.iter().all(|s| Arc::ptr_eq(s, &stores[0])));
    }

    #[test]
    fn test_reopen_sees_committed_data() {
        let dir = TempDir::new().unwrap();
        let handle = handle(&dir);

        let first = handle.get().unwrap();
        let id = {
            let mut store = first.lock().unwrap();
            store
                .upsert_note(&Note::new("persisted", ""), &[], Touch::Update)
                .unwrap()
                .creation
                .unwrap()
        };

        let second = handle.reopen().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        let store = second.lock().unwrap();
        assert_eq!(store.get_note(id).unwrap().title, "persisted");
    }

    #[test]
    fn test_failed_open_leaves_slot_empty() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path().join("missing").join("notes.db"));
        let handle = StoreHandle::new(config);
        assert!(handle.get().is_err());
        assert!(!handle.is_open());
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: StoreConfig = serde_json::from_str(
            r#"{"dbPath":"/tmp/notes.db","settingsPath":null,"scriptsDir":null}"#,
        )
        .unwrap();
        assert_eq!(config, StoreConfig::new("/tmp/notes.db"));
    }
}
