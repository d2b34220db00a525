//! User preferences consulted by the store.
//!
//! Stored as a JSON file at a location chosen by the host application.
//! Missing keys fall back to their defaults so older files keep loading.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Column the note lists are ordered by.
///
/// Serialized as the underlying column name.
///
/// ```rust
/// use notekeep_core::SortColumn;
///
/// let json = serde_json::to_string(&SortColumn::LastModification).unwrap();
/// assert_eq!(json, r#""last_modification""#);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortColumn {
    #[default]
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "creation")]
    Creation,
    #[serde(rename = "last_modification")]
    LastModification,
    #[serde(rename = "alarm")]
    Reminder,
}

/// Persisted user preferences.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Sort column for every list except the reminders view.
    pub sorting_column: SortColumn,
    /// Passphrase the key for locked notes is derived from.
    pub password: String,
    /// Hide reminders that already went off from the reminders view.
    pub filter_past_reminders: bool,
    /// Categories whose view hides archived notes.
    pub archived_filtered_categories: BTreeSet<i64>,
}

impl Settings {
    /// Whether the view of `category_id` hides archived notes.
    pub fn filter_archived_in_category(&self, category_id: i64) -> bool {
        self.archived_filtered_categories.contains(&category_id)
    }

    pub fn set_filter_archived_in_category(&mut self, category_id: i64, filter: bool) {
        if filter {
            self.archived_filtered_categories.insert(category_id);
        } else {
            self.archived_filtered_categories.remove(&category_id);
        }
    }
}

/// Loads settings from `path`; returns defaults if the file is missing or corrupt.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Settings {
    match fs::read_to_string(path.as_ref()) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(
                "Ignoring corrupt settings file {}: {e}",
                path.as_ref().display()
            );
            Settings::default()
        }),
        Err(_) => Settings::default(),
    }
}

/// Saves settings to `path`, creating parent directories as needed.
pub fn save_settings<P: AsRef<Path>>(path: P, settings: &Settings) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}
