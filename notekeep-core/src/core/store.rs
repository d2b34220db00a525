//! The note store: scoped reads, transactional upserts and deletes.

use crate::core::clock::{now_millis, IdClock};
use crate::core::crypto::{seal_content, NoteCipher, XChaChaCipher};
use crate::core::handle::StoreConfig;
use crate::core::mapper::{
    map_attachment_row, map_category_row, map_note_row, note_from_row, ATTACHMENT_COLUMNS,
    CATEGORY_COLUMNS,
};
use crate::core::migrator::Migrator;
use crate::core::query::{BuiltQuery, Navigation, QueryBuilder, Scope};
use crate::core::scripts::DirectoryScripts;
use crate::core::settings::{load_settings, save_settings, Settings};
use crate::core::stats::{compute_stats, Stats};
use crate::core::storage::Storage;
use crate::core::tags::{aggregate_tags, split_tag_list, TagFilter};
use crate::{
    Attachment, AttachmentPolicy, Category, CategorySummary, DeleteResult, Note, Result,
    StoreError, Tag,
};
use log::{debug, info, trace};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;

/// Whether an upsert refreshes the note's last-modification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Touch {
    /// Editorial change: stamp the current time.
    #[default]
    Update,
    /// Flag flip: keep the stored time if the note has one.
    Preserve,
}

/// Persistent store of notes, attachments and categories.
///
/// Reads take `&self`; writes that need a transaction take `&mut self`.
pub struct NoteStore {
    storage: Storage,
    settings: Settings,
    cipher: Box<dyn NoteCipher>,
    ids: IdClock,
}

impl NoteStore {
    /// Opens the store described by `config`, migrating the schema first.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let migrator = match &config.scripts_dir {
            Some(dir) => Migrator::new(Box::new(DirectoryScripts::new(dir))),
            None => Migrator::bundled(),
        }
        .with_policy(config.statement_policy);
        let settings = config
            .settings_path
            .as_ref()
            .map(load_settings)
            .unwrap_or_default();
        let storage = Storage::open(&config.db_path, &migrator)?;
        let cipher = XChaChaCipher::with_salt(config.kdf, storage.key_salt()?);
        Ok(Self::from_storage(storage, Box::new(cipher), settings))
    }

    pub fn open_with<P: AsRef<Path>>(
        path: P,
        migrator: &Migrator,
        cipher: Box<dyn NoteCipher>,
        settings: Settings,
    ) -> Result<Self> {
        Ok(Self::from_storage(Storage::open(path, migrator)?, cipher, settings))
    }

    pub fn open_in_memory(
        migrator: &Migrator,
        cipher: Box<dyn NoteCipher>,
        settings: Settings,
    ) -> Result<Self> {
        Ok(Self::from_storage(Storage::open_in_memory(migrator)?, cipher, settings))
    }

    fn from_storage(storage: Storage, cipher: Box<dyn NoteCipher>, settings: Settings) -> Self {
        Self {
            storage,
            settings,
            cipher,
            ids: IdClock::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Writes the current settings to `path` as JSON.
    pub fn save_settings<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_settings(path, &self.settings)
    }

    /// Direct access to the underlying connection.
    pub fn connection(&self) -> &Connection {
        self.storage.connection()
    }

    fn builder(&self) -> QueryBuilder {
        QueryBuilder::new(self.settings.sorting_column, now_millis())
    }

    // ── reads ─────────────────────────────────────────────────────────

    /// Runs `scope` and returns the matching notes with their attachments.
    pub fn notes(&self, scope: &Scope) -> Result<Vec<Note>> {
        let BuiltQuery { sql, params } = self.builder().build(scope);
        trace!("Query notes: {sql}");

        let conn = self.storage.connection();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), map_note_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|row| {
                let mut note = note_from_row(row, self.cipher.as_ref(), &self.settings.password)?;
                if let Some(id) = note.creation {
                    note.attachments = self.note_attachments(id)?;
                }
                Ok(note)
            })
            .collect()
    }

    /// Returns the note with primary key `id`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoteNotFound`] if there is no such note.
    pub fn get_note(&self, id: i64) -> Result<Note> {
        self.notes(&Scope::Id(id))?
            .into_iter()
            .next()
            .ok_or(StoreError::NoteNotFound(id))
    }

    /// Notes of the given view; `None` returns every note, trashed included.
    pub fn all_notes(&self, navigation: Option<&Navigation>) -> Result<Vec<Note>> {
        match navigation {
            None => self.notes(&Scope::Everything),
            Some(Navigation::Notes) => self.notes_active(),
            Some(Navigation::Archive) => self.notes_archived(),
            Some(Navigation::Reminders) => {
                self.notes_with_reminder(self.settings.filter_past_reminders)
            }
            Some(Navigation::Trash) => self.notes_trashed(),
            Some(Navigation::Uncategorized) => self.notes_uncategorized(),
            Some(Navigation::Category(id)) => self.notes_by_category(*id),
        }
    }

    pub fn notes_active(&self) -> Result<Vec<Note>> {
        self.notes(&Scope::Active)
    }

    pub fn notes_archived(&self) -> Result<Vec<Note>> {
        self.notes(&Scope::Archived)
    }

    pub fn notes_trashed(&self) -> Result<Vec<Note>> {
        self.notes(&Scope::Trashed)
    }

    pub fn notes_uncategorized(&self) -> Result<Vec<Note>> {
        self.notes(&Scope::Uncategorized)
    }

    /// Notes filed under a category; archived ones are hidden when the
    /// category's archived filter is enabled in the settings.
    pub fn notes_by_category(&self, category_id: i64) -> Result<Vec<Note>> {
        self.notes(&Scope::Category {
            id: category_id,
            filter_archived: self.settings.filter_archived_in_category(category_id),
        })
    }

    pub fn notes_with_reminder(&self, filter_past: bool) -> Result<Vec<Note>> {
        self.notes(&Scope::Reminders { filter_past })
    }

    pub fn notes_with_reminder_not_fired(&self) -> Result<Vec<Note>> {
        self.notes(&Scope::RemindersNotFired)
    }

    pub fn today_reminders(&self) -> Result<Vec<Note>> {
        self.notes(&Scope::TodayReminders)
    }

    pub fn notes_with_location(&self) -> Result<Vec<Note>> {
        self.notes(&Scope::WithLocation)
    }

    pub fn checklists(&self) -> Result<Vec<Note>> {
        self.notes(&Scope::Checklists)
    }

    /// Locked notes.
    pub fn masked(&self) -> Result<Vec<Note>> {
        self.notes_with_lock(true)
    }

    pub fn notes_with_lock(&self, locked: bool) -> Result<Vec<Note>> {
        self.notes(&Scope::Locked(locked))
    }

    pub fn uncompleted_checklists(&self, navigation: &Navigation) -> Result<Vec<Note>> {
        self.notes(&Scope::UncompletedChecklists {
            navigation: navigation.clone(),
        })
    }

    /// Substring search over the notes of `navigation`.
    ///
    /// `%`, `_` and quotes in `pattern` match literally.
    pub fn notes_by_pattern(&self, pattern: &str, navigation: &Navigation) -> Result<Vec<Note>> {
        self.notes(&Scope::Pattern {
            pattern: pattern.to_string(),
            navigation: navigation.clone(),
        })
    }

    /// Notes containing every one of `tags` as a whole token.
    ///
    /// An empty tag list selects no notes.
    pub fn notes_by_tags(&self, tags: &[String], navigation: &Navigation) -> Result<Vec<Note>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let filter = TagFilter::new(tags);
        let candidates = self.notes(&Scope::Tags {
            tags: tags.to_vec(),
            navigation: navigation.clone(),
        })?;
        Ok(candidates
            .into_iter()
            .filter(|note| filter.matches(&note.text()))
            .collect())
    }

    /// Like [`notes_by_tags`](Self::notes_by_tags) for a comma separated list.
    pub fn notes_by_tag(&self, tags: &str, navigation: &Navigation) -> Result<Vec<Note>> {
        self.notes_by_tags(&split_tag_list(tags), navigation)
    }

    pub fn note_attachments(&self, note_id: i64) -> Result<Vec<Attachment>> {
        let mut stmt = self.storage.connection().prepare(&format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE note_id = ?1 ORDER BY attachment_id"
        ))?;
        let attachments = stmt
            .query_map([note_id], map_attachment_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attachments)
    }

    pub fn all_attachments(&self) -> Result<Vec<Attachment>> {
        let mut stmt = self.storage.connection().prepare(&format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments ORDER BY attachment_id"
        ))?;
        let attachments = stmt
            .query_map([], map_attachment_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attachments)
    }

    /// Every category with its count of non-trashed notes, by name with
    /// unnamed categories last.
    pub fn categories(&self) -> Result<Vec<CategorySummary>> {
        let mut stmt = self.storage.connection().prepare(
            "SELECT c.category_id, c.name, c.description, c.color, COUNT(n.creation)
             FROM categories c
             LEFT JOIN notes n ON n.category_id = c.category_id AND n.trashed IS NOT 1
             GROUP BY c.category_id
             ORDER BY IFNULL(NULLIF(c.name, ''), 'zzzzzzzz') COLLATE NOCASE",
        )?;
        let categories = stmt
            .query_map([], |row| {
                Ok(CategorySummary {
                    category: map_category_row(row)?,
                    note_count: row.get::<_, i64>(4)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(categories)
    }

    pub fn category(&self, category_id: i64) -> Result<Option<Category>> {
        let category = self
            .storage
            .connection()
            .query_row(
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE category_id = ?1"),
                [category_id],
                map_category_row,
            )
            .optional()?;
        Ok(category)
    }

    /// Number of notes, trashed included, filed under a category.
    pub fn categorized_count(&self, category_id: i64) -> Result<usize> {
        let count: i64 = self.storage.connection().query_row(
            "SELECT COUNT(*) FROM notes WHERE category_id = ?1",
            [category_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Tags of the notes in `navigation`, or of a single note.
    pub fn tags(&self, note: Option<i64>, navigation: &Navigation) -> Result<Vec<Tag>> {
        let notes = self.notes(&Scope::Tagged {
            note,
            navigation: navigation.clone(),
        })?;
        Ok(aggregate_tags(&notes))
    }

    pub fn stats(&self) -> Result<Stats> {
        let notes = self.notes(&Scope::Everything)?;
        let attachments = self.all_attachments()?;
        let categories = self.categories()?.len();
        Ok(compute_stats(&notes, &attachments, categories, now_millis()))
    }

    // ── writes ────────────────────────────────────────────────────────

    /// Inserts or replaces a note and reconciles its attachments.
    ///
    /// `previous` is the attachment list as last loaded. Every attachment of
    /// `note` is upserted; every attachment of `previous` that is no longer on
    /// the note is deleted. The note row and all attachment changes commit
    /// together or not at all.
    ///
    /// Returns the note as stored, with its id, timestamps and attachment ids
    /// filled in and content still in plaintext.
    pub fn upsert_note(
        &mut self,
        note: &Note,
        previous: &[Attachment],
        touch: Touch,
    ) -> Result<Note> {
        let creation = note.creation.unwrap_or_else(|| self.ids.next());
        let last_modification = match (touch, note.last_modification) {
            (Touch::Preserve, Some(stored)) => stored,
            _ => now_millis().max(creation),
        };
        let content = seal_content(
            self.cipher.as_ref(),
            &note.content,
            note.locked,
            &self.settings.password,
        )?;

        let tx = self.storage.connection_mut().transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO notes (creation, last_modification, title, content,
                archived, trashed, alarm, reminder_fired, recurrence_rule,
                latitude, longitude, address, category_id, locked, checklist)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                creation,
                last_modification,
                note.title,
                content,
                note.archived,
                note.trashed,
                note.reminder,
                note.reminder_fired,
                note.recurrence_rule,
                note.location.as_ref().map(|l| l.latitude),
                note.location.as_ref().map(|l| l.longitude),
                note.location.as_ref().and_then(|l| l.address.clone()),
                note.category.as_ref().and_then(|c| c.id),
                note.locked,
                note.checklist,
            ],
        )?;

        let mut stale: Vec<&Attachment> = previous.iter().collect();
        let mut saved = Vec::with_capacity(note.attachments.len());
        for attachment in &note.attachments {
            let mut attachment = attachment.clone();
            let id = attachment.id.unwrap_or_else(|| self.ids.next());
            attachment.id = Some(id);
            attachment.note_id = Some(creation);
            write_attachment(&tx, &attachment)?;
            stale.retain(|old| old.id != Some(id));
            saved.push(attachment);
        }

        let mut removed = 0;
        for attachment in stale {
            if let Some(id) = attachment.id {
                removed += tx.execute("DELETE FROM attachments WHERE attachment_id = ?1", [id])?;
            }
        }
        tx.commit()?;
        debug!(
            "Saved note {creation} with {} attachment(s), removed {removed}",
            saved.len()
        );

        let mut stored = note.clone();
        stored.creation = Some(creation);
        stored.last_modification = Some(last_modification);
        stored.attachments = saved;
        Ok(stored)
    }

    /// Moves a note into or out of the archive without touching its
    /// modification time.
    pub fn archive_note(&mut self, note: &Note, archive: bool) -> Result<Note> {
        let mut note = note.clone();
        note.archived = archive;
        let previous = note.attachments.clone();
        self.upsert_note(&note, &previous, Touch::Preserve)
    }

    /// Moves a note into or out of the trash without touching its
    /// modification time.
    pub fn trash_note(&mut self, note: &Note, trash: bool) -> Result<Note> {
        let mut note = note.clone();
        note.trashed = trash;
        let previous = note.attachments.clone();
        self.upsert_note(&note, &previous, Touch::Preserve)
    }

    /// Deletes a note and, unless `policy` keeps them, its attachment rows.
    ///
    /// The two deletions are separate statements; an interruption between
    /// them leaves orphaned attachment rows behind.
    pub fn delete_note(&self, id: i64, policy: AttachmentPolicy) -> Result<DeleteResult> {
        let conn = self.storage.connection();
        let notes_deleted = conn.execute("DELETE FROM notes WHERE creation = ?1", [id])?;
        let attachments_deleted = match policy {
            AttachmentPolicy::Delete => {
                conn.execute("DELETE FROM attachments WHERE note_id = ?1", [id])?
            }
            AttachmentPolicy::Keep => 0,
        };
        debug!("Deleted note {id} ({attachments_deleted} attachment(s))");
        Ok(DeleteResult {
            notes_deleted,
            attachments_deleted,
        })
    }

    /// Deletes every trashed note together with its attachments, one note at a time.
    pub fn empty_trash(&self) -> Result<DeleteResult> {
        let ids: Vec<i64> = {
            let mut stmt = self
                .storage
                .connection()
                .prepare("SELECT creation FROM notes WHERE trashed = 1")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids
        };

        let mut total = DeleteResult::default();
        for id in ids {
            total.absorb(self.delete_note(id, AttachmentPolicy::Delete)?);
        }
        info!("Emptied trash: {} note(s)", total.notes_deleted);
        Ok(total)
    }

    /// Inserts or replaces a single attachment row.
    ///
    /// # Errors
    ///
    /// [`StoreError::ValidationFailed`] if the attachment has no `note_id`.
    pub fn update_attachment(&self, attachment: &Attachment) -> Result<Attachment> {
        if attachment.note_id.is_none() {
            return Err(StoreError::ValidationFailed(
                "attachment is not linked to a note".to_string(),
            ));
        }
        let mut attachment = attachment.clone();
        attachment.id = Some(attachment.id.unwrap_or_else(|| self.ids.next()));
        write_attachment(self.storage.connection(), &attachment)?;
        Ok(attachment)
    }

    pub fn set_reminder_fired(&self, id: i64, fired: bool) -> Result<()> {
        let updated = self.storage.connection().execute(
            "UPDATE notes SET reminder_fired = ?1 WHERE creation = ?2",
            params![fired, id],
        )?;
        if updated == 0 {
            return Err(StoreError::NoteNotFound(id));
        }
        Ok(())
    }

    /// Inserts or replaces a category, assigning an id to a new one.
    pub fn upsert_category(&self, category: &Category) -> Result<Category> {
        let mut category = category.clone();
        let id = category.id.unwrap_or_else(|| self.ids.next());
        category.id = Some(id);
        self.storage.connection().execute(
            "INSERT OR REPLACE INTO categories (category_id, name, description, color)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, category.name, category.description, category.color],
        )?;
        debug!("Saved category {id}");
        Ok(category)
    }

    /// Uncategorizes every note filed under the category, then removes it.
    ///
    /// Returns the number of notes that lost their category.
    pub fn delete_category(&mut self, category_id: i64) -> Result<usize> {
        let tx = self.storage.connection_mut().transaction()?;
        let uncategorized = tx.execute(
            "UPDATE notes SET category_id = NULL WHERE category_id = ?1",
            [category_id],
        )?;
        tx.execute("DELETE FROM categories WHERE category_id = ?1", [category_id])?;
        tx.commit()?;
        debug!("Deleted category {category_id}, uncategorized {uncategorized} note(s)");
        Ok(uncategorized)
    }
}

fn write_attachment(conn: &Connection, attachment: &Attachment) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR REPLACE INTO attachments
            (attachment_id, note_id, uri, name, size, length, mime_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            attachment.id,
            attachment.note_id,
            attachment.uri,
            attachment.name,
            attachment.size,
            attachment.length,
            attachment.mime_type,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::{envelope_salt, test_cipher, TEST_KDF};
    use crate::{Location, SortColumn};
    use tempfile::NamedTempFile;

    fn open_store() -> (NoteStore, NamedTempFile) {
        let temp = NamedTempFile::new().unwrap();
        let settings = Settings {
            password: "pw".to_string(),
            ..Settings::default()
        };
        let store = NoteStore::open_with(
            temp.path(),
            &Migrator::bundled(),
            Box::new(test_cipher()),
            settings,
        )
        .unwrap();
        (store, temp)
    }

    fn save(store: &mut NoteStore, note: Note) -> Note {
        store.upsert_note(&note, &[], Touch::Update).unwrap()
    }

    fn titles(notes: &[Note]) -> Vec<String> {
        notes.iter().map(|n| n.title.clone()).collect()
    }

    fn attachment_rows(store: &NoteStore, note_id: i64) -> i64 {
        store
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM attachments WHERE note_id = ?1",
                [note_id],
                |row| row.get(0),
            )
            .unwrap()
    }

    fn with_attachments(title: &str, uris: &[&str]) -> Note {
        let mut note = Note::new(title, "body");
        note.attachments = uris
            .iter()
            .map(|uri| Attachment::new(*uri, "image/jpeg"))
            .collect();
        note
    }

    #[test]
    fn test_upsert_assigns_ids_and_timestamps() {
        let (mut store, _temp) = open_store();
        let saved = save(&mut store, Note::new("First", "hello"));

        let id = saved.creation.unwrap();
        assert!(saved.last_modification.unwrap() >= id);
        let loaded = store.get_note(id).unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn test_notes_created_together_get_distinct_ids() {
        let (mut store, _temp) = open_store();
        let a = save(&mut store, Note::new("a", ""));
        let b = save(&mut store, Note::new("b", ""));
        assert_ne!(a.creation, b.creation);
        assert_eq!(store.notes_active().unwrap().len(), 2);
    }

    #[test]
    fn test_get_missing_note() {
        let (store, _temp) = open_store();
        assert!(matches!(store.get_note(42), Err(StoreError::NoteNotFound(42))));
    }

    #[test]
    fn test_locked_content_round_trips_and_is_encrypted_at_rest() {
        let (mut store, _temp) = open_store();
        let mut note = Note::new("Diary", "top secret");
        note.locked = true;
        let saved = save(&mut store, note);
        let id = saved.creation.unwrap();

        let at_rest: String = store
            .connection()
            .query_row("SELECT content FROM notes WHERE creation = ?1", [id], |row| {
                row.get(0)
            })
            .unwrap();
        assert_ne!(at_rest, "top secret");
        assert!(!at_rest.contains("secret"));

        assert_eq!(store.get_note(id).unwrap().content, "top secret");
    }

    #[test]
    fn test_unlocked_content_is_stored_as_is() {
        let (mut store, _temp) = open_store();
        let id = save(&mut store, Note::new("Plain", "visible")).creation.unwrap();
        let at_rest: String = store
            .connection()
            .query_row("SELECT content FROM notes WHERE creation = ?1", [id], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(at_rest, "visible");
    }

    #[test]
    fn test_wrong_password_fails_read() {
        let (mut store, _temp) = open_store();
        let mut note = Note::new("Diary", "secret");
        note.locked = true;
        let id = save(&mut store, note).creation.unwrap();

        store.settings_mut().password = "other".to_string();
        assert!(matches!(store.get_note(id), Err(StoreError::Decryption(_))));
    }

    #[test]
    fn test_delete_removes_attachments() {
        let (mut store, _temp) = open_store();
        let saved = save(&mut store, with_attachments("Pics", &["a.jpg", "b.jpg"]));
        let id = saved.creation.unwrap();
        assert_eq!(attachment_rows(&store, id), 2);

        let result = store.delete_note(id, AttachmentPolicy::Delete).unwrap();
        assert_eq!(result.notes_deleted, 1);
        assert_eq!(result.attachments_deleted, 2);
        assert_eq!(attachment_rows(&store, id), 0);
    }

    #[test]
    fn test_delete_can_keep_attachments() {
        let (mut store, _temp) = open_store();
        let saved = save(&mut store, with_attachments("Pics", &["a.jpg"]));
        let id = saved.creation.unwrap();

        let result = store.delete_note(id, AttachmentPolicy::Keep).unwrap();
        assert_eq!(result.attachments_deleted, 0);
        assert_eq!(attachment_rows(&store, id), 1);
        assert!(store.get_note(id).is_err());
    }

    #[test]
    fn test_resaving_unchanged_attachments_is_idempotent() {
        let (mut store, _temp) = open_store();
        let saved = save(&mut store, with_attachments("Pics", &["a.jpg", "b.jpg"]));
        let id = saved.creation.unwrap();

        let again = store
            .upsert_note(&saved, &saved.attachments, Touch::Update)
            .unwrap();
        assert_eq!(again.attachments, saved.attachments);
        assert_eq!(attachment_rows(&store, id), 2);
        assert_eq!(store.note_attachments(id).unwrap(), saved.attachments);
    }

    #[test]
    fn test_removed_attachment_is_deleted_alone() {
        let (mut store, _temp) = open_store();
        let saved = save(&mut store, with_attachments("Pics", &["a.jpg", "b.jpg", "c.jpg"]));
        let id = saved.creation.unwrap();
        let removed = saved.attachments[1].clone();

        let mut edited = saved.clone();
        edited.attachments.remove(1);
        store
            .upsert_note(&edited, &saved.attachments, Touch::Update)
            .unwrap();

        let remaining = store.note_attachments(id).unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|a| a.id != removed.id));
        assert_eq!(remaining, edited.attachments);
    }

    #[test]
    fn test_added_attachment_is_inserted() {
        let (mut store, _temp) = open_store();
        let saved = save(&mut store, with_attachments("Pics", &["a.jpg"]));
        let id = saved.creation.unwrap();

        let mut edited = saved.clone();
        edited.attachments.push(Attachment::new("b.mp4", "video/mp4"));
        let stored = store
            .upsert_note(&edited, &saved.attachments, Touch::Update)
            .unwrap();
        assert!(stored.attachments.iter().all(|a| a.id.is_some()));
        assert_eq!(attachment_rows(&store, id), 2);
    }

    #[test]
    fn test_archive_preserves_last_modification() {
        let (mut store, _temp) = open_store();
        let mut note = Note::new("Old", "");
        note.creation = Some(1_000);
        note.last_modification = Some(2_000);
        let saved = store.upsert_note(&note, &[], Touch::Preserve).unwrap();
        assert_eq!(saved.last_modification, Some(2_000));

        store.archive_note(&saved, true).unwrap();
        let loaded = store.get_note(1_000).unwrap();
        assert!(loaded.archived);
        assert_eq!(loaded.last_modification, Some(2_000));

        let touched = store.upsert_note(&loaded, &[], Touch::Update).unwrap();
        assert!(touched.last_modification.unwrap() > 2_000);
    }

    #[test]
    fn test_trash_is_hidden_from_other_views() {
        let (mut store, _temp) = open_store();
        let keep = save(&mut store, Note::new("keep me", ""));
        let bin = save(&mut store, Note::new("bin me", ""));
        store.trash_note(&bin, true).unwrap();

        assert_eq!(titles(&store.notes_active().unwrap()), vec!["keep me"]);
        assert_eq!(titles(&store.notes_trashed().unwrap()), vec!["bin me"]);
        assert!(store
            .notes_by_pattern("me", &Navigation::Notes)
            .unwrap()
            .iter()
            .all(|n| n.creation == keep.creation));
        assert_eq!(
            titles(&store.notes_by_pattern("bin", &Navigation::Trash).unwrap()),
            vec!["bin me"]
        );
        assert_eq!(store.all_notes(None).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_trash() {
        let (mut store, _temp) = open_store();
        let a = save(&mut store, with_attachments("a", &["1.jpg"]));
        let b = save(&mut store, with_attachments("b", &["2.jpg", "3.jpg"]));
        save(&mut store, Note::new("c", ""));
        store.trash_note(&a, true).unwrap();
        store.trash_note(&b, true).unwrap();

        let result = store.empty_trash().unwrap();
        assert_eq!(result.notes_deleted, 2);
        assert_eq!(result.attachments_deleted, 3);
        assert!(store.notes_trashed().unwrap().is_empty());
        assert_eq!(titles(&store.notes_active().unwrap()), vec!["c"]);
    }

    #[test]
    fn test_title_sort_falls_back_to_content() {
        let (mut store, _temp) = open_store();
        save(&mut store, Note::new("", "beta"));
        save(&mut store, Note::new("", "alpha"));
        save(&mut store, Note::new("Gamma", ""));

        let contents: Vec<String> = store
            .notes_active()
            .unwrap()
            .into_iter()
            .map(|n| format!("{}{}", n.title, n.content))
            .collect();
        assert_eq!(contents, vec!["alpha", "beta", "Gamma"]);
    }

    #[test]
    fn test_unset_reminders_sort_last() {
        let (mut store, _temp) = open_store();
        store.settings_mut().sorting_column = SortColumn::Reminder;
        save(&mut store, Note::new("none", ""));
        let mut late = Note::new("late", "");
        late.reminder = Some(2_000_000);
        save(&mut store, late);
        let mut early = Note::new("early", "");
        early.reminder = Some(1_000_000);
        save(&mut store, early);

        assert_eq!(
            titles(&store.notes_active().unwrap()),
            vec!["early", "late", "none"]
        );
    }

    #[test]
    fn test_reminder_views() {
        let (mut store, _temp) = open_store();
        let now = now_millis();
        let mut past = Note::new("past", "");
        past.reminder = Some(now - 60_000);
        let past = save(&mut store, past);
        let mut future = Note::new("future", "");
        future.reminder = Some(now + 86_400_000 * 400);
        save(&mut store, future);
        save(&mut store, Note::new("none", ""));

        assert_eq!(
            titles(&store.notes_with_reminder(false).unwrap()),
            vec!["past", "future"]
        );
        assert_eq!(titles(&store.notes_with_reminder(true).unwrap()), vec!["future"]);

        store.set_reminder_fired(past.creation.unwrap(), true).unwrap();
        assert_eq!(
            titles(&store.notes_with_reminder_not_fired().unwrap()),
            vec!["future"]
        );
        assert!(store.get_note(past.creation.unwrap()).unwrap().reminder_fired);
        assert!(matches!(
            store.set_reminder_fired(1, true),
            Err(StoreError::NoteNotFound(1))
        ));
    }

    #[test]
    fn test_today_reminders() {
        let (mut store, _temp) = open_store();
        let mut today = Note::new("today", "");
        today.reminder = Some(now_millis());
        save(&mut store, today);
        let mut later = Note::new("later", "");
        later.reminder = Some(now_millis() + 86_400_000 * 3);
        save(&mut store, later);

        assert_eq!(titles(&store.today_reminders().unwrap()), vec!["today"]);
    }

    #[test]
    fn test_pattern_wildcards_match_literally() {
        let (mut store, _temp) = open_store();
        for title in ["100% sure", "100 percent", "a_b", "axb", "it's", "its"] {
            save(&mut store, Note::new(title, ""));
        }
        let search = |p: &str| titles(&store.notes_by_pattern(p, &Navigation::Notes).unwrap());

        assert_eq!(search("100%"), vec!["100% sure"]);
        assert_eq!(search("a_b"), vec!["a_b"]);
        assert_eq!(search("it's"), vec!["it's"]);
    }

    #[test]
    fn test_locked_notes_match_on_title_only() {
        let (mut store, _temp) = open_store();
        let mut diary = Note::new("Diary", "secret stuff");
        diary.locked = true;
        save(&mut store, diary);
        save(&mut store, Note::new("Open", "secret recipe"));

        assert_eq!(
            titles(&store.notes_by_pattern("secret", &Navigation::Notes).unwrap()),
            vec!["Open"]
        );
        assert_eq!(
            titles(&store.notes_by_pattern("diary", &Navigation::Notes).unwrap()),
            vec!["Diary"]
        );
        assert_eq!(titles(&store.masked().unwrap()), vec!["Diary"]);
        assert_eq!(titles(&store.notes_with_lock(false).unwrap()), vec!["Open"]);
    }

    #[test]
    fn test_search_within_category_and_archive() {
        let (mut store, _temp) = open_store();
        let work = store.upsert_category(&Category::new("Work")).unwrap();
        let mut filed = Note::new("report draft", "");
        filed.category = Some(work.clone());
        save(&mut store, filed);
        let loose = save(&mut store, Note::new("report idea", ""));
        store.archive_note(&loose, true).unwrap();

        let nav = Navigation::Category(work.id.unwrap());
        assert_eq!(
            titles(&store.notes_by_pattern("report", &nav).unwrap()),
            vec!["report draft"]
        );
        assert_eq!(
            titles(&store.notes_by_pattern("report", &Navigation::Archive).unwrap()),
            vec!["report idea"]
        );
    }

    #[test]
    fn test_tag_search_requires_all_whole_tags() {
        let (mut store, _temp) = open_store();
        save(&mut store, Note::new("has a and b", ""));
        save(&mut store, Note::new("has only a", ""));
        save(&mut store, Note::new("has ab", ""));

        let tags = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            titles(&store.notes_by_tags(&tags, &Navigation::Notes).unwrap()),
            vec!["has a and b"]
        );
        assert_eq!(
            titles(&store.notes_by_tag("a", &Navigation::Notes).unwrap()),
            vec!["has a and b", "has only a"]
        );
    }

    #[test]
    fn test_empty_tag_list_selects_nothing() {
        let (mut store, _temp) = open_store();
        save(&mut store, Note::new("#a", ""));
        save(&mut store, Note::new("plain", ""));

        assert!(store.notes_by_tags(&[], &Navigation::Notes).unwrap().is_empty());
        assert!(store.notes_by_tag("", &Navigation::Notes).unwrap().is_empty());
        assert!(store.notes_by_tag(" , ", &Navigation::Notes).unwrap().is_empty());
    }

    #[test]
    fn test_tags_are_aggregated_per_view() {
        let (mut store, _temp) = open_store();
        let first = save(&mut store, Note::new("Shopping", "Buy #milk and #bread"));
        save(&mut store, Note::new("#milk", "again"));
        let binned = save(&mut store, Note::new("old", "#stale"));
        store.trash_note(&binned, true).unwrap();

        let tags = store.tags(None, &Navigation::Notes).unwrap();
        let summary: Vec<(&str, usize)> =
            tags.iter().map(|t| (t.text.as_str(), t.count)).collect();
        assert_eq!(summary, vec![("bread", 1), ("milk", 2)]);

        let trash_tags = store.tags(None, &Navigation::Trash).unwrap();
        assert_eq!(trash_tags.len(), 1);
        assert_eq!(trash_tags[0].text, "stale");

        let own = store.tags(first.creation, &Navigation::Notes).unwrap();
        assert_eq!(own.len(), 2);
    }

    #[test]
    fn test_delete_category_uncategorizes_notes() {
        let (mut store, _temp) = open_store();
        let work = store.upsert_category(&Category::new("Work")).unwrap();
        let home = store.upsert_category(&Category::new("Home")).unwrap();
        let work_id = work.id.unwrap();

        let mut filed = Vec::new();
        for title in ["one", "two", "three"] {
            let mut note = Note::new(title, "content");
            note.category = Some(work.clone());
            note.checklist = true;
            filed.push(save(&mut store, note));
        }
        let mut other = Note::new("other", "");
        other.category = Some(home.clone());
        let other = save(&mut store, other);

        assert_eq!(store.categorized_count(work_id).unwrap(), 3);
        assert_eq!(store.delete_category(work_id).unwrap(), 3);

        assert!(store.category(work_id).unwrap().is_none());
        for note in &filed {
            let loaded = store.get_note(note.creation.unwrap()).unwrap();
            assert!(loaded.category.is_none());
            assert_eq!(loaded.title, note.title);
            assert_eq!(loaded.content, "content");
            assert!(loaded.checklist);
            assert_eq!(loaded.last_modification, note.last_modification);
        }
        let other = store.get_note(other.creation.unwrap()).unwrap();
        assert_eq!(other.category.unwrap().name, "Home");
        assert_eq!(store.notes_uncategorized().unwrap().len(), 3);
    }

    #[test]
    fn test_categories_count_only_untrashed_notes() {
        let (mut store, _temp) = open_store();
        let work = store.upsert_category(&Category::new("Work")).unwrap();
        store.upsert_category(&Category::new("")).unwrap();
        store.upsert_category(&Category::new("archive")).unwrap();

        let mut a = Note::new("a", "");
        a.category = Some(work.clone());
        save(&mut store, a);
        let mut b = Note::new("b", "");
        b.category = Some(work.clone());
        let b = save(&mut store, b);
        store.trash_note(&b, true).unwrap();

        let summaries = store.categories().unwrap();
        let names: Vec<&str> = summaries.iter().map(|s| s.category.name.as_str()).collect();
        assert_eq!(names, vec!["archive", "Work", ""]);
        assert_eq!(summaries[1].note_count, 1);
        assert_eq!(store.categorized_count(work.id.unwrap()).unwrap(), 2);
    }

    #[test]
    fn test_category_view_honours_archived_filter() {
        let (mut store, _temp) = open_store();
        let work = store.upsert_category(&Category::new("Work")).unwrap();
        let work_id = work.id.unwrap();
        let mut live = Note::new("live", "");
        live.category = Some(work.clone());
        save(&mut store, live);
        let mut old = Note::new("old", "");
        old.category = Some(work.clone());
        old.archived = true;
        save(&mut store, old);

        assert_eq!(store.notes_by_category(work_id).unwrap().len(), 2);
        store
            .settings_mut()
            .set_filter_archived_in_category(work_id, true);
        assert_eq!(titles(&store.notes_by_category(work_id).unwrap()), vec!["live"]);
        assert_eq!(
            titles(&store.all_notes(Some(&Navigation::Category(work_id))).unwrap()),
            vec!["live"]
        );
    }

    #[test]
    fn test_checklists_and_location() {
        let (mut store, _temp) = open_store();
        let mut open = Note::new("open", "[ ] eggs\n[x] ham");
        open.checklist = true;
        save(&mut store, open);
        let mut done = Note::new("done", "[x] eggs");
        done.checklist = true;
        save(&mut store, done);
        let mut placed = Note::new("placed", "");
        placed.location = Some(Location {
            latitude: 45.46,
            longitude: 9.19,
            address: Some("Milan".to_string()),
        });
        save(&mut store, placed);

        let mut lists = titles(&store.checklists().unwrap());
        lists.sort();
        assert_eq!(lists, vec!["done", "open"]);
        assert_eq!(
            titles(&store.uncompleted_checklists(&Navigation::Notes).unwrap()),
            vec!["open"]
        );
        let located = store.notes_with_location().unwrap();
        assert_eq!(titles(&located), vec!["placed"]);
        assert_eq!(
            located[0].location.as_ref().unwrap().address.as_deref(),
            Some("Milan")
        );
    }

    #[test]
    fn test_update_attachment_requires_note() {
        let (mut store, _temp) = open_store();
        let orphan = Attachment::new("x.jpg", "image/jpeg");
        assert!(matches!(
            store.update_attachment(&orphan),
            Err(StoreError::ValidationFailed(_))
        ));

        let saved = save(&mut store, with_attachments("Pics", &["a.jpg"]));
        let mut renamed = saved.attachments[0].clone();
        renamed.name = Some("holiday".to_string());
        store.update_attachment(&renamed).unwrap();
        let loaded = store.note_attachments(saved.creation.unwrap()).unwrap();
        assert_eq!(loaded, vec![renamed]);
    }

    #[test]
    fn test_stats_over_store() {
        let (mut store, _temp) = open_store();
        store.upsert_category(&Category::new("Work")).unwrap();
        save(&mut store, with_attachments("one #tag", &["a.jpg"]));
        let two = save(&mut store, Note::new("two", "words here"));
        store.trash_note(&two, true).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.categories, 1);
        assert_eq!(stats.notes_active, 1);
        assert_eq!(stats.notes_trashed, 1);
        assert_eq!(stats.tags, 1);
        assert_eq!(stats.attachments, 1);
        assert_eq!(stats.images, 1);
    }

    #[test]
    fn test_settings_are_saved() {
        let (mut store, temp) = open_store();
        store.settings_mut().sorting_column = SortColumn::Creation;
        let path = temp.path().with_extension("settings.json");
        store.save_settings(&path).unwrap();
        assert_eq!(load_settings(&path).sorting_column, SortColumn::Creation);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_upsert_rolls_back_when_an_attachment_fails() {
        let (mut store, _temp) = open_store();
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_attachments BEFORE INSERT ON attachments
                 BEGIN SELECT RAISE(ABORT, 'x'); END;",
            )
            .unwrap();

        let note = with_attachments("doomed", &["content://one"]);
        assert!(store.upsert_note(&note, &[], Touch::Update).is_err());

        let notes: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(notes, 0);
    }

    #[test]
    fn test_key_salt_is_shared_across_sessions() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = StoreConfig::new(dir.path().join("notes.db"));
        config.kdf = TEST_KDF;

        let stored_salt = |store: &NoteStore, id: i64| {
            let raw: String = store
                .connection()
                .query_row("SELECT content FROM notes WHERE creation = ?1", [id], |row| {
                    row.get(0)
                })
                .unwrap();
            envelope_salt(&raw).unwrap()
        };
        let mut locked = Note::new("first", "one");
        locked.creation = Some(1);
        locked.locked = true;

        let (first_id, first_salt) = {
            let mut store = NoteStore::open(&config).unwrap();
            let id = save(&mut store, locked.clone()).creation.unwrap();
            (id, stored_salt(&store, id))
        };

        let mut store = NoteStore::open(&config).unwrap();
        locked.creation = Some(2);
        locked.content = "two".to_string();
        let second_id = save(&mut store, locked).creation.unwrap();

        assert_eq!(stored_salt(&store, second_id), first_salt);
        assert_eq!(store.storage.key_salt().unwrap(), first_salt);
        assert_eq!(store.get_note(first_id).unwrap().content, "one");
        assert_eq!(store.get_note(second_id).unwrap().content, "two");
    }

    #[test]
    fn test_open_from_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings_path = dir.path().join("settings.json");
        let settings = Settings {
            sorting_column: SortColumn::Creation,
            ..Settings::default()
        };
        save_settings(&settings_path, &settings).unwrap();

        let mut config = StoreConfig::new(dir.path().join("notes.db"));
        config.settings_path = Some(settings_path);
        let store = NoteStore::open(&config).unwrap();
        assert_eq!(store.settings().sorting_column, SortColumn::Creation);
        assert!(store.notes_active().unwrap().is_empty());
    }
}
