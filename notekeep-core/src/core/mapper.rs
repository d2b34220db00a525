//! Row mapping between SQLite and the domain types.
//!
//! Every note query selects [`NOTE_COLUMNS`] from [`NOTE_SOURCE`], so one
//! mapper serves all of them.

use crate::core::crypto::{open_content, NoteCipher};
use crate::{Attachment, Category, Location, Note, Result};

/// Projection shared by every note query. Order matches [`map_note_row`].
pub const NOTE_COLUMNS: &str = "n.creation, n.last_modification, n.title, n.content, \
     n.archived, n.trashed, n.alarm, n.reminder_fired, n.recurrence_rule, \
     n.latitude, n.longitude, n.address, n.locked, n.checklist, \
     c.category_id, c.name, c.description, c.color";

pub const NOTE_SOURCE: &str =
    "notes n LEFT JOIN categories c ON c.category_id = n.category_id";

pub const ATTACHMENT_COLUMNS: &str =
    "attachment_id, note_id, uri, name, size, length, mime_type";

pub const CATEGORY_COLUMNS: &str = "category_id, name, description, color";

/// Raw column values of one note row, content still as stored.
#[derive(Debug)]
pub struct NoteRow {
    creation: i64,
    last_modification: Option<i64>,
    title: Option<String>,
    content: Option<String>,
    archived: Option<i64>,
    trashed: Option<i64>,
    alarm: Option<i64>,
    reminder_fired: Option<i64>,
    recurrence_rule: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    address: Option<String>,
    locked: Option<i64>,
    checklist: Option<i64>,
    category_id: Option<i64>,
    category_name: Option<String>,
    category_description: Option<String>,
    category_color: Option<String>,
}

/// Reads one row of a [`NOTE_COLUMNS`] projection.
pub fn map_note_row(row: &rusqlite::Row) -> rusqlite::Result<NoteRow> {
    Ok(NoteRow {
        creation: row.get(0)?,
        last_modification: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        archived: row.get(4)?,
        trashed: row.get(5)?,
        alarm: row.get(6)?,
        reminder_fired: row.get(7)?,
        recurrence_rule: row.get(8)?,
        latitude: row.get(9)?,
        longitude: row.get(10)?,
        address: row.get(11)?,
        locked: row.get(12)?,
        checklist: row.get(13)?,
        category_id: row.get(14)?,
        category_name: row.get(15)?,
        category_description: row.get(16)?,
        category_color: row.get(17)?,
    })
}

fn flag(value: Option<i64>) -> bool {
    value == Some(1)
}

/// Converts a [`NoteRow`] into a [`Note`], decrypting locked content.
///
/// Attachments are loaded separately and left empty here.
pub fn note_from_row(row: NoteRow, cipher: &dyn NoteCipher, passphrase: &str) -> Result<Note> {
    let locked = flag(row.locked);
    let content = open_content(cipher, row.content.as_deref().unwrap_or_default(), locked, passphrase)?;

    let location = match (row.latitude, row.longitude) {
        (Some(latitude), Some(longitude)) => Some(Location {
            latitude,
            longitude,
            address: row.address,
        }),
        _ => None,
    };

    let category = match row.category_id {
        Some(id) if id != 0 => Some(Category {
            id: Some(id),
            name: row.category_name.unwrap_or_default(),
            description: row.category_description,
            color: row.category_color,
        }),
        _ => None,
    };

    Ok(Note {
        creation: Some(row.creation),
        last_modification: row.last_modification,
        title: row.title.unwrap_or_default(),
        content,
        archived: flag(row.archived),
        trashed: flag(row.trashed),
        locked,
        checklist: flag(row.checklist),
        reminder: row.alarm,
        recurrence_rule: row.recurrence_rule.filter(|rule| !rule.is_empty()),
        reminder_fired: flag(row.reminder_fired),
        location,
        category,
        attachments: Vec::new(),
    })
}

/// Reads one row of an [`ATTACHMENT_COLUMNS`] projection.
pub fn map_attachment_row(row: &rusqlite::Row) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: Some(row.get(0)?),
        note_id: row.get(1)?,
        uri: row.get(2)?,
        name: row.get(3)?,
        size: row.get::<_, Option<i64>>(4)?.unwrap_or_default(),
        length: row.get::<_, Option<i64>>(5)?.unwrap_or_default(),
        mime_type: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
    })
}

/// Reads one row of a [`CATEGORY_COLUMNS`] projection.
pub fn map_category_row(row: &rusqlite::Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: Some(row.get(0)?),
        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        description: row.get(2)?,
        color: row.get(3)?,
    })
}
