use serde::{Deserialize, Serialize};

/// Geographic position a note was written at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}

/// A file attached to a note.
///
/// `id` stays `None` until the attachment is first persisted; the store then
/// assigns a millisecond timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: Option<i64>,
    pub note_id: Option<i64>,
    pub uri: String,
    pub mime_type: String,
    pub name: Option<String>,
    pub size: i64,
    pub length: i64,
}

impl Attachment {
    pub fn new(uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            id: None,
            note_id: None,
            uri: uri.into(),
            mime_type: mime_type.into(),
            name: None,
            size: 0,
            length: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            color: None,
        }
    }
}

/// A category together with the number of non-trashed notes filed under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category: Category,
    pub note_count: usize,
}

/// A tag found in note text and the number of notes it appears in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub text: String,
    pub count: usize,
}

/// A note as seen by the presentation layer.
///
/// `content` is always plaintext here; encryption of locked notes happens at
/// the storage boundary. `creation` doubles as the primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub creation: Option<i64>,
    pub last_modification: Option<i64>,
    pub title: String,
    pub content: String,
    pub archived: bool,
    pub trashed: bool,
    pub locked: bool,
    pub checklist: bool,
    pub reminder: Option<i64>,
    pub recurrence_rule: Option<String>,
    pub reminder_fired: bool,
    pub location: Option<Location>,
    pub category: Option<Category>,
    pub attachments: Vec<Attachment>,
}

impl Note {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            creation: None,
            last_modification: None,
            title: title.into(),
            content: content.into(),
            archived: false,
            trashed: false,
            locked: false,
            checklist: false,
            reminder: None,
            recurrence_rule: None,
            reminder_fired: false,
            location: None,
            category: None,
            attachments: Vec::new(),
        }
    }

    /// The primary key, once the note has been persisted.
    pub fn id(&self) -> Option<i64> {
        self.creation
    }

    /// Title and content joined by a space; the text tags are searched in.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }
}
