//! Attachment policy and result types for note removal.
//!
//! Used by [`NoteStore::delete_note`](super::store::NoteStore::delete_note)
//! and [`NoteStore::empty_trash`](super::store::NoteStore::empty_trash).
//!
//! ## Policies
//!
//! - [`AttachmentPolicy::Delete`] removes the note row and every attachment
//!   row that references it.
//! - [`AttachmentPolicy::Keep`] removes only the note row; the attachment rows
//!   stay behind, for instance while the note is being moved to another
//!   database.
//!
//! ## Serialization
//!
//! `AttachmentPolicy` serializes as a PascalCase string and `DeleteResult`
//! with camelCase fields, matching the other IPC-facing types.
//!
//! ```rust
//! use notekeep_core::{AttachmentPolicy, DeleteResult};
//!
//! let json = serde_json::to_string(&AttachmentPolicy::Keep).unwrap();
//! assert_eq!(json, r#""Keep""#);
//!
//! let result = DeleteResult { notes_deleted: 1, attachments_deleted: 2 };
//! let json = serde_json::to_string(&result).unwrap();
//! assert!(json.contains("attachmentsDeleted"));
//! ```

use serde::{Deserialize, Serialize};

/// Determines what happens to a note's attachment rows when the note is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AttachmentPolicy {
    /// Delete the attachment rows together with the note.
    #[default]
    Delete,

    /// Leave the attachment rows in place.
    Keep,
}

/// The outcome of a delete operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    /// Number of note rows removed.
    pub notes_deleted: usize,

    /// Number of attachment rows removed.
    pub attachments_deleted: usize,
}

impl DeleteResult {
    /// Adds the counts of `other` to `self`.
    pub fn absorb(&mut self, other: DeleteResult) {
        self.notes_deleted += other.notes_deleted;
        self.attachments_deleted += other.attachments_deleted;
    }
}
