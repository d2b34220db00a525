//! Usage statistics over the whole database.

use crate::core::clock::is_future;
use crate::core::query::UNCHECKED_SYM;
use crate::core::tags::extract_tags;
use crate::{Attachment, Note};
use serde::{Deserialize, Serialize};

pub const MIME_TYPE_IMAGE: &str = "image/jpeg";
pub const MIME_TYPE_VIDEO: &str = "video/mp4";
pub const MIME_TYPE_AUDIO: &str = "audio/amr";
pub const MIME_TYPE_SKETCH: &str = "image/png";
pub const MIME_TYPE_FILES: &str = "file/*";

/// Marker of a checked item in checklist note content.
pub const CHECKED_SYM: &str = "[x] ";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub categories: usize,
    pub notes_active: usize,
    pub notes_archived: usize,
    pub notes_trashed: usize,
    /// Reminders already due.
    pub reminders: usize,
    pub reminders_future: usize,
    pub notes_checklist: usize,
    pub notes_masked: usize,
    /// Distinct tags per note, summed over all notes.
    pub tags: usize,
    pub locations: usize,
    pub words: usize,
    pub words_max: usize,
    pub words_avg: usize,
    pub chars: usize,
    pub chars_max: usize,
    pub chars_avg: usize,
    pub attachments: usize,
    pub images: usize,
    pub videos: usize,
    pub audio_recordings: usize,
    pub sketches: usize,
    pub files: usize,
}

/// Words in title and content: maximal runs of letters.
pub fn count_words(note: &Note) -> usize {
    [note.title.as_str(), note.content.as_str()]
        .iter()
        .flat_map(|text| text.split(|c: char| !c.is_alphabetic()))
        .filter(|word| !word.is_empty())
        .count()
}

/// Characters in title and content, not counting checklist markers.
pub fn count_chars(note: &Note) -> usize {
    let content = if note.checklist {
        note.content.replace(UNCHECKED_SYM, "").replace(CHECKED_SYM, "")
    } else {
        note.content.clone()
    };
    note.title.chars().count() + content.chars().count()
}

/// Computes statistics over every note (trashed included) and attachment.
///
/// `now` decides which reminders count as past and which as future.
pub fn compute_stats(
    notes: &[Note],
    attachments: &[Attachment],
    categories: usize,
    now: i64,
) -> Stats {
    let mut stats = Stats {
        categories,
        ..Stats::default()
    };

    for note in notes {
        if note.trashed {
            stats.notes_trashed += 1;
        } else if note.archived {
            stats.notes_archived += 1;
        } else {
            stats.notes_active += 1;
        }
        if is_future(note.reminder, now) {
            stats.reminders_future += 1;
        } else if note.reminder.is_some_and(|alarm| alarm > 0) {
            stats.reminders += 1;
        }
        if note.checklist {
            stats.notes_checklist += 1;
        }
        if note.locked {
            stats.notes_masked += 1;
        }
        stats.tags += extract_tags(&note.text()).len();
        if note.location.as_ref().is_some_and(|l| l.longitude != 0.0) {
            stats.locations += 1;
        }

        let words = count_words(note);
        let chars = count_chars(note);
        stats.words += words;
        stats.chars += chars;
        stats.words_max = stats.words_max.max(words);
        stats.chars_max = stats.chars_max.max(chars);
    }
    let divisor = notes.len().max(1);
    stats.words_avg = stats.words / divisor;
    stats.chars_avg = stats.chars / divisor;

    stats.attachments = attachments.len();
    for attachment in attachments {
        match attachment.mime_type.as_str() {
            MIME_TYPE_IMAGE => stats.images += 1,
            MIME_TYPE_VIDEO => stats.videos += 1,
            MIME_TYPE_AUDIO => stats.audio_recordings += 1,
            MIME_TYPE_SKETCH => stats.sketches += 1,
            MIME_TYPE_FILES => stats.files += 1,
            _ => {}
        }
    }
    stats
}
