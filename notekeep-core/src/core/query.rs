//! Translation of a logical scope and sort preference into SQL.
//!
//! Every query reads from the same notes/categories join (see
//! [`mapper`](super::mapper)); a [`Scope`] contributes the WHERE clause and the
//! sort preference the ORDER BY. Values are always bound as positional
//! parameters, never spliced into the SQL text.

use crate::core::mapper::{NOTE_COLUMNS, NOTE_SOURCE};
use crate::SortColumn;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// Reminder sort key used for notes without a reminder: 9999-12-31T23:59:59.999Z.
///
/// Larger than any real reminder, so unset reminders always collate last.
pub const REMINDER_SORT_SENTINEL: i64 = 253_402_300_799_999;

/// Marker of an unchecked item in checklist note content.
pub const UNCHECKED_SYM: &str = "[ ] ";

const NOT_TRASHED: &str = "n.trashed IS NOT 1";
const TRASHED: &str = "n.trashed = 1";

/// The view the user is currently looking at.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Navigation {
    #[default]
    Notes,
    Archive,
    Reminders,
    Trash,
    Uncategorized,
    Category(i64),
}

/// Which notes a query returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    /// Every row, trashed included. Used for statistics, not for a view.
    Everything,
    /// The note with this id.
    Id(i64),
    /// Every non-trashed note.
    All,
    Active,
    Archived,
    Trashed,
    /// Notes with a reminder; `filter_past` drops reminders already due.
    Reminders { filter_past: bool },
    RemindersNotFired,
    /// Notes whose reminder falls on the current UTC day.
    TodayReminders,
    Uncategorized,
    Category { id: i64, filter_archived: bool },
    /// Loose superset of notes containing every tag; callers narrow it with
    /// a [`TagFilter`](super::tags::TagFilter).
    Tags { tags: Vec<String>, navigation: Navigation },
    Locked(bool),
    Checklists,
    UncompletedChecklists { navigation: Navigation },
    WithLocation,
    /// Substring search over title and content.
    Pattern { pattern: String, navigation: Navigation },
    /// Notes that may contain a tag marker, optionally a single one.
    Tagged { note: Option<i64>, navigation: Navigation },
}

impl Scope {
    /// The navigation a search scope was issued from.
    pub fn navigation(&self) -> Option<&Navigation> {
        match self {
            Self::Tags { navigation, .. }
            | Self::UncompletedChecklists { navigation }
            | Self::Pattern { navigation, .. }
            | Self::Tagged { navigation, .. } => Some(navigation),
            _ => None,
        }
    }

    /// Reminder views always sort by reminder, whatever the preference says.
    pub fn forces_reminder_sort(&self) -> bool {
        match self {
            Self::Reminders { .. } | Self::RemindersNotFired | Self::TodayReminders => true,
            other => other.navigation() == Some(&Navigation::Reminders),
        }
    }

    pub fn is_ordered(&self) -> bool {
        !matches!(self, Self::TodayReminders | Self::Checklists)
    }
}

/// A complete SELECT over the notes join plus its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Default)]
struct Filter {
    conditions: Vec<String>,
    params: Vec<Value>,
}

impl Filter {
    fn and(&mut self, condition: impl Into<String>) {
        self.conditions.push(condition.into());
    }

    fn and_with(&mut self, condition: impl Into<String>, params: impl IntoIterator<Item = Value>) {
        self.conditions.push(condition.into());
        self.params.extend(params);
    }

    fn trash_for(&mut self, navigation: &Navigation) {
        self.and(if *navigation == Navigation::Trash {
            TRASHED
        } else {
            NOT_TRASHED
        });
    }
}

/// Escapes `\`, `%` and `_` for use in `LIKE ... ESCAPE '\'`.
pub fn escape_like(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn like_contains(literal: &str) -> Value {
    Value::Text(format!("%{}%", escape_like(literal)))
}

/// Builds note queries for one sort preference.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    sort: SortColumn,
    now: i64,
}

impl QueryBuilder {
    /// `now` (epoch millis) is the reference point for time-relative scopes.
    pub fn new(sort: SortColumn, now: i64) -> Self {
        Self { sort, now }
    }

    pub fn build(&self, scope: &Scope) -> BuiltQuery {
        let filter = self.filter(scope);
        let mut sql = format!("SELECT {NOTE_COLUMNS} FROM {NOTE_SOURCE}");
        if !filter.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.conditions.join(" AND "));
        }
        if let Some(order) = self.order_by(scope) {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }
        BuiltQuery {
            sql,
            params: filter.params,
        }
    }

    /// The sort column actually applied to `scope`.
    pub fn effective_sort(&self, scope: &Scope) -> SortColumn {
        if scope.forces_reminder_sort() {
            SortColumn::Reminder
        } else {
            self.sort
        }
    }

    /// ORDER BY expression for `scope`, or `None` for unordered scopes.
    pub fn order_by(&self, scope: &Scope) -> Option<String> {
        if !scope.is_ordered() {
            return None;
        }
        let sort = self.effective_sort(scope);
        let (expression, direction) = match sort {
            // Blank titles still order by their body text.
            SortColumn::Title => (
                "IFNULL(n.title, '') || IFNULL(n.content, '')".to_string(),
                "ASC",
            ),
            SortColumn::Reminder => (
                format!("IFNULL(n.alarm, {REMINDER_SORT_SENTINEL})"),
                "ASC",
            ),
            SortColumn::Creation => ("n.creation".to_string(), "DESC"),
            SortColumn::LastModification => ("n.last_modification".to_string(), "DESC"),
        };
        Some(format!("{expression} COLLATE NOCASE {direction}"))
    }

    fn filter(&self, scope: &Scope) -> Filter {
        let mut f = Filter::default();
        match scope {
            Scope::Everything => {}
            Scope::Id(id) => f.and_with("n.creation = ?", [Value::Integer(*id)]),
            Scope::All => f.and(NOT_TRASHED),
            Scope::Active => {
                f.and("n.archived IS NOT 1");
                f.and(NOT_TRASHED);
            }
            Scope::Archived => {
                f.and("n.archived = 1");
                f.and(NOT_TRASHED);
            }
            Scope::Trashed => f.and(TRASHED),
            Scope::Reminders { filter_past } => {
                if *filter_past {
                    f.and_with("n.alarm >= ?", [Value::Integer(self.now)]);
                } else {
                    f.and("n.alarm IS NOT NULL");
                }
                f.and("n.archived IS NOT 1");
                f.and(NOT_TRASHED);
            }
            Scope::RemindersNotFired => {
                f.and("n.alarm IS NOT NULL");
                f.and("n.reminder_fired IS NOT 1");
                f.and("n.archived IS NOT 1");
                f.and(NOT_TRASHED);
            }
            Scope::TodayReminders => {
                f.and_with(
                    "DATE(n.alarm / 1000, 'unixepoch') = DATE(? / 1000, 'unixepoch')",
                    [Value::Integer(self.now)],
                );
                f.and(NOT_TRASHED);
            }
            Scope::Uncategorized => {
                f.and("(n.category_id IS NULL OR n.category_id = 0)");
                f.and(NOT_TRASHED);
            }
            Scope::Category { id, filter_archived } => {
                f.and_with("n.category_id = ?", [Value::Integer(*id)]);
                f.and(NOT_TRASHED);
                if *filter_archived {
                    f.and("n.archived IS NOT 1");
                }
            }
            Scope::Tags { tags, navigation } => {
                for tag in tags {
                    let pattern = like_contains(tag);
                    f.and_with(
                        "(n.content LIKE ? ESCAPE '\\' OR n.title LIKE ? ESCAPE '\\')",
                        [pattern.clone(), pattern],
                    );
                }
                f.trash_for(navigation);
            }
            Scope::Locked(locked) => {
                f.and(if *locked { "n.locked = 1" } else { "n.locked IS NOT 1" });
                f.and(NOT_TRASHED);
            }
            Scope::Checklists => {
                f.and("n.checklist = 1");
                f.and(NOT_TRASHED);
            }
            Scope::UncompletedChecklists { navigation } => {
                f.and("n.checklist = 1");
                f.and_with("n.content LIKE ? ESCAPE '\\'", [like_contains(UNCHECKED_SYM)]);
                f.trash_for(navigation);
            }
            Scope::WithLocation => {
                f.and("n.longitude IS NOT NULL AND n.longitude != 0");
                f.and(NOT_TRASHED);
            }
            Scope::Pattern { pattern, navigation } => {
                f.trash_for(navigation);
                match navigation {
                    Navigation::Archive => f.and("n.archived = 1"),
                    Navigation::Category(id) => {
                        f.and_with("n.category_id = ?", [Value::Integer(*id)])
                    }
                    Navigation::Uncategorized => {
                        f.and("(n.category_id IS NULL OR n.category_id = 0)")
                    }
                    Navigation::Reminders => f.and("n.alarm IS NOT NULL"),
                    Navigation::Notes | Navigation::Trash => {}
                }
                // Locked content is ciphertext, so locked notes match on title only.
                let like = like_contains(pattern);
                f.and_with(
                    "((n.locked IS NOT 1 AND (n.title LIKE ? ESCAPE '\\' OR n.content LIKE ? ESCAPE '\\')) \
                     OR (n.locked = 1 AND n.title LIKE ? ESCAPE '\\'))",
                    [like.clone(), like.clone(), like],
                );
            }
            Scope::Tagged { note, navigation } => {
                if let Some(id) = note {
                    f.and_with("n.creation = ?", [Value::Integer(*id)]);
                }
                f.and("(n.content LIKE '%#%' OR n.title LIKE '%#%')");
                f.trash_for(navigation);
            }
        }
        f
    }
}
