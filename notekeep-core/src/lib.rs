//! Core library for notekeep, a personal note-taking application.
//!
//! The primary entry point is [`NoteStore`], which owns an open SQLite notes
//! database. Applications usually reach it through a [`StoreHandle`] built
//! once at startup from a [`StoreConfig`]; the handle opens and migrates the
//! database on first use.
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use self::core::{
    crypto::{KdfParams, NoteCipher, XChaChaCipher},
    delete::{AttachmentPolicy, DeleteResult},
    error::{Result, StoreError},
    handle::{SharedStore, StoreConfig, StoreHandle},
    migrator::{Migrator, StatementPolicy, UpgradeStep, DATABASE_VERSION},
    note::{Attachment, Category, CategorySummary, Location, Note, Tag},
    query::{Navigation, QueryBuilder, Scope},
    scripts::{BundledScripts, DirectoryScripts, MemoryScripts, ScriptSource},
    settings::{load_settings, save_settings, Settings, SortColumn},
    stats::Stats,
    storage::Storage,
    store::{NoteStore, Touch},
};
