//! Internal domain modules for the notekeep core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod clock;
pub mod crypto;
pub mod delete;
pub mod error;
pub mod handle;
pub mod mapper;
pub mod migrator;
pub mod note;
pub mod query;
pub mod scripts;
pub mod settings;
pub mod stats;
pub mod storage;
pub mod store;
pub mod tags;

#[doc(inline)]
pub use crypto::{KdfParams, NoteCipher, XChaChaCipher};
#[doc(inline)]
pub use delete::{AttachmentPolicy, DeleteResult};
#[doc(inline)]
pub use error::{Result, StoreError};
#[doc(inline)]
pub use handle::{SharedStore, StoreConfig, StoreHandle};
#[doc(inline)]
pub use migrator::{Migrator, StatementPolicy, UpgradeStep, DATABASE_VERSION};
#[doc(inline)]
pub use note::{Attachment, Category, CategorySummary, Location, Note, Tag};
#[doc(inline)]
pub use query::{Navigation, QueryBuilder, Scope};
#[doc(inline)]
pub use scripts::{BundledScripts, DirectoryScripts, MemoryScripts, ScriptSource};
#[doc(inline)]
pub use settings::{load_settings, save_settings, Settings, SortColumn};
#[doc(inline)]
pub use stats::Stats;
#[doc(inline)]
pub use storage::Storage;
#[doc(inline)]
pub use store::{NoteStore, Touch};
