//! Error types for the notekeep core library.

use thiserror::Error;

/// All errors that can occur within the notekeep core library.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A SQLite operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The creation script could not be read or parsed. The store is unusable.
    #[error("Database creation failed: {0}")]
    SchemaInit(String),

    /// An upgrade script or upgrade step failed. A partial upgrade is not trusted.
    #[error("Database upgrade failed: {0}")]
    SchemaUpgrade(String),

    /// The database was written by a newer release than this one.
    #[error("Database version {found} is newer than supported version {supported}")]
    SchemaDowngrade { found: u32, supported: u32 },

    /// A note ID was requested that does not exist in the database.
    #[error("Note not found: {0}")]
    NoteNotFound(i64),

    /// An entity is missing data required to persist it.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Content of a locked note could not be encrypted.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Stored ciphertext could not be decrypted with the current passphrase.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// An I/O operation on the filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be serialized or deserialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias that pins the error type to [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Database(e) => format!("Failed to save: {e}"),
            Self::SchemaInit(_) => "Could not create the notes database".to_string(),
            Self::SchemaUpgrade(_) => "Could not upgrade the notes database".to_string(),
            Self::SchemaDowngrade { .. } => {
                "This database was created by a newer version of the app".to_string()
            }
            Self::NoteNotFound(_) => "Note no longer exists".to_string(),
            Self::ValidationFailed(msg) => msg.clone(),
            Self::Encryption(_) => "Could not lock the note".to_string(),
            Self::Decryption(_) => "Wrong password for locked notes".to_string(),
            Self::Io(e) => format!("File error: {e}"),
            Self::Json(e) => format!("Data format error: {e}"),
        }
    }
}
