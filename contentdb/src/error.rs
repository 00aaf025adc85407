use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("Scan error at {path}: {reason}")]
    Scan { path: PathBuf, reason: String },

    #[error("Content file outside of any collection: {path}")]
    AmbiguousPlacement { path: String },

    #[error("Collection not found: {collection}")]
    CollectionNotFound { collection: String },

    #[error("Entry not found: {collection}/{id}")]
    EntryNotFound { collection: String, id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

impl ContentError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        ContentError::Config {
            reason: reason.into(),
        }
    }

    /// True for lookup failures (`CollectionNotFound` / `EntryNotFound`).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ContentError::CollectionNotFound { .. } | ContentError::EntryNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ContentError>;
