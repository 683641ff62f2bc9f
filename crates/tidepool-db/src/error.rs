//! Error types for store and live query operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Native DB error.
    #[error("Database error: {0}")]
    Database(String),

    /// The store file could not be created or opened.
    #[error("Failed to open store at {path}: {message}")]
    StoreOpen { path: PathBuf, message: String },

    /// The store could not execute a fetch.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Entity name not present in the store's schema.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// Record not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid store configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RON parse error.
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    /// Schema error from the core crate.
    #[error(transparent)]
    Core(#[from] tidepool_core::Error),
}

impl From<native_db::db_type::Error> for Error {
    fn from(err: native_db::db_type::Error) -> Self {
        Error::Database(err.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;
