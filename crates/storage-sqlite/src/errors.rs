//! Storage error types and their conversion into the core error.

use billfolio_core::errors::{DatabaseError, Error};
use thiserror::Error;

/// Errors raised by the storage engine before they cross the crate
/// boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Query execution error
    #[error("Query failed: {0}")]
    Query(#[from] diesel::result::Error),

    /// Connection pool exhaustion or setup failure
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// Migration failure
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Filesystem error touching the database directory
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted row that no longer parses into the domain model
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Query(diesel::result::Error::NotFound) => {
                Error::Database(DatabaseError::NotFound("record not found".to_string()))
            }
            StorageError::Query(inner) => {
                Error::Database(DatabaseError::QueryFailed(inner.to_string()))
            }
            other => Error::Database(DatabaseError::Internal(other.to_string())),
        }
    }
}
