//! Error types shared across the billfolio crates.

use thiserror::Error;

/// Result type alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures originating in the local store.
///
/// The local store is the sole source of truth, so these are fatal to the
/// calling operation and must never be treated as success.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Query execution error
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Lookup for a record that does not exist
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The store has not been bound to a user namespace yet
    #[error("Local store is not initialized for a user")]
    NotInitialized,

    /// Anything else the storage engine reports
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Failures originating in the remote document store.
///
/// These are transient from the sync engine's point of view: dirty records
/// stay dirty and the attempt is retried on the next trigger.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network unreachable, timeouts, connection failures
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    /// Missing or rejected credentials
    #[error("Authentication required: {0}")]
    AuthRequired(String),

    /// Error response from the document store API
    #[error("Remote API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Request rejected before reaching the network
    #[error("Invalid remote request: {0}")]
    InvalidRequest(String),
}

impl RemoteError {
    /// True when the failure can only be cleared by re-authenticating.
    pub fn needs_reauth(&self) -> bool {
        match self {
            Self::AuthRequired(_) => true,
            Self::Api { status, .. } => matches!(*status, 401 | 403),
            _ => false,
        }
    }

    /// True when a later retry with the same credentials may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Api { status, .. } => matches!(*status, 408 | 409 | 423 | 425 | 429 | 500..=599),
            _ => false,
        }
    }
}

/// Top-level error for core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Account teardown aborted at a specific step. The message is meant to
    /// be shown to the user as-is.
    #[error("Account deletion failed at step '{step}': {message}")]
    AccountDeletion { step: &'static str, message: String },

    #[error("Notification scheduling error: {0}")]
    Notification(String),

    #[error("Settings storage error: {0}")]
    Settings(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
