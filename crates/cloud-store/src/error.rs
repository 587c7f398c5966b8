//! Error types for the cloud store client.

use billfolio_core::errors::{Error, RemoteError};
use thiserror::Error;

/// Result type alias for cloud store operations.
pub type Result<T> = std::result::Result<T, CloudStoreError>;

/// Retry policy class for API failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Errors that can occur talking to the cloud document store.
#[derive(Debug, Error)]
pub enum CloudStoreError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API error response from the document store
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid request (oversized batch, malformed input, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication error (missing or invalid token)
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl CloudStoreError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> ApiRetryClass {
        match self {
            Self::Api { status, .. } => match *status {
                401 | 403 => ApiRetryClass::ReauthRequired,
                408 | 409 | 423 | 425 | 429 => ApiRetryClass::Retryable,
                500..=599 => ApiRetryClass::Retryable,
                _ => ApiRetryClass::Permanent,
            },
            Self::Http(_) => ApiRetryClass::Retryable,
            Self::Json(_) => ApiRetryClass::Permanent,
            Self::InvalidRequest(_) => ApiRetryClass::Permanent,
            Self::Auth(_) => ApiRetryClass::ReauthRequired,
        }
    }
}

impl From<CloudStoreError> for Error {
    fn from(err: CloudStoreError) -> Self {
        let remote = match err {
            CloudStoreError::Http(inner) => RemoteError::Unavailable(inner.to_string()),
            CloudStoreError::Json(inner) => {
                RemoteError::InvalidRequest(format!("Malformed response: {inner}"))
            }
            CloudStoreError::Api { status, message } if matches!(status, 401 | 403) => {
                RemoteError::AuthRequired(message)
            }
            CloudStoreError::Api { status, message } => RemoteError::Api { status, message },
            CloudStoreError::InvalidRequest(message) => RemoteError::InvalidRequest(message),
            CloudStoreError::Auth(message) => RemoteError::AuthRequired(message),
        };
        Error::Remote(remote)
    }
}
