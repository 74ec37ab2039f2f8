//! # Store Errors
//!
//! Error types for the document store.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Document store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Snapshot file could not be read or written
    #[error("Storage I/O error: {context} ({path})")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Snapshot could not be parsed or serialized
    #[error("Storage format error: {context} ({path})")]
    Format {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Requested record does not exist
    #[error("{collection} not found: {key}")]
    NotFound {
        collection: &'static str,
        key: String,
    },

    /// Caller is not allowed to touch the record
    #[error("Not authorized to modify {collection} {id}")]
    Forbidden { collection: &'static str, id: u64 },

    /// Unique field already taken
    #[error("{collection} already exists: {key}")]
    Conflict {
        collection: &'static str,
        key: String,
    },

    /// Post body exceeds the length limit
    #[error("Post body is too long: {len} characters (max {max})")]
    BodyTooLong { len: usize, max: usize },

    /// A thread panicked while holding the store lock
    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            context,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn format(
        context: &'static str,
        path: impl Into<PathBuf>,
        source: serde_json::Error,
    ) -> Self {
        StoreError::Format {
            context,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn not_found(collection: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            collection,
            key: key.to_string(),
        }
    }

    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Io { .. } => "STORAGE_IO_ERROR",
            StoreError::Format { .. } => "STORAGE_FORMAT_ERROR",
            StoreError::NotFound { .. } => "NOT_FOUND",
            StoreError::Forbidden { .. } => "FORBIDDEN",
            StoreError::Conflict { .. } => "CONFLICT",
            StoreError::BodyTooLong { .. } => "BODY_TOO_LONG",
            StoreError::LockPoisoned => "STORAGE_LOCK_POISONED",
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::BodyTooLong { .. } => 400,
            StoreError::Forbidden { .. } => 403,
            StoreError::NotFound { .. } => 404,
            StoreError::Conflict { .. } => 409,
            StoreError::Io { .. } | StoreError::Format { .. } | StoreError::LockPoisoned => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Internal failures are never the caller's fault
    pub fn is_internal(&self) -> bool {
        self.status_code() >= 500
    }
}
