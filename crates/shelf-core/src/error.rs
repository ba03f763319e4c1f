//! Errors surfaced by library operations
//!
//! Lookups of absent books are not errors: they return `None` or are
//! no-ops. Everything here reaches the user-facing action that started
//! the operation.

use thiserror::Error;

use crate::remote::RemoteError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Downloading a book or reading remote records failed; nothing was cached
    #[error("Failed to retrieve {target}: {source}")]
    RetrievalFailed {
        target: String,
        #[source]
        source: RemoteError,
    },

    /// Content is neither UTF-8 nor the legacy encoding
    #[error("Could not decode '{file_name}' as UTF-8 or {fallback}")]
    DecodeFailed { file_name: String, fallback: String },

    /// A remote create/update/delete failed; local writes were not rolled back
    #[error("Failed to {operation} '{target}' on the remote store: {source}")]
    RemoteWriteFailed {
        operation: &'static str,
        target: String,
        #[source]
        source: RemoteError,
    },

    /// A book with this file name already exists remotely
    #[error("A book named '{file_name}' already exists")]
    AlreadyExists { file_name: String },

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SyncError {
    pub(crate) fn retrieval(target: impl Into<String>, source: RemoteError) -> Self {
        SyncError::RetrievalFailed {
            target: target.into(),
            source,
        }
    }

    pub(crate) fn remote_write(
        operation: &'static str,
        target: impl Into<String>,
        source: RemoteError,
    ) -> Self {
        SyncError::RemoteWriteFailed {
            operation,
            target: target.into(),
            source,
        }
    }

    /// The underlying storage error, if this is a local cache failure
    pub fn as_storage(&self) -> Option<&StorageError> {
        match self {
            SyncError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for library operations
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = SyncError::remote_write(
            "delete",
            "book.txt",
            RemoteError::Api {
                code: 500,
                message: "boom".to_string(),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("delete"));
        assert!(msg.contains("book.txt"));
        assert!(msg.contains("boom"));

        let err = SyncError::DecodeFailed {
            file_name: "x.txt".to_string(),
            fallback: "GBK".to_string(),
        };
        assert!(err.to_string().contains("GBK"));
    }

    #[test]
    fn test_as_storage() {
        let err = SyncError::from(StorageError::LockPoisoned);
        assert!(err.as_storage().is_some());
        assert!(SyncError::InvalidInput("x".to_string()).as_storage().is_none());
    }
}
