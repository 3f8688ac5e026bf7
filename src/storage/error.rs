//! Error types for data access

use thiserror::Error;

use crate::models::{ScrapeBatchId, TransitionError};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by repository backends
#[derive(Error, Debug)]
pub enum StorageError {
    /// Store is unreachable; the operation may be retried
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Write would violate a uniqueness or state invariant
    #[error("conflict: {0}")]
    Conflict(String),

    /// A COMPLETE batch with the same hospital, window and checksum already
    /// exists; the commit wrote nothing
    #[error("identical payload already committed as batch {existing}")]
    DuplicateBatch { existing: ScrapeBatchId },

    /// State transition refused inside a unit of work
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// SQLite driver error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Stored record could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Whether retrying the same call can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
