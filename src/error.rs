//! Unified error handling for the radshift crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`RadshiftErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! Validation problems are never errors; they are collected in a
//! [`ValidationResult`](crate::validation::ValidationResult).
//!
//! # Usage
//!
//! ```rust,ignore
//! use radshift::error::{Error, RadshiftErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("Retrying: {err}");
//!     } else {
//!         eprintln!("Fatal error: {err}");
//!     }
//! }
//! ```

use thiserror::Error;

pub use crate::models::TransitionError;
pub use crate::storage::StorageError;
use crate::models::ScheduleVersionId;

/// Common trait for all radshift error types
pub trait RadshiftErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Persistence errors
    Storage,
    /// Lifecycle transitions refused by an entity
    Transition,
    /// Operation refused because attached validation has errors
    Validation,
    /// Encoding and other errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Storage => "storage",
            Self::Transition => "transition",
            Self::Validation => "validation",
            Self::Other => "other",
        }
    }
}

/// Unified error type for the radshift crate
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid state transition
    #[error("Invalid transition: {0}")]
    Transition(#[from] TransitionError),

    /// Data-access failure, propagated unchanged
    #[error("Storage error: {0}")]
    Storage(StorageError),

    /// Version carries ERROR-level validation messages
    #[error("Promotion of version {version_id} blocked by {errors} validation error(s)")]
    PromotionBlocked {
        version_id: ScheduleVersionId,
        errors: usize,
        summary: String,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RadshiftErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_retryable(),
            Self::Transition(_) | Self::PromotionBlocked { .. } | Self::Json(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Storage(_) => ErrorCategory::Storage,
            Self::Transition(_) => ErrorCategory::Transition,
            Self::PromotionBlocked { .. } => ErrorCategory::Validation,
            Self::Json(_) => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Whether the error means a referenced entity does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(StorageError::NotFound { .. }))
    }
}

// Transitions refused inside a unit of work surface as transition errors
impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Transition(e) => Self::Transition(e),
            other => Self::Storage(other),
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
