//! Error types for entity state transitions

use chrono::NaiveDate;
use thiserror::Error;

use super::scrape_batch::BatchState;
use super::schedule_version::VersionStatus;

/// Result type for entity transitions
pub type TransitionResult<T> = Result<T, TransitionError>;

/// A lifecycle transition that is not allowed from the current state
///
/// A failed transition never modifies the entity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// Only STAGING versions can be promoted
    #[error("cannot promote a {from} version (only STAGING versions can be promoted)")]
    CannotPromote { from: VersionStatus },

    /// Only PRODUCTION versions can be archived
    #[error("cannot archive a {from} version (only PRODUCTION versions can be archived)")]
    CannotArchive { from: VersionStatus },

    /// COMPLETE and FAILED are terminal
    #[error("batch is already {state}; completion can only be recorded once")]
    BatchAlreadyFinalized { state: BatchState },

    /// Start of a date window lies after its end
    #[error("invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

impl TransitionError {
    /// Check a `[start, end]` window
    pub fn check_range(start: NaiveDate, end: NaiveDate) -> TransitionResult<()> {
        if start > end {
            return Err(Self::InvalidDateRange { start, end });
        }
        Ok(())
    }
}
