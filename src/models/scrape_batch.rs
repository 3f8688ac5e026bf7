//! Ingestion attempt records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::error::{TransitionError, TransitionResult};
use super::ids::{HospitalId, ScrapeBatchId, UserId};
use super::lifecycle::Lifecycle;

/// Processing state of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchState {
    Pending,
    Complete,
    Failed,
}

impl BatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "COMPLETE" => Some(Self::Complete),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ingestion attempt
///
/// A batch starts PENDING and moves exactly once to COMPLETE or FAILED.
/// `completed_at` is set iff the batch is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeBatch {
    pub id: ScrapeBatchId,
    pub hospital_id: HospitalId,
    pub state: BatchState,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub scraped_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub row_count: u32,
    pub checksum: String,
    pub error_message: Option<String>,
    pub archived_at: Option<DateTime<Utc>>,
    pub archived_by: Option<UserId>,
    pub lifecycle: Lifecycle,
}

impl ScrapeBatch {
    /// Create a PENDING batch for `[window_start, window_end]`
    pub fn new(
        hospital_id: HospitalId,
        window_start: NaiveDate,
        window_end: NaiveDate,
        checksum: impl Into<String>,
        actor: UserId,
    ) -> TransitionResult<Self> {
        TransitionError::check_range(window_start, window_end)?;

        Ok(Self {
            id: ScrapeBatchId::new(),
            hospital_id,
            state: BatchState::Pending,
            window_start,
            window_end,
            scraped_at: Utc::now(),
            completed_at: None,
            row_count: 0,
            checksum: checksum.into(),
            error_message: None,
            archived_at: None,
            archived_by: None,
            lifecycle: Lifecycle::new(actor),
        })
    }

    /// Record successful processing of `row_count` rows
    pub fn mark_complete(&mut self, row_count: u32) -> TransitionResult<()> {
        self.ensure_pending()?;
        self.state = BatchState::Complete;
        self.row_count = row_count;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Record a failed ingestion
    pub fn mark_failed(&mut self, message: impl Into<String>) -> TransitionResult<()> {
        self.ensure_pending()?;
        self.state = BatchState::Failed;
        self.error_message = Some(message.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Hide the batch from active views. State and counts are untouched.
    pub fn archive(&mut self, actor: UserId) {
        if self.archived_at.is_none() {
            self.archived_at = Some(Utc::now());
            self.archived_by = Some(actor);
        }
        self.lifecycle.touch(actor);
    }

    pub fn soft_delete(&mut self, actor: UserId) {
        self.lifecycle.soft_delete(actor);
    }

    pub fn is_deleted(&self) -> bool {
        self.lifecycle.is_deleted()
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    /// Whether this batch was a successful import of the same payload
    pub fn is_duplicate_of(
        &self,
        hospital_id: HospitalId,
        start: NaiveDate,
        end: NaiveDate,
        checksum: &str,
    ) -> bool {
        self.state == BatchState::Complete
            && !self.is_deleted()
            && self.hospital_id == hospital_id
            && self.window_start == start
            && self.window_end == end
            && self.checksum == checksum
    }

    fn ensure_pending(&self) -> TransitionResult<()> {
        if self.state.is_terminal() {
            return Err(TransitionError::BatchAlreadyFinalized { state: self.state });
        }
        Ok(())
    }
}
