//! Schedule snapshots and their promotion lifecycle

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::date_range::DateRange;
use super::error::{TransitionError, TransitionResult};
use super::ids::{HospitalId, ScheduleVersionId, ScrapeBatchId, UserId};
use super::lifecycle::Lifecycle;
use crate::validation::ValidationResult;

/// Publication status of a version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionStatus {
    Staging,
    Production,
    Archived,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staging => "STAGING",
            Self::Production => "PRODUCTION",
            Self::Archived => "ARCHIVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STAGING" => Some(Self::Staging),
            "PRODUCTION" => Some(Self::Production),
            "ARCHIVED" => Some(Self::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-bounded snapshot of a hospital's schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleVersion {
    pub id: ScheduleVersionId,
    pub hospital_id: HospitalId,
    pub status: VersionStatus,
    pub effective_start: NaiveDate,
    pub effective_end: NaiveDate,
    /// Back-reference to the batch that produced this version
    pub scrape_batch_id: Option<ScrapeBatchId>,
    pub validation: ValidationResult,
    pub promoted_at: Option<DateTime<Utc>>,
    pub promoted_by: Option<UserId>,
    pub archived_at: Option<DateTime<Utc>>,
    pub archived_by: Option<UserId>,
    pub lifecycle: Lifecycle,
}

impl ScheduleVersion {
    /// Create a STAGING version
    pub fn new(
        hospital_id: HospitalId,
        effective_start: NaiveDate,
        effective_end: NaiveDate,
        scrape_batch_id: Option<ScrapeBatchId>,
        actor: UserId,
    ) -> TransitionResult<Self> {
        TransitionError::check_range(effective_start, effective_end)?;

        Ok(Self {
            id: ScheduleVersionId::new(),
            hospital_id,
            status: VersionStatus::Staging,
            effective_start,
            effective_end,
            scrape_batch_id,
            validation: ValidationResult::new(),
            promoted_at: None,
            promoted_by: None,
            archived_at: None,
            archived_by: None,
            lifecycle: Lifecycle::new(actor),
        })
    }

    /// Attach the validation outcome of the import that produced this version
    pub fn with_validation(mut self, validation: ValidationResult) -> Self {
        self.validation = validation;
        self
    }

    /// STAGING -> PRODUCTION
    pub fn promote(&mut self, actor: UserId) -> TransitionResult<()> {
        if self.status != VersionStatus::Staging {
            return Err(TransitionError::CannotPromote { from: self.status });
        }
        self.status = VersionStatus::Production;
        self.promoted_at = Some(Utc::now());
        self.promoted_by = Some(actor);
        self.lifecycle.touch(actor);
        Ok(())
    }

    /// PRODUCTION -> ARCHIVED
    pub fn archive(&mut self, actor: UserId) -> TransitionResult<()> {
        if self.status != VersionStatus::Production {
            return Err(TransitionError::CannotArchive { from: self.status });
        }
        self.status = VersionStatus::Archived;
        self.archived_at = Some(Utc::now());
        self.archived_by = Some(actor);
        self.lifecycle.touch(actor);
        Ok(())
    }

    pub fn soft_delete(&mut self, actor: UserId) {
        self.lifecycle.soft_delete(actor);
    }

    pub fn is_deleted(&self) -> bool {
        self.lifecycle.is_deleted()
    }

    pub fn effective_range(&self) -> DateRange {
        DateRange {
            start: self.effective_start,
            end: self.effective_end,
        }
    }

    /// Whether `date` lies in the effective window
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.effective_range().contains(date)
    }
}
