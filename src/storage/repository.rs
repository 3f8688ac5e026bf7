//! Repository contracts for schedule persistence
//!
//! Business logic talks to storage only through these traits, so the
//! ingestion and promotion flows run unchanged against SQLite or the
//! in-memory backend used by tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Services                             │
//! │          IngestService, VersionService, Coverage            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Repository Traits                         │
//! │        ScheduleRepository  ⊃  CoverageDataSource            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                 ┌────────────┴────────────┐
//!                 ▼                         ▼
//!        ┌─────────────────┐       ┌─────────────────┐
//!        │     SQLite      │       │     Memory      │
//!        └─────────────────┘       └─────────────────┘
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::error::{StorageError, StorageResult};
use crate::coverage::CoverageSnapshot;
use crate::models::{
    Assignment, AssignmentId, DateRange, HospitalId, Person, PersonId, ScheduleVersion,
    ScheduleVersionId, ScrapeBatch, ScrapeBatchId, ShiftInstance, UserId, VersionStatus,
};

// ============================================================================
// Core Types
// ============================================================================

/// Everything a successful import writes, applied as one unit of work
#[derive(Debug, Clone)]
pub struct ImportCommit {
    /// The batch, already marked COMPLETE
    pub batch: ScrapeBatch,
    /// The new STAGING version with its validation attached
    pub version: ScheduleVersion,
    pub shifts: Vec<ShiftInstance>,
    pub assignments: Vec<Assignment>,
}

impl ImportCommit {
    /// Check internal consistency before anything is written
    pub fn check(&self) -> StorageResult<()> {
        if self.version.scrape_batch_id != Some(self.batch.id) {
            return Err(StorageError::conflict(
                "version does not reference the committed batch",
            ));
        }
        if self.version.status != VersionStatus::Staging {
            return Err(StorageError::conflict(format!(
                "imported version must be STAGING, got {}",
                self.version.status
            )));
        }

        let shift_ids: HashSet<_> = self
            .shifts
            .iter()
            .map(|s| {
                if s.schedule_version_id != self.version.id {
                    return Err(StorageError::conflict(format!(
                        "shift {} belongs to another version",
                        s.id
                    )));
                }
                Ok(s.id)
            })
            .collect::<StorageResult<_>>()?;

        let mut keys = HashSet::with_capacity(self.assignments.len());
        for a in &self.assignments {
            if !shift_ids.contains(&a.shift_instance_id) {
                return Err(StorageError::conflict(format!(
                    "assignment {} references a shift outside the import",
                    a.id
                )));
            }
            if a.is_active() && !keys.insert(a.key()) {
                return Err(duplicate_assignment(a));
            }
        }
        Ok(())
    }

    /// Rows persisted by this commit
    pub fn row_count(&self) -> u32 {
        (self.shifts.len() + self.assignments.len()) as u32
    }
}

/// Result of a promote-and-archive-others unit of work
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionOutcome {
    pub promoted: ScheduleVersion,
    /// Previously PRODUCTION versions of the hospital, now ARCHIVED
    pub archived: Vec<ScheduleVersion>,
}

/// Apply promotion of `target` and archival of every other PRODUCTION
/// version of its hospital to copies of the given versions
///
/// Backends call this inside their unit of work and persist the result.
pub fn plan_promotion<'a>(
    target: &ScheduleVersion,
    hospital_versions: impl IntoIterator<Item = &'a ScheduleVersion>,
    actor: UserId,
) -> StorageResult<PromotionOutcome> {
    let mut promoted = target.clone();
    promoted.promote(actor)?;

    let mut archived = Vec::new();
    for other in hospital_versions {
        if other.id == target.id
            || other.hospital_id != target.hospital_id
            || other.status != VersionStatus::Production
        {
            continue;
        }
        let mut other = other.clone();
        other.archive(actor)?;
        archived.push(other);
    }

    Ok(PromotionOutcome { promoted, archived })
}

pub(crate) fn duplicate_assignment(a: &Assignment) -> StorageError {
    StorageError::conflict(format!(
        "person {} already has an active assignment on shift {} for {}",
        a.person_id, a.shift_instance_id, a.schedule_date
    ))
}

// ============================================================================
// Repository Traits
// ============================================================================

/// Read side used by the coverage loader
#[async_trait]
pub trait CoverageDataSource: Send + Sync {
    /// The version if it exists and is not soft-deleted
    async fn live_version(
        &self,
        version_id: ScheduleVersionId,
    ) -> StorageResult<Option<ScheduleVersion>>;

    /// Active shifts of a version, optionally limited to a date window
    async fn shifts_for_version(
        &self,
        version_id: ScheduleVersionId,
        range: Option<DateRange>,
    ) -> StorageResult<Vec<ShiftInstance>>;

    /// Active assignments on the version's shifts, optionally limited to a date window
    async fn active_assignments_for_version(
        &self,
        version_id: ScheduleVersionId,
        range: Option<DateRange>,
    ) -> StorageResult<Vec<Assignment>>;

    /// Persons with the given ids; unknown ids are skipped
    async fn persons_by_ids(&self, ids: &[PersonId]) -> StorageResult<Vec<Person>>;
}

#[async_trait]
impl<S: CoverageDataSource + ?Sized> CoverageDataSource for Arc<S> {
    async fn live_version(
        &self,
        version_id: ScheduleVersionId,
    ) -> StorageResult<Option<ScheduleVersion>> {
        (**self).live_version(version_id).await
    }

    async fn shifts_for_version(
        &self,
        version_id: ScheduleVersionId,
        range: Option<DateRange>,
    ) -> StorageResult<Vec<ShiftInstance>> {
        (**self).shifts_for_version(version_id, range).await
    }

    async fn active_assignments_for_version(
        &self,
        version_id: ScheduleVersionId,
        range: Option<DateRange>,
    ) -> StorageResult<Vec<Assignment>> {
        (**self).active_assignments_for_version(version_id, range).await
    }

    async fn persons_by_ids(&self, ids: &[PersonId]) -> StorageResult<Vec<Person>> {
        (**self).persons_by_ids(ids).await
    }
}

/// Full persistence contract for schedules
#[async_trait]
pub trait ScheduleRepository: CoverageDataSource {
    // --- persons ---

    async fn upsert_person(&self, person: &Person) -> StorageResult<()>;

    /// Non-deleted persons flagged active
    async fn active_persons(&self) -> StorageResult<Vec<Person>>;

    /// Every non-deleted person, active or not
    async fn all_persons(&self) -> StorageResult<Vec<Person>>;

    // --- batches ---

    async fn create_batch(&self, batch: &ScrapeBatch) -> StorageResult<()>;

    async fn update_batch(&self, batch: &ScrapeBatch) -> StorageResult<()>;

    async fn get_batch(&self, id: ScrapeBatchId) -> StorageResult<Option<ScrapeBatch>>;

    /// A COMPLETE, non-deleted batch with the same hospital, window and checksum
    async fn find_complete_batch(
        &self,
        hospital_id: HospitalId,
        window_start: NaiveDate,
        window_end: NaiveDate,
        checksum: &str,
    ) -> StorageResult<Option<ScrapeBatch>>;

    // --- versions ---

    async fn get_version(&self, id: ScheduleVersionId) -> StorageResult<Option<ScheduleVersion>>;

    /// Non-deleted versions of a hospital, newest first
    async fn list_versions(
        &self,
        hospital_id: HospitalId,
        status: Option<VersionStatus>,
    ) -> StorageResult<Vec<ScheduleVersion>>;

    async fn version_for_batch(
        &self,
        batch_id: ScrapeBatchId,
    ) -> StorageResult<Option<ScheduleVersion>>;

    /// Persist a COMPLETE batch together with its version, shifts and
    /// assignments, or nothing at all
    async fn commit_import(&self, commit: ImportCommit) -> StorageResult<()>;

    /// Promote a STAGING version and archive every other PRODUCTION version
    /// of the same hospital in one unit of work
    async fn promote_exclusive(
        &self,
        version_id: ScheduleVersionId,
        actor: UserId,
    ) -> StorageResult<PromotionOutcome>;

    async fn archive_version(
        &self,
        version_id: ScheduleVersionId,
        actor: UserId,
    ) -> StorageResult<ScheduleVersion>;

    async fn soft_delete_version(
        &self,
        version_id: ScheduleVersionId,
        actor: UserId,
    ) -> StorageResult<ScheduleVersion>;

    // --- assignments ---

    /// Add a manual or override assignment; a second active assignment for
    /// the same (person, shift, date) is a conflict
    async fn add_assignment(&self, assignment: &Assignment) -> StorageResult<()>;

    async fn soft_delete_assignment(&self, id: AssignmentId, actor: UserId) -> StorageResult<()>;

    // --- coverage snapshots ---

    /// Store a calculation; its version must exist
    async fn save_coverage_snapshot(&self, snapshot: &CoverageSnapshot) -> StorageResult<()>;

    /// Most recent calculation of a version
    async fn latest_coverage_snapshot(
        &self,
        version_id: ScheduleVersionId,
    ) -> StorageResult<Option<CoverageSnapshot>>;

    /// Calculations for a hospital made on a UTC calendar day, newest first
    async fn coverage_snapshots_on(
        &self,
        hospital_id: HospitalId,
        date: NaiveDate,
    ) -> StorageResult<Vec<CoverageSnapshot>>;
}

// ============================================================================
// Shared Repository Types
// ============================================================================

/// Thread-safe shared repository handle
pub type SharedRepository = Arc<dyn ScheduleRepository>;
