//! Batch data loader for coverage queries
//!
//! Loads everything a coverage calculation needs in a fixed number of
//! source calls, independent of how many shifts or assignments exist.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::error::{StorageError, StorageResult};
use super::repository::CoverageDataSource;
use crate::models::{
    Assignment, DateRange, Person, PersonId, ScheduleVersion, ScheduleVersionId, ShiftInstance,
    Specialty,
};

/// Number of source calls per [`BatchLoader::load`] when the requested
/// window overlaps the version
pub const COVERAGE_FETCHES: usize = 4;

/// Inputs for one coverage calculation
#[derive(Debug, Clone)]
pub struct CoverageDataset {
    pub version: ScheduleVersion,
    /// Requested window clipped to the version's effective range; `None`
    /// when the two do not overlap
    pub window: Option<DateRange>,
    pub shifts: Vec<ShiftInstance>,
    pub assignments: Vec<Assignment>,
    pub persons: Vec<Person>,
    /// Source calls made to build this dataset
    pub fetch_count: usize,
}

impl CoverageDataset {
    fn empty(version: ScheduleVersion, fetch_count: usize) -> Self {
        Self {
            version,
            window: None,
            shifts: Vec::new(),
            assignments: Vec::new(),
            persons: Vec::new(),
            fetch_count,
        }
    }

    /// Specialty lookup for the loaded persons
    pub fn specialties(&self) -> HashMap<PersonId, Specialty> {
        self.persons.iter().map(|p| (p.id, p.specialty)).collect()
    }
}

/// Loads coverage inputs in at most [`COVERAGE_FETCHES`] calls
pub struct BatchLoader<'a, S: CoverageDataSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: CoverageDataSource + ?Sized> BatchLoader<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Resolve the version, fetch shifts and assignments together, then
    /// every referenced person in one call. Any source error aborts the
    /// whole load.
    ///
    /// An unknown or soft-deleted version is [`StorageError::NotFound`].
    pub async fn load(
        &self,
        version_id: ScheduleVersionId,
        range: Option<DateRange>,
    ) -> StorageResult<CoverageDataset> {
        let mut fetches = 0;

        let version = self.source.live_version(version_id).await?;
        fetches += 1;
        let version = version.ok_or_else(|| StorageError::not_found("version", version_id))?;

        let effective = version.effective_range();
        let window = match range {
            Some(r) => r.intersect(&effective),
            None => Some(effective),
        };
        let Some(window) = window else {
            tracing::debug!(
                version_id = %version_id,
                effective = %effective,
                "Requested window outside the version, nothing to load"
            );
            return Ok(CoverageDataset::empty(version, fetches));
        };

        let (shifts, assignments) = futures::try_join!(
            self.source.shifts_for_version(version_id, Some(window)),
            self.source
                .active_assignments_for_version(version_id, Some(window)),
        )?;
        fetches += 2;

        let person_ids: Vec<PersonId> = assignments
            .iter()
            .map(|a| a.person_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let persons = self.source.persons_by_ids(&person_ids).await?;
        fetches += 1;

        tracing::debug!(
            version_id = %version_id,
            window = %window,
            shifts = shifts.len(),
            assignments = assignments.len(),
            persons = persons.len(),
            fetches,
            "Coverage dataset loaded"
        );

        Ok(CoverageDataset {
            version,
            window: Some(window),
            shifts,
            assignments,
            persons,
            fetch_count: fetches,
        })
    }
}

/// Source wrapper counting every call, for asserting fetch counts
pub struct CountingSource<S> {
    inner: S,
    calls: AtomicUsize,
}

impl<S> CountingSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: CoverageDataSource> CoverageDataSource for CountingSource<S> {
    async fn live_version(
        &self,
        version_id: ScheduleVersionId,
    ) -> StorageResult<Option<ScheduleVersion>> {
        self.record();
        self.inner.live_version(version_id).await
    }

    async fn shifts_for_version(
        &self,
        version_id: ScheduleVersionId,
        range: Option<DateRange>,
    ) -> StorageResult<Vec<ShiftInstance>> {
        self.record();
        self.inner.shifts_for_version(version_id, range).await
    }

    async fn active_assignments_for_version(
        &self,
        version_id: ScheduleVersionId,
        range: Option<DateRange>,
    ) -> StorageResult<Vec<Assignment>> {
        self.record();
        self.inner
            .active_assignments_for_version(version_id, range)
            .await
    }

    async fn persons_by_ids(&self, ids: &[PersonId]) -> StorageResult<Vec<Person>> {
        self.record();
        self.inner.persons_by_ids(ids).await
    }
}
