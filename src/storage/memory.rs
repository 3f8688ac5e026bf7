//! In-memory repository
//!
//! Every write takes one write guard on the whole state, which makes an import
//! commit or a promotion a single unit of work. Readers take short read guards.
//! Used by tests and as the reference behavior for the SQLite backend.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use super::error::{StorageError, StorageResult};
use crate::coverage::CoverageSnapshot;
use super::repository::{
    duplicate_assignment, plan_promotion, CoverageDataSource, ImportCommit, PromotionOutcome,
    ScheduleRepository,
};
use crate::models::{
    Assignment, AssignmentId, BatchState, DateRange, HospitalId, Person, PersonId,
    ScheduleVersion, ScheduleVersionId, ScrapeBatch, ScrapeBatchId, ShiftInstance,
    ShiftInstanceId, UserId, VersionStatus,
};

#[derive(Default)]
struct State {
    persons: HashMap<PersonId, Person>,
    batches: HashMap<ScrapeBatchId, ScrapeBatch>,
    versions: HashMap<ScheduleVersionId, ScheduleVersion>,
    shifts: HashMap<ShiftInstanceId, ShiftInstance>,
    assignments: HashMap<AssignmentId, Assignment>,
    /// (person, shift, date) of every active assignment
    active_keys: HashSet<(PersonId, ShiftInstanceId, NaiveDate)>,
    /// In insertion order
    snapshots: Vec<CoverageSnapshot>,
}

impl State {
    fn has_active_assignment(&self, candidate: &Assignment) -> bool {
        self.active_keys.contains(&candidate.key())
    }

    fn insert_assignment(&mut self, assignment: Assignment) {
        if assignment.is_active() {
            self.active_keys.insert(assignment.key());
        }
        self.assignments.insert(assignment.id, assignment);
    }

    /// Another COMPLETE batch holding the same payload
    fn complete_duplicate(&self, batch: &ScrapeBatch) -> Option<&ScrapeBatch> {
        self.batches
            .values()
            .filter(|b| {
                b.id != batch.id
                    && b.is_duplicate_of(
                        batch.hospital_id,
                        batch.window_start,
                        batch.window_end,
                        &batch.checksum,
                    )
            })
            .min_by_key(|b| b.scraped_at)
    }
}

/// Repository backed by process memory
pub struct MemoryRepository {
    state: RwLock<State>,
    available: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            available: AtomicBool::new(true),
            reads: AtomicUsize::new(0),
        }
    }

    /// Simulate the store going away (or coming back)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of coverage-source reads served so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn reset_reads(&self) {
        self.reads.store(0, Ordering::SeqCst);
    }

    /// Number of stored shift instances, deleted or not
    pub async fn shift_count(&self) -> usize {
        self.state.read().await.shifts.len()
    }

    /// Number of stored assignments, deleted or not
    pub async fn assignment_count(&self) -> usize {
        self.state.read().await.assignments.len()
    }

    fn ensure_available(&self) -> StorageResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable(
                "in-memory store switched off".to_string(),
            ))
        }
    }

    fn count_read(&self) -> StorageResult<()> {
        self.ensure_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn in_range(range: Option<DateRange>, date: NaiveDate) -> bool {
    range.map_or(true, |r| r.contains(date))
}

#[async_trait]
impl CoverageDataSource for MemoryRepository {
    async fn live_version(
        &self,
        version_id: ScheduleVersionId,
    ) -> StorageResult<Option<ScheduleVersion>> {
        self.count_read()?;
        let state = self.state.read().await;
        Ok(state
            .versions
            .get(&version_id)
            .filter(|v| !v.is_deleted())
            .cloned())
    }

    async fn shifts_for_version(
        &self,
        version_id: ScheduleVersionId,
        range: Option<DateRange>,
    ) -> StorageResult<Vec<ShiftInstance>> {
        self.count_read()?;
        let state = self.state.read().await;
        let mut shifts: Vec<_> = state
            .shifts
            .values()
            .filter(|s| {
                s.schedule_version_id == version_id
                    && !s.is_deleted()
                    && in_range(range, s.schedule_date)
            })
            .cloned()
            .collect();
        shifts.sort_by_key(|s| (s.schedule_date, s.shift_type, s.start_time, s.id));
        Ok(shifts)
    }

    async fn active_assignments_for_version(
        &self,
        version_id: ScheduleVersionId,
        range: Option<DateRange>,
    ) -> StorageResult<Vec<Assignment>> {
        self.count_read()?;
        let state = self.state.read().await;
        let mut assignments: Vec<_> = state
            .assignments
            .values()
            .filter(|a| {
                a.is_active()
                    && in_range(range, a.schedule_date)
                    && state
                        .shifts
                        .get(&a.shift_instance_id)
                        .is_some_and(|s| s.schedule_version_id == version_id)
            })
            .cloned()
            .collect();
        assignments.sort_by_key(|a| (a.schedule_date, a.shift_instance_id, a.person_id, a.id));
        Ok(assignments)
    }

    async fn persons_by_ids(&self, ids: &[PersonId]) -> StorageResult<Vec<Person>> {
        self.count_read()?;
        let state = self.state.read().await;
        let wanted: HashSet<_> = ids.iter().collect();
        let mut persons: Vec<_> = wanted
            .into_iter()
            .filter_map(|id| state.persons.get(id).cloned())
            .collect();
        persons.sort_by_key(|p| p.id);
        Ok(persons)
    }
}

#[async_trait]
impl ScheduleRepository for MemoryRepository {
    async fn upsert_person(&self, person: &Person) -> StorageResult<()> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        state.persons.insert(person.id, person.clone());
        Ok(())
    }

    async fn active_persons(&self) -> StorageResult<Vec<Person>> {
        let mut persons = self.all_persons().await?;
        persons.retain(|p| p.active);
        Ok(persons)
    }

    async fn all_persons(&self) -> StorageResult<Vec<Person>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let mut persons: Vec<_> = state
            .persons
            .values()
            .filter(|p| !p.is_deleted())
            .cloned()
            .collect();
        persons.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(persons)
    }

    async fn create_batch(&self, batch: &ScrapeBatch) -> StorageResult<()> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        if state.batches.contains_key(&batch.id) {
            return Err(StorageError::conflict(format!("batch {} already exists", batch.id)));
        }
        state.batches.insert(batch.id, batch.clone());
        Ok(())
    }

    async fn update_batch(&self, batch: &ScrapeBatch) -> StorageResult<()> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        match state.batches.get_mut(&batch.id) {
            Some(stored) => {
                *stored = batch.clone();
                Ok(())
            }
            None => Err(StorageError::not_found("batch", batch.id)),
        }
    }

    async fn get_batch(&self, id: ScrapeBatchId) -> StorageResult<Option<ScrapeBatch>> {
        self.ensure_available()?;
        Ok(self.state.read().await.batches.get(&id).cloned())
    }

    async fn find_complete_batch(
        &self,
        hospital_id: HospitalId,
        window_start: NaiveDate,
        window_end: NaiveDate,
        checksum: &str,
    ) -> StorageResult<Option<ScrapeBatch>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state
            .batches
            .values()
            .filter(|b| b.is_duplicate_of(hospital_id, window_start, window_end, checksum))
            .min_by_key(|b| b.scraped_at)
            .cloned())
    }

    async fn get_version(&self, id: ScheduleVersionId) -> StorageResult<Option<ScheduleVersion>> {
        self.ensure_available()?;
        Ok(self.state.read().await.versions.get(&id).cloned())
    }

    async fn list_versions(
        &self,
        hospital_id: HospitalId,
        status: Option<VersionStatus>,
    ) -> StorageResult<Vec<ScheduleVersion>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let mut versions: Vec<_> = state
            .versions
            .values()
            .filter(|v| {
                v.hospital_id == hospital_id
                    && !v.is_deleted()
                    && status.map_or(true, |s| v.status == s)
            })
            .cloned()
            .collect();
        versions.sort_by(|a, b| {
            b.lifecycle
                .created_at
                .cmp(&a.lifecycle.created_at)
                .then(a.id.cmp(&b.id))
        });
        Ok(versions)
    }

    async fn version_for_batch(
        &self,
        batch_id: ScrapeBatchId,
    ) -> StorageResult<Option<ScheduleVersion>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state
            .versions
            .values()
            .find(|v| v.scrape_batch_id == Some(batch_id))
            .cloned())
    }

    async fn commit_import(&self, commit: ImportCommit) -> StorageResult<()> {
        self.ensure_available()?;
        commit.check()?;

        let mut state = self.state.write().await;

        // All checks happen before the first write.
        match state.batches.get(&commit.batch.id) {
            None => return Err(StorageError::not_found("batch", commit.batch.id)),
            Some(stored) if stored.state != BatchState::Pending => {
                return Err(StorageError::conflict(format!(
                    "batch {} is already {}",
                    stored.id, stored.state
                )))
            }
            Some(_) => {}
        }
        if commit.batch.state != BatchState::Complete {
            return Err(StorageError::conflict("committed batch must be COMPLETE"));
        }
        if let Some(existing) = state.complete_duplicate(&commit.batch) {
            return Err(StorageError::DuplicateBatch {
                existing: existing.id,
            });
        }
        if state.versions.contains_key(&commit.version.id) {
            return Err(StorageError::conflict(format!(
                "version {} already exists",
                commit.version.id
            )));
        }
        if let Some(existing) = commit
            .assignments
            .iter()
            .find(|a| a.is_active() && state.has_active_assignment(a))
        {
            return Err(duplicate_assignment(existing));
        }

        let ImportCommit {
            batch,
            version,
            shifts,
            assignments,
        } = commit;
        state.batches.insert(batch.id, batch);
        state.versions.insert(version.id, version);
        state.shifts.extend(shifts.into_iter().map(|s| (s.id, s)));
        for assignment in assignments {
            state.insert_assignment(assignment);
        }
        Ok(())
    }

    async fn promote_exclusive(
        &self,
        version_id: ScheduleVersionId,
        actor: UserId,
    ) -> StorageResult<PromotionOutcome> {
        self.ensure_available()?;
        let mut state = self.state.write().await;

        let target = state
            .versions
            .get(&version_id)
            .filter(|v| !v.is_deleted())
            .ok_or_else(|| StorageError::not_found("version", version_id))?;
        let outcome = plan_promotion(target, state.versions.values(), actor)?;

        for archived in &outcome.archived {
            state.versions.insert(archived.id, archived.clone());
        }
        state
            .versions
            .insert(outcome.promoted.id, outcome.promoted.clone());
        Ok(outcome)
    }

    async fn archive_version(
        &self,
        version_id: ScheduleVersionId,
        actor: UserId,
    ) -> StorageResult<ScheduleVersion> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        let version = state
            .versions
            .get_mut(&version_id)
            .ok_or_else(|| StorageError::not_found("version", version_id))?;
        version.archive(actor)?;
        Ok(version.clone())
    }

    async fn soft_delete_version(
        &self,
        version_id: ScheduleVersionId,
        actor: UserId,
    ) -> StorageResult<ScheduleVersion> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        let version = state
            .versions
            .get_mut(&version_id)
            .ok_or_else(|| StorageError::not_found("version", version_id))?;
        version.soft_delete(actor);
        Ok(version.clone())
    }

    async fn add_assignment(&self, assignment: &Assignment) -> StorageResult<()> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        if !state.shifts.contains_key(&assignment.shift_instance_id) {
            return Err(StorageError::not_found(
                "shift instance",
                assignment.shift_instance_id,
            ));
        }
        if !state.persons.contains_key(&assignment.person_id) {
            return Err(StorageError::not_found("person", assignment.person_id));
        }
        if state.assignments.contains_key(&assignment.id) {
            return Err(StorageError::conflict(format!(
                "assignment {} already exists",
                assignment.id
            )));
        }
        if assignment.is_active() && state.has_active_assignment(assignment) {
            return Err(duplicate_assignment(assignment));
        }
        state.insert_assignment(assignment.clone());
        Ok(())
    }

    async fn soft_delete_assignment(&self, id: AssignmentId, actor: UserId) -> StorageResult<()> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        let State {
            assignments,
            active_keys,
            ..
        } = &mut *state;
        let assignment = assignments
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("assignment", id))?;
        if assignment.is_active() {
            active_keys.remove(&assignment.key());
        }
        assignment.lifecycle.soft_delete(actor);
        Ok(())
    }

    async fn save_coverage_snapshot(&self, snapshot: &CoverageSnapshot) -> StorageResult<()> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        if !state.versions.contains_key(&snapshot.schedule_version_id) {
            return Err(StorageError::not_found(
                "version",
                snapshot.schedule_version_id,
            ));
        }
        if state.snapshots.iter().any(|s| s.id == snapshot.id) {
            return Err(StorageError::conflict(format!(
                "coverage snapshot {} already exists",
                snapshot.id
            )));
        }
        state.snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn latest_coverage_snapshot(
        &self,
        version_id: ScheduleVersionId,
    ) -> StorageResult<Option<CoverageSnapshot>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state
            .snapshots
            .iter()
            .filter(|s| s.schedule_version_id == version_id)
            .max_by_key(|s| s.calculated_at)
            .cloned())
    }

    async fn coverage_snapshots_on(
        &self,
        hospital_id: HospitalId,
        date: NaiveDate,
    ) -> StorageResult<Vec<CoverageSnapshot>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let mut snapshots: Vec<_> = state
            .snapshots
            .iter()
            .rev()
            .filter(|s| s.hospital_id == hospital_id && s.calculation_date() == date)
            .cloned()
            .collect();
        snapshots.sort_by(|a, b| b.calculated_at.cmp(&a.calculated_at));
        Ok(snapshots)
    }
}
