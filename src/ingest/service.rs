//! Atomic batch ingestion
//!
//! Every import follows the same sequence:
//!
//! 1. Fingerprint the payload and short-circuit exact duplicates
//! 2. Persist a PENDING [`ScrapeBatch`]
//! 3. Parse every row, collecting all structural problems
//! 4. Resolve people and shifts, collecting semantic problems
//! 5. Commit batch, version, shifts and assignments in one unit of work,
//!    or mark the batch FAILED and persist nothing else

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Instant;

use chrono::{Datelike, NaiveDate, Weekday};

use super::candidate::{ImportRequest, ParsedAssignment};
use super::checksum::payload_checksum;
use crate::config::IngestConfig;
use crate::error::Result;
use crate::metrics;
use crate::models::{
    Assignment, DateRange, Person, ScheduleVersion, ScrapeBatch, ScrapeBatchId, ShiftInstance,
    ShiftSpec, ShiftType,
};
use crate::storage::{ImportCommit, SharedRepository, StorageError};
use crate::validation::{codes, ValidationResult};

// ============================================================================
// Outcome
// ============================================================================

/// Result of one ingestion attempt
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// Batch COMPLETE; the STAGING version carries the validation
    Completed {
        batch: ScrapeBatch,
        version: ScheduleVersion,
        validation: ValidationResult,
    },
    /// Batch FAILED; no shift or assignment was persisted
    Failed {
        batch: ScrapeBatch,
        validation: ValidationResult,
    },
    /// Identical payload already imported; nothing was re-processed
    Duplicate {
        batch: ScrapeBatch,
        version: Option<ScheduleVersion>,
        validation: ValidationResult,
    },
}

impl IngestOutcome {
    pub fn batch(&self) -> &ScrapeBatch {
        match self {
            Self::Completed { batch, .. }
            | Self::Failed { batch, .. }
            | Self::Duplicate { batch, .. } => batch,
        }
    }

    pub fn version(&self) -> Option<&ScheduleVersion> {
        match self {
            Self::Completed { version, .. } => Some(version),
            Self::Duplicate { version, .. } => version.as_ref(),
            Self::Failed { .. } => None,
        }
    }

    pub fn validation(&self) -> &ValidationResult {
        match self {
            Self::Completed { validation, .. }
            | Self::Failed { validation, .. }
            | Self::Duplicate { validation, .. } => validation,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

enum Prepared {
    Duplicate(IngestOutcome),
    Pending(ScrapeBatch),
}

/// Validated rows ready to commit
struct ImportPlan {
    shifts: Vec<ShiftInstance>,
    assignments: Vec<Assignment>,
}

// ============================================================================
// Service
// ============================================================================

/// Ingestion entry point
#[derive(Clone)]
pub struct IngestService {
    repo: SharedRepository,
    config: IngestConfig,
}

impl IngestService {
    pub fn new(repo: SharedRepository, config: IngestConfig) -> Self {
        Self { repo, config }
    }

    /// Run a complete import and wait for its outcome
    ///
    /// Returns `Err` only for an inverted window or a data-access failure;
    /// bad rows produce [`IngestOutcome::Failed`].
    pub async fn ingest(&self, request: ImportRequest) -> Result<IngestOutcome> {
        match self.prepare(&request).await? {
            Prepared::Duplicate(outcome) => Ok(outcome),
            Prepared::Pending(batch) => self.process(batch, request).await,
        }
    }

    /// Persist a PENDING batch, run the import in the background and return
    /// the batch id to poll with [`IngestService::batch`]
    ///
    /// A duplicate payload returns the id of the batch that already holds it.
    pub async fn submit(&self, request: ImportRequest) -> Result<ScrapeBatchId> {
        let batch = match self.prepare(&request).await? {
            Prepared::Duplicate(outcome) => return Ok(outcome.batch().id),
            Prepared::Pending(batch) => batch,
        };
        let batch_id = batch.id;

        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.process(batch, request).await {
                tracing::error!(batch_id = %batch_id, error = %e, "Background import failed");
            }
        });

        Ok(batch_id)
    }

    /// Current state of a batch
    pub async fn batch(&self, id: ScrapeBatchId) -> Result<Option<ScrapeBatch>> {
        Ok(self.repo.get_batch(id).await?)
    }

    async fn prepare(&self, request: &ImportRequest) -> Result<Prepared> {
        let checksum = payload_checksum(&request.shifts, &request.assignments)?;

        if let Some(existing) = self
            .repo
            .find_complete_batch(
                request.hospital_id,
                request.window_start,
                request.window_end,
                &checksum,
            )
            .await?
        {
            tracing::info!(
                hospital_id = %request.hospital_id,
                batch_id = %existing.id,
                "Duplicate payload, skipping import"
            );
            return Ok(Prepared::Duplicate(self.duplicate(existing).await?));
        }

        let batch = ScrapeBatch::new(
            request.hospital_id,
            request.window_start,
            request.window_end,
            checksum,
            request.actor,
        )?;
        self.repo.create_batch(&batch).await?;

        tracing::info!(
            hospital_id = %request.hospital_id,
            batch_id = %batch.id,
            window_start = %request.window_start,
            window_end = %request.window_end,
            rows = request.row_count(),
            "Import started"
        );
        Ok(Prepared::Pending(batch))
    }

    async fn duplicate(&self, existing: ScrapeBatch) -> Result<IngestOutcome> {
        let version = self.repo.version_for_batch(existing.id).await?;
        let mut validation = ValidationResult::new();
        validation.add_info_with_context(
            codes::DUPLICATE_BATCH,
            format!(
                "Identical payload already imported as batch {}",
                existing.id
            ),
            crate::context! { "batch_id" => existing.id.to_string() },
        );
        Ok(IngestOutcome::Duplicate {
            batch: existing,
            version,
            validation,
        })
    }

    /// Another import of the same payload committed first: retire this batch
    /// and report the winner
    async fn lost_race(
        &self,
        mut batch: ScrapeBatch,
        existing: ScrapeBatchId,
    ) -> Result<IngestOutcome> {
        batch.mark_failed(format!("identical payload committed as batch {existing}"))?;
        self.repo.update_batch(&batch).await?;
        tracing::info!(
            batch_id = %batch.id,
            existing = %existing,
            "Concurrent duplicate import, keeping the committed batch"
        );

        let winner = self
            .repo
            .get_batch(existing)
            .await?
            .ok_or_else(|| StorageError::not_found("batch", existing))?;
        self.duplicate(winner).await
    }

    async fn process(&self, batch: ScrapeBatch, request: ImportRequest) -> Result<IngestOutcome> {
        let started = Instant::now();
        let pending = batch.clone();

        match self.run(batch, &request).await {
            Ok(outcome) => {
                let b = outcome.batch();
                metrics::record_batch(&b.hospital_id.to_string(), b.state.as_str(), b.row_count);
                tracing::info!(
                    batch_id = %b.id,
                    state = %b.state,
                    rows = b.row_count,
                    errors = outcome.validation().error_count(),
                    warnings = outcome.validation().warning_count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Import finished"
                );
                Ok(outcome)
            }
            Err(e) => {
                // The store may still hold the batch as PENDING
                let mut failed = pending;
                if failed.mark_failed(e.to_string()).is_ok() {
                    if let Err(update_err) = self.repo.update_batch(&failed).await {
                        tracing::warn!(
                            batch_id = %failed.id,
                            error = %update_err,
                            "Could not mark batch as failed"
                        );
                    }
                }
                metrics::record_batch(&failed.hospital_id.to_string(), "FAILED", 0);
                tracing::error!(batch_id = %failed.id, error = %e, "Import aborted");
                Err(e)
            }
        }
    }

    async fn run(&self, mut batch: ScrapeBatch, request: &ImportRequest) -> Result<IngestOutcome> {
        let window = DateRange::new(batch.window_start, batch.window_end)?;
        let mut validation = ValidationResult::new();

        if request.row_count() > self.config.max_rows {
            validation.add_error_with_context(
                codes::TOO_MANY_ROWS,
                format!(
                    "Import has {} rows, limit is {}",
                    request.row_count(),
                    self.config.max_rows
                ),
                crate::context! {
                    "rows" => request.row_count(),
                    "max_rows" => self.config.max_rows,
                },
            );
            return self.fail(batch, validation, "row limit exceeded").await;
        }

        if request.shifts.is_empty() {
            validation.add_error(codes::EMPTY_IMPORT, "Import contains no shifts");
            return self.fail(batch, validation, "no shifts in import").await;
        }

        let (specs, parsed) = parse_rows(
            request,
            window,
            self.config.max_desired_coverage,
            &mut validation,
        );
        if validation.has_errors() {
            let message = format!(
                "{} row(s) failed structural validation",
                validation.error_count()
            );
            return self.fail(batch, validation, message).await;
        }

        let persons = self.repo.all_persons().await?;

        let mut version = ScheduleVersion::new(
            request.hospital_id,
            batch.window_start,
            batch.window_end,
            Some(batch.id),
            request.actor,
        )?;
        let plan = resolve_rows(
            &version,
            request,
            specs,
            &parsed,
            &persons,
            &mut validation,
        );

        if self.config.require_weekday_midc {
            check_weekday_midc(&plan, &mut validation);
        }

        validation.add_info_with_context(
            codes::IMPORT_SUMMARY,
            format!(
                "Imported {} shifts and {} assignments",
                plan.shifts.len(),
                plan.assignments.len()
            ),
            crate::context! {
                "shifts" => plan.shifts.len(),
                "assignments" => plan.assignments.len(),
                "rows" => request.row_count(),
            },
        );

        version = version.with_validation(validation.clone());
        let pending = batch.clone();
        batch.mark_complete((plan.shifts.len() + plan.assignments.len()) as u32)?;
        let committed = self
            .repo
            .commit_import(ImportCommit {
                batch: batch.clone(),
                version: version.clone(),
                shifts: plan.shifts,
                assignments: plan.assignments,
            })
            .await;
        match committed {
            Ok(()) => {}
            Err(StorageError::DuplicateBatch { existing }) => {
                return self.lost_race(pending, existing).await;
            }
            Err(e) => return Err(e.into()),
        }

        Ok(IngestOutcome::Completed {
            batch,
            version,
            validation,
        })
    }

    async fn fail(
        &self,
        mut batch: ScrapeBatch,
        validation: ValidationResult,
        message: impl Into<String>,
    ) -> Result<IngestOutcome> {
        let message = message.into();
        batch.mark_failed(message.as_str())?;
        self.repo.update_batch(&batch).await?;
        tracing::warn!(batch_id = %batch.id, reason = %message, "Import rejected");
        Ok(IngestOutcome::Failed { batch, validation })
    }
}

// ============================================================================
// Row Processing
// ============================================================================

/// Structural pass: one ERROR per bad row
fn parse_rows(
    request: &ImportRequest,
    window: DateRange,
    max_desired: u32,
    validation: &mut ValidationResult,
) -> (Vec<ShiftSpec>, Vec<ParsedAssignment>) {
    let mut specs = Vec::with_capacity(request.shifts.len());
    for candidate in &request.shifts {
        match candidate.parse(window, max_desired) {
            Ok(spec) => specs.push(spec),
            Err(e) => {
                validation.add_error_with_context(
                    e.shift_code(),
                    format!("Shift row {}: {e}", candidate.row),
                    crate::context! { "row" => candidate.row, "kind" => "shift" },
                );
            }
        }
    }

    let mut parsed = Vec::with_capacity(request.assignments.len());
    for candidate in &request.assignments {
        match candidate.parse(window) {
            Ok(p) => parsed.push(p),
            Err(e) => {
                validation.add_error_with_context(
                    e.assignment_code(),
                    format!("Assignment row {}: {e}", candidate.row),
                    crate::context! { "row" => candidate.row, "kind" => "assignment" },
                );
            }
        }
    }

    (specs, parsed)
}

/// Pick the person a name refers to, preferring active ones
fn find_person<'p>(persons: &'p [Person], name: &str) -> Option<&'p Person> {
    let mut matches = persons.iter().filter(|p| p.matches_name(name));
    let first = matches.next()?;
    if first.active {
        return Some(first);
    }
    matches.find(|p| p.active).or(Some(first))
}

/// Semantic pass: people, shift matching and uniqueness
fn resolve_rows(
    version: &ScheduleVersion,
    request: &ImportRequest,
    specs: Vec<ShiftSpec>,
    parsed: &[ParsedAssignment],
    persons: &[Person],
    validation: &mut ValidationResult,
) -> ImportPlan {
    let shifts: Vec<ShiftInstance> = specs
        .into_iter()
        .map(|spec| ShiftInstance::new(version.id, request.hospital_id, spec, request.actor))
        .collect();

    let mut by_slot: HashMap<(ShiftType, NaiveDate), Vec<&ShiftInstance>> = HashMap::new();
    for shift in &shifts {
        by_slot
            .entry((shift.shift_type, shift.schedule_date))
            .or_default()
            .push(shift);
    }

    let mut resolved: HashMap<&str, Option<&Person>> = HashMap::new();
    let mut unknown: BTreeSet<String> = BTreeSet::new();
    let mut seen = HashSet::new();
    let mut assignments = Vec::with_capacity(parsed.len());

    for row in parsed {
        let person = *resolved
            .entry(row.person_name.as_str())
            .or_insert_with(|| find_person(persons, &row.person_name));
        let Some(person) = person else {
            unknown.insert(row.person_name.clone());
            continue;
        };

        let candidates: Vec<&ShiftInstance> = by_slot
            .get(&(row.shift_type, row.date))
            .map(|v| {
                v.iter()
                    .copied()
                    .filter(|s| row.study_type.map_or(true, |st| s.study_type == st))
                    .collect()
            })
            .unwrap_or_default();

        let shift = match candidates.as_slice() {
            [shift] => *shift,
            [] => {
                validation.add_error_with_context(
                    codes::NO_MATCHING_SHIFT,
                    format!(
                        "Assignment row {}: no {} shift on {} for {}",
                        row.row, row.shift_type, row.date, person.name
                    ),
                    crate::context! {
                        "row" => row.row,
                        "shift_type" => row.shift_type.as_str(),
                        "date" => row.date.to_string(),
                    },
                );
                continue;
            }
            many => {
                validation.add_error_with_context(
                    codes::AMBIGUOUS_SHIFT,
                    format!(
                        "Assignment row {}: {} {} shifts on {} match",
                        row.row,
                        many.len(),
                        row.shift_type,
                        row.date
                    ),
                    crate::context! {
                        "row" => row.row,
                        "shift_type" => row.shift_type.as_str(),
                        "date" => row.date.to_string(),
                        "matches" => many.len(),
                    },
                );
                continue;
            }
        };

        if !seen.insert((person.id, shift.id, row.date)) {
            validation.add_error_with_context(
                codes::DUPLICATE_ASSIGNMENT,
                format!(
                    "Assignment row {}: {} is already on {} for {}",
                    row.row, person.name, shift.shift_type, row.date
                ),
                crate::context! {
                    "row" => row.row,
                    "person" => person.name.as_str(),
                    "date" => row.date.to_string(),
                },
            );
            continue;
        }

        if !person.active {
            validation.add_warning_with_context(
                codes::INACTIVE_PERSON,
                format!("Assignment row {}: {} is inactive", row.row, person.name),
                crate::context! { "row" => row.row, "person" => person.name.as_str() },
            );
        }

        if !person.specialty.satisfies(shift.specialty_constraint) {
            validation.add_warning_with_context(
                codes::SPECIALTY_MISMATCH,
                format!(
                    "Assignment row {}: {} ({}) on {} shift requiring {}",
                    row.row,
                    person.name,
                    person.specialty,
                    shift.shift_type,
                    shift.specialty_constraint
                ),
                crate::context! {
                    "row" => row.row,
                    "person" => person.name.as_str(),
                    "specialty" => person.specialty.as_str(),
                    "constraint" => shift.specialty_constraint.as_str(),
                },
            );
        }

        assignments.push(Assignment::new(
            person.id,
            shift.id,
            row.date,
            row.original_shift_type.as_str(),
            request.source,
            request.actor,
        ));
    }

    if !unknown.is_empty() {
        let names: Vec<String> = unknown.into_iter().collect();
        validation.add_error_with_context(
            codes::UNKNOWN_PEOPLE,
            format!("{} unknown people: {}", names.len(), names.join(", ")),
            crate::context! { "count" => names.len(), "names" => names },
        );
    }

    ImportPlan {
        shifts,
        assignments,
    }
}

/// Weekdays with scheduled shifts but nobody on MidC
fn check_weekday_midc(plan: &ImportPlan, validation: &mut ValidationResult) {
    let midc: HashSet<_> = plan
        .shifts
        .iter()
        .filter(|s| s.shift_type == ShiftType::MidC)
        .map(|s| s.id)
        .collect();
    let covered: HashSet<NaiveDate> = plan
        .assignments
        .iter()
        .filter(|a| midc.contains(&a.shift_instance_id))
        .map(|a| a.schedule_date)
        .collect();

    let scheduled: BTreeSet<NaiveDate> = plan.shifts.iter().map(|s| s.schedule_date).collect();
    for date in scheduled {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) || covered.contains(&date) {
            continue;
        }
        validation.add_warning_with_context(
            codes::MISSING_MIDC,
            format!("No MidC assignment on weekday {date}"),
            crate::context! { "date" => date.to_string() },
        );
    }
}
