//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use radshift::ingest::{AssignmentCandidate, ImportRequest, ShiftCandidate};
use radshift::models::{
    Assignment, AssignmentSource, HospitalId, Person, PersonId, ScheduleVersion,
    ScheduleVersionId, ScrapeBatch, ShiftInstance, ShiftSpec, ShiftType, Specialty, StudyType,
    UserId,
};
use radshift::storage::{ImportCommit, MemoryRepository, ScheduleRepository};

/// January 2025 date
pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Shift spec with overnight hours and BOTH constraint
pub fn spec(shift_type: ShiftType, day: u32, study_type: StudyType, desired: u32) -> ShiftSpec {
    ShiftSpec {
        shift_type,
        schedule_date: date(day),
        start_time: time(22, 0),
        end_time: time(7, 0),
        study_type,
        specialty_constraint: Specialty::Both,
        desired_coverage: desired,
        is_mandatory: true,
    }
}

pub fn shift(version: ScheduleVersionId, spec: ShiftSpec) -> ShiftInstance {
    ShiftInstance::new(version, HospitalId::new(), spec, UserId::new())
}

pub fn assignment(person: PersonId, shift: &ShiftInstance) -> Assignment {
    Assignment::new(
        person,
        shift.id,
        shift.schedule_date,
        shift.shift_type.as_str(),
        AssignmentSource::Amion,
        UserId::new(),
    )
}

pub fn shift_candidate(row: usize, shift_type: &str, day: u32) -> ShiftCandidate {
    ShiftCandidate {
        row,
        shift_type: shift_type.to_string(),
        date: date(day).to_string(),
        start_time: "22:00".to_string(),
        end_time: "07:00".to_string(),
        study_type: "GENERAL".to_string(),
        specialty_constraint: "BOTH".to_string(),
        desired_coverage: 1,
        is_mandatory: true,
    }
}

pub fn assignment_candidate(
    row: usize,
    person: &str,
    shift_type: &str,
    day: u32,
) -> AssignmentCandidate {
    AssignmentCandidate {
        row,
        person_name: person.to_string(),
        shift_type: shift_type.to_string(),
        date: date(day).to_string(),
        study_type: None,
    }
}

/// Request for January 2025
pub fn import_request(
    hospital: HospitalId,
    shifts: Vec<ShiftCandidate>,
    assignments: Vec<AssignmentCandidate>,
) -> ImportRequest {
    ImportRequest {
        hospital_id: hospital,
        window_start: date(1),
        window_end: date(31),
        shifts,
        assignments,
        source: AssignmentSource::Amion,
        actor: UserId::new(),
    }
}

/// Repository seeded with a body-only and a general radiologist
pub async fn seeded_repo() -> (Arc<MemoryRepository>, Person, Person) {
    let repo = Arc::new(MemoryRepository::new());
    let body = Person::new("Alice Body", Specialty::BodyOnly, UserId::new())
        .with_aliases(["BODY, A"]);
    let general = Person::new("Bob Both", Specialty::Both, UserId::new());
    repo.upsert_person(&body).await.unwrap();
    repo.upsert_person(&general).await.unwrap();
    (repo, body, general)
}

/// Store a COMPLETE batch and its STAGING version with the given rows
///
/// `build` receives the new version id and returns shifts and assignments.
pub async fn store_version<F>(
    repo: &dyn ScheduleRepository,
    hospital: HospitalId,
    build: F,
) -> ScheduleVersion
where
    F: FnOnce(ScheduleVersionId) -> (Vec<ShiftInstance>, Vec<Assignment>),
{
    let actor = UserId::new();
    let mut batch = ScrapeBatch::new(
        hospital,
        date(1),
        date(31),
        uuid::Uuid::new_v4().to_string(),
        actor,
    )
    .unwrap();
    repo.create_batch(&batch).await.unwrap();

    let version =
        ScheduleVersion::new(hospital, date(1), date(31), Some(batch.id), actor).unwrap();
    let (shifts, assignments) = build(version.id);
    batch
        .mark_complete((shifts.len() + assignments.len()) as u32)
        .unwrap();

    repo.commit_import(ImportCommit {
        batch,
        version: version.clone(),
        shifts,
        assignments,
    })
    .await
    .unwrap();
    version
}
