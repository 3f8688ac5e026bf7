//! Coverage query integration tests
//!
//! Runs coverage end to end: data stored through a repository, loaded in a
//! fixed number of calls and resolved with the reassignment rules.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use proptest::prelude::*;
use radshift::coverage::{resolve_coverage, CoverageStatus, ReassignmentRules};
use radshift::models::{
    Assignment, DateRange, HospitalId, Person, PersonId, ShiftInstance, ShiftType, Specialty,
    StudyType, UserId,
};
use radshift::service::CoverageService;
use radshift::storage::{
    CountingSource, MemoryRepository, ScheduleRepository, SharedRepository, SqliteRepository,
    StorageError, COVERAGE_FETCHES,
};

use crate::common::{assignment, date, seeded_repo, shift, spec, store_version};

// ============================================================================
// Reassignment through storage
// ============================================================================

#[tokio::test]
async fn test_overnight_body_only_and_general_split() {
    let (repo, alice, bob) = seeded_repo().await;
    let hospital = HospitalId::new();
    let version = store_version(repo.as_ref(), hospital, |v| {
        let on1 = shift(v, spec(ShiftType::On1, 15, StudyType::General, 2));
        let assignments = vec![assignment(alice.id, &on1), assignment(bob.id, &on1)];
        (vec![on1], assignments)
    })
    .await;

    let shared: SharedRepository = repo;
    let service = CoverageService::new(shared, ReassignmentRules::default());
    let report = service.coverage(version.id, None).await.unwrap();

    let body = report.line(ShiftType::On1, StudyType::Body, date(15)).unwrap();
    let neuro = report.line(ShiftType::On1, StudyType::Neuro, date(15)).unwrap();
    assert_eq!((body.required, body.assigned), (1, 1));
    assert_eq!((neuro.required, neuro.assigned), (1, 1));
    assert_eq!(body.status, CoverageStatus::Full);
    assert!(report
        .line(ShiftType::On1, StudyType::General, date(15))
        .is_none());
    assert!(report.is_fully_covered());
    assert_eq!(report.overall_ratio, 1.0);
}

#[tokio::test]
async fn test_midday_group_follows_configured_rules() {
    let (repo, alice, _) = seeded_repo().await;
    let version = store_version(repo.as_ref(), HospitalId::new(), |v| {
        let midc = shift(v, spec(ShiftType::MidC, 6, StudyType::General, 2));
        let a = vec![assignment(alice.id, &midc)];
        (vec![midc], a)
    })
    .await;
    let shared: SharedRepository = repo;

    let overnight_only = CoverageService::new(shared.clone(), ReassignmentRules::default());
    let report = overnight_only.coverage(version.id, None).await.unwrap();
    let general = report
        .line(ShiftType::MidC, StudyType::General, date(6))
        .unwrap();
    assert_eq!((general.required, general.assigned), (2, 1));

    let with_midday = CoverageService::new(
        shared,
        ReassignmentRules::default().with_group(radshift::coverage::ReassignmentGroup::midday()),
    );
    let report = with_midday.coverage(version.id, None).await.unwrap();
    let body = report.line(ShiftType::MidC, StudyType::Body, date(6)).unwrap();
    let neuro = report.line(ShiftType::MidC, StudyType::Neuro, date(6)).unwrap();
    assert_eq!((body.required, body.assigned), (1, 1));
    assert_eq!((neuro.required, neuro.assigned), (1, 0));
    assert_eq!(report.under_staffed.len(), 1);
}

#[tokio::test]
async fn test_zero_desired_reports_full_ratio() {
    let (repo, _, bob) = seeded_repo().await;
    let version = store_version(repo.as_ref(), HospitalId::new(), |v| {
        let idle = shift(v, spec(ShiftType::On2, 9, StudyType::General, 0));
        let staffed = shift(v, spec(ShiftType::On1, 9, StudyType::General, 1));
        let a = vec![assignment(bob.id, &staffed)];
        (vec![idle, staffed], a)
    })
    .await;
    let shared: SharedRepository = repo;
    let service = CoverageService::new(shared, ReassignmentRules::default());

    let report = service.coverage(version.id, None).await.unwrap();
    let idle = report
        .line(ShiftType::On2, StudyType::General, date(9))
        .unwrap();
    assert_eq!(idle.coverage_ratio, 1.0);
    assert_eq!(idle.status, CoverageStatus::Full);
    assert!(report.under_staffed.is_empty());
    assert_eq!(report.overall_ratio, 1.0);
}

#[tokio::test]
async fn test_range_limits_positions() {
    let (repo, _, bob) = seeded_repo().await;
    let version = store_version(repo.as_ref(), HospitalId::new(), |v| {
        let shifts: Vec<_> = (1..=10)
            .map(|d| shift(v, spec(ShiftType::On1, d, StudyType::General, 1)))
            .collect();
        let a = shifts.iter().map(|s| assignment(bob.id, s)).collect();
        (shifts, a)
    })
    .await;
    let shared: SharedRepository = repo;
    let service = CoverageService::new(shared, ReassignmentRules::default());

    let window = DateRange::new(date(3), date(5)).unwrap();
    let report = service.coverage(version.id, Some(window)).await.unwrap();
    assert_eq!(report.lines.len(), 3);
    assert!(report.lines.iter().all(|l| window.contains(l.date)));
    assert_eq!(report.orphaned_assignments, 0);
}

#[tokio::test]
async fn test_deleted_version_has_no_coverage_sqlite() {
    let repo = Arc::new(SqliteRepository::in_memory().unwrap());
    let version = store_version(repo.as_ref(), HospitalId::new(), |v| {
        (vec![shift(v, spec(ShiftType::On1, 4, StudyType::General, 1))], vec![])
    })
    .await;
    let shared: SharedRepository = repo.clone();
    let service = CoverageService::new(shared, ReassignmentRules::default());
    assert_eq!(service.coverage(version.id, None).await.unwrap().lines.len(), 1);

    repo.soft_delete_version(version.id, UserId::new()).await.unwrap();
    let err = service.coverage(version.id, None).await.unwrap_err();
    assert!(matches!(
        err,
        radshift::error::Error::Storage(StorageError::NotFound { .. })
    ));
    assert!(service
        .coverage(radshift::models::ScheduleVersionId::new(), None)
        .await
        .is_err());
}

// ============================================================================
// Fetch count
// ============================================================================

async fn fetches_for(shift_count: usize) -> (usize, usize) {
    let repo = Arc::new(MemoryRepository::new());
    let staff = Person::new("Night Staff", Specialty::Both, UserId::new());
    repo.upsert_person(&staff).await.unwrap();

    let types = ShiftType::all();
    let version = store_version(repo.as_ref(), HospitalId::new(), |v| {
        let shifts: Vec<_> = (0..shift_count)
            .map(|i| {
                let day = (i % 31) as u32 + 1;
                shift(v, spec(types[i % types.len()], day, StudyType::General, 1))
            })
            .collect();
        let a = shifts.iter().map(|s| assignment(staff.id, s)).collect();
        (shifts, a)
    })
    .await;

    let counting = Arc::new(CountingSource::new(repo.clone()));
    let service = CoverageService::new(counting.clone(), ReassignmentRules::default());
    let report = service.coverage(version.id, None).await.unwrap();
    assert_eq!(report.total_assigned as usize, shift_count);
    (report.fetch_count, counting.calls())
}

#[tokio::test]
async fn test_fetch_count_independent_of_size() {
    for size in [10, 10_000] {
        let (reported, observed) = fetches_for(size).await;
        assert_eq!(reported, COVERAGE_FETCHES, "{size} shifts");
        assert_eq!(observed, COVERAGE_FETCHES, "{size} shifts");
    }
}

// ============================================================================
// Specialty updates
// ============================================================================

#[tokio::test]
async fn test_specialty_change_applies_on_next_query_sqlite() {
    let repo = Arc::new(SqliteRepository::in_memory().unwrap());
    let mut carol = Person::new("Carol Switch", Specialty::Both, UserId::new());
    let dan = Person::new("Dan Both", Specialty::Both, UserId::new());
    repo.upsert_person(&carol).await.unwrap();
    repo.upsert_person(&dan).await.unwrap();

    let version = store_version(repo.as_ref(), HospitalId::new(), |v| {
        let on2 = shift(v, spec(ShiftType::On2, 20, StudyType::General, 2));
        let a = vec![assignment(carol.id, &on2), assignment(dan.id, &on2)];
        (vec![on2], a)
    })
    .await;
    let shared: SharedRepository = repo.clone();
    let service = CoverageService::new(shared, ReassignmentRules::default());

    let before = service.coverage(version.id, None).await.unwrap();
    assert!(before
        .line(ShiftType::On2, StudyType::General, date(20))
        .is_some());

    carol.specialty = Specialty::BodyOnly;
    carol.lifecycle.touch(UserId::new());
    repo.upsert_person(&carol).await.unwrap();

    let after = service.coverage(version.id, None).await.unwrap();
    assert!(after
        .line(ShiftType::On2, StudyType::General, date(20))
        .is_none());
    let body = after.line(ShiftType::On2, StudyType::Body, date(20)).unwrap();
    assert_eq!(body.assigned, 1);
}

#[tokio::test]
async fn test_unavailable_store_fails_whole_query() {
    let (repo, _, bob) = seeded_repo().await;
    let version = store_version(repo.as_ref(), HospitalId::new(), |v| {
        let on1 = shift(v, spec(ShiftType::On1, 2, StudyType::General, 1));
        let a = vec![assignment(bob.id, &on1)];
        (vec![on1], a)
    })
    .await;
    repo.set_available(false);
    let shared: SharedRepository = repo.clone();
    let service = CoverageService::new(shared, ReassignmentRules::default());

    assert!(service.coverage(version.id, None).await.is_err());
    repo.set_available(true);
    assert!(service.coverage(version.id, None).await.is_ok());
}

// ============================================================================
// Determinism
// ============================================================================

type Scenario = (Vec<ShiftInstance>, Vec<Assignment>, HashMap<PersonId, Specialty>);

/// A week of overnight and midday shifts staffed by a mixed roster
fn scenario() -> &'static Scenario {
    static SCENARIO: OnceLock<Scenario> = OnceLock::new();
    SCENARIO.get_or_init(|| {
        let version = radshift::models::ScheduleVersionId::new();
        let roster: Vec<(PersonId, Specialty)> = [
            Specialty::BodyOnly,
            Specialty::Both,
            Specialty::NeuroOnly,
            Specialty::Both,
        ]
        .into_iter()
        .map(|s| (PersonId::new(), s))
        .collect();

        let mut shifts = Vec::new();
        let mut assignments = Vec::new();
        for day in 1..=7u32 {
            for (i, shift_type) in [ShiftType::On1, ShiftType::On2, ShiftType::MidC]
                .into_iter()
                .enumerate()
            {
                let s = shift(version, spec(shift_type, day, StudyType::General, 2));
                let (first, _) = roster[(day as usize + i) % roster.len()];
                let (second, _) = roster[(day as usize + i + 1) % roster.len()];
                assignments.push(assignment(first, &s));
                assignments.push(assignment(second, &s));
                // repeated triple
                assignments.push(assignment(first, &s));
                shifts.push(s);
            }
        }
        (shifts, assignments, roster.into_iter().collect())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_report_independent_of_input_order(
        shifts in Just(scenario().0.clone()).prop_shuffle(),
        assignments in Just(scenario().1.clone()).prop_shuffle(),
    ) {
        let (base_shifts, base_assignments, specialties) = scenario();
        let rules = ReassignmentRules::default();
        let expected = resolve_coverage(base_shifts, base_assignments, specialties, &rules);
        let actual = resolve_coverage(&shifts, &assignments, specialties, &rules);
        prop_assert_eq!(actual, expected);
    }
}
