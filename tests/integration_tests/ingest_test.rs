//! Ingestion integration tests
//!
//! Tests the all-or-nothing import routine:
//! 1. Structural failures persist nothing
//! 2. Clean imports produce a promotable STAGING version
//! 3. Duplicate payloads are short-circuited
//! 4. Background submission can be polled

use std::sync::Arc;
use std::time::Duration;

use radshift::config::IngestConfig;
use radshift::error::RadshiftErrorTrait;
use radshift::ingest::IngestService;
use radshift::models::{
    BatchState, HospitalId, Person, ScrapeBatchId, Specialty, UserId, VersionStatus,
};
use radshift::service::VersionService;
use radshift::storage::{ScheduleRepository, SharedRepository, SqliteRepository};
use radshift::validation::{codes, Severity};

use super::fixtures::{clean_month, hundred_rows_with_three_bad, BAD_ROWS};
use crate::common::{assignment_candidate, import_request, seeded_repo, shift_candidate};

// ============================================================================
// Atomicity
// ============================================================================

#[tokio::test]
async fn test_three_bad_rows_of_hundred_fail_batch() {
    let (repo, _, _) = seeded_repo().await;
    let service = IngestService::new(repo.clone(), IngestConfig::default());
    let (shifts, assignments) = hundred_rows_with_three_bad();
    assert_eq!(shifts.len() + assignments.len(), 100);

    let outcome = service
        .ingest(import_request(HospitalId::new(), shifts, assignments))
        .await
        .unwrap();

    assert!(outcome.is_failed());
    assert_eq!(outcome.batch().state, BatchState::Failed);
    assert!(outcome.batch().completed_at.is_some());
    assert!(outcome.batch().error_message.is_some());
    assert!(outcome.version().is_none());

    let validation = outcome.validation();
    let errors = validation.messages_by_severity(Severity::Error);
    assert_eq!(errors.len(), 3);
    let rows: Vec<_> = errors
        .iter()
        .map(|m| m.context_value("row").and_then(|v| v.as_u64()).unwrap() as usize)
        .collect();
    assert_eq!(rows, BAD_ROWS.to_vec());
    for (message, row) in errors.iter().zip(BAD_ROWS) {
        assert!(message.text.contains(&row.to_string()));
    }

    assert_eq!(repo.shift_count().await, 0);
    assert_eq!(repo.assignment_count().await, 0);
    assert!(repo
        .version_for_batch(outcome.batch().id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_clean_import_is_promotable() {
    let (repo, _, _) = seeded_repo().await;
    let hospital = HospitalId::new();
    let service = IngestService::new(repo.clone(), IngestConfig::default());
    let (shifts, assignments) = clean_month();

    let outcome = service
        .ingest(import_request(hospital, shifts, assignments))
        .await
        .unwrap();

    assert!(outcome.is_completed());
    assert_eq!(outcome.batch().row_count, 124);
    let version = outcome.version().unwrap().clone();
    assert_eq!(version.status, VersionStatus::Staging);
    assert_eq!(version.scrape_batch_id, Some(outcome.batch().id));
    assert!(version.validation.can_promote(), "{}", version.validation.summary());
    assert_eq!(
        version.validation.messages_by_code(codes::IMPORT_SUMMARY).len(),
        1
    );

    let versions = VersionService::new(repo.clone());
    let promoted = versions.promote(version.id, version.lifecycle.created_by).await;
    assert!(promoted.is_ok());
    let stored = repo.get_version(version.id).await.unwrap().unwrap();
    assert_eq!(stored.status, VersionStatus::Production);
    assert_eq!(stored.validation, version.validation);
}

#[tokio::test]
async fn test_unknown_people_block_promotion_but_keep_version() {
    let (repo, _, _) = seeded_repo().await;
    let service = IngestService::new(
        repo.clone(),
        IngestConfig {
            require_weekday_midc: false,
            ..IngestConfig::default()
        },
    );
    let request = import_request(
        HospitalId::new(),
        vec![shift_candidate(1, "ON1", 4)],
        vec![
            assignment_candidate(2, "body, a", "ON1", 4),
            assignment_candidate(3, "Carol Unknown", "ON1", 4),
            assignment_candidate(4, "Dan Unknown", "ON1", 4),
        ],
    );

    let outcome = service.ingest(request).await.unwrap();
    assert!(outcome.is_completed());

    let unknown = outcome.validation().messages_by_code(codes::UNKNOWN_PEOPLE);
    assert_eq!(unknown.len(), 1);
    assert_eq!(
        unknown[0].context_value("count"),
        Some(&serde_json::json!(2))
    );
    assert_eq!(repo.assignment_count().await, 1);

    let version = outcome.version().unwrap();
    let err = VersionService::new(repo.clone())
        .promote(version.id, version.lifecycle.created_by)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        radshift::error::Error::PromotionBlocked { .. }
    ));
}

// ============================================================================
// Duplicate Detection
// ============================================================================

#[tokio::test]
async fn test_duplicate_payload_is_skipped() {
    let (repo, _, _) = seeded_repo().await;
    let hospital = HospitalId::new();
    let service = IngestService::new(repo.clone(), IngestConfig::default());
    let (shifts, assignments) = clean_month();
    let request = import_request(hospital, shifts, assignments);

    let first = service.ingest(request.clone()).await.unwrap();
    let shifts_after_first = repo.shift_count().await;
    let second = service.ingest(request).await.unwrap();

    assert!(second.is_duplicate());
    assert_eq!(second.batch().id, first.batch().id);
    assert_eq!(
        second.version().map(|v| v.id),
        first.version().map(|v| v.id)
    );
    assert_eq!(repo.shift_count().await, shifts_after_first);
}

#[tokio::test]
async fn test_same_payload_other_window_is_not_duplicate() {
    let (repo, _, _) = seeded_repo().await;
    let hospital = HospitalId::new();
    let service = IngestService::new(repo.clone(), IngestConfig::default());
    let (shifts, assignments) = clean_month();
    let request = import_request(hospital, shifts, assignments);

    let first = service.ingest(request.clone()).await.unwrap();

    let mut wider = request;
    wider.window_end = chrono::NaiveDate::from_ymd_opt(2025, 2, 28).unwrap();
    let second = service.ingest(wider).await.unwrap();

    assert!(second.is_completed());
    assert_ne!(second.batch().id, first.batch().id);
}

#[tokio::test]
async fn test_failed_batch_is_retried_as_new_batch() {
    let (repo, _, _) = seeded_repo().await;
    let service = IngestService::new(repo.clone(), IngestConfig::default());
    let (shifts, assignments) = hundred_rows_with_three_bad();
    let request = import_request(HospitalId::new(), shifts, assignments);

    let first = service.ingest(request.clone()).await.unwrap();
    let retry = service.ingest(request).await.unwrap();

    assert!(first.is_failed());
    assert!(retry.is_failed());
    assert_ne!(first.batch().id, retry.batch().id);
    assert_eq!(
        repo.get_batch(first.batch().id)
            .await
            .unwrap()
            .unwrap()
            .state,
        BatchState::Failed
    );
}

/// Same payload imported by several tasks at once, repeated for many rounds
async fn concurrent_rounds(repo: SharedRepository, rounds: usize, racers: usize) {
    let service = IngestService::new(repo.clone(), IngestConfig::default());
    let (shifts, assignments) = clean_month();

    for round in 0..rounds {
        let hospital = HospitalId::new();
        let request = import_request(hospital, shifts.clone(), assignments.clone());
        let handles: Vec<_> = (0..racers)
            .map(|_| {
                let service = service.clone();
                let request = request.clone();
                tokio::spawn(async move { service.ingest(request).await })
            })
            .collect();

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap().unwrap());
        }

        let completed: Vec<_> = outcomes.iter().filter(|o| o.is_completed()).collect();
        assert_eq!(completed.len(), 1, "round {round}");
        let winner = completed[0].batch().id;
        for outcome in outcomes.iter().filter(|o| !o.is_completed()) {
            assert!(outcome.is_duplicate(), "round {round}");
            assert_eq!(outcome.batch().id, winner, "round {round}");
        }
        assert_eq!(
            repo.list_versions(hospital, None).await.unwrap().len(),
            1,
            "round {round}"
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_imports_create_one_version() {
    let (repo, _, _) = seeded_repo().await;
    concurrent_rounds(repo, 50, 4).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_imports_create_one_version_sqlite() {
    let repo = Arc::new(SqliteRepository::in_memory().unwrap());
    repo.upsert_person(&Person::new("Bob Both", Specialty::Both, UserId::new()))
        .await
        .unwrap();
    concurrent_rounds(repo, 20, 4).await;
}

// ============================================================================
// Background Submission
// ============================================================================

async fn wait_terminal(service: &IngestService, id: ScrapeBatchId) -> BatchState {
    for _ in 0..200 {
        let batch = service.batch(id).await.unwrap().unwrap();
        if batch.state.is_terminal() {
            return batch.state;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    BatchState::Pending
}

#[tokio::test]
async fn test_submit_and_poll() {
    let (repo, _, _) = seeded_repo().await;
    let service = IngestService::new(repo.clone(), IngestConfig::default());

    let (shifts, assignments) = clean_month();
    let good = service
        .submit(import_request(HospitalId::new(), shifts, assignments))
        .await
        .unwrap();

    let (shifts, assignments) = hundred_rows_with_three_bad();
    let bad = service
        .submit(import_request(HospitalId::new(), shifts, assignments))
        .await
        .unwrap();

    assert_eq!(wait_terminal(&service, good).await, BatchState::Complete);
    assert_eq!(wait_terminal(&service, bad).await, BatchState::Failed);
    assert!(repo.version_for_batch(good).await.unwrap().is_some());
    assert!(repo.version_for_batch(bad).await.unwrap().is_none());
}

// ============================================================================
// Data Access Failures
// ============================================================================

#[tokio::test]
async fn test_unavailable_store_propagates_retryable_error() {
    let (repo, _, _) = seeded_repo().await;
    repo.set_available(false);
    let service = IngestService::new(repo.clone(), IngestConfig::default());
    let (shifts, assignments) = clean_month();

    let err = service
        .ingest(import_request(HospitalId::new(), shifts, assignments))
        .await
        .unwrap_err();

    assert!(err.is_recoverable());

    repo.set_available(true);
    assert_eq!(repo.shift_count().await, 0);
}
