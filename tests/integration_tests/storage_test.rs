//! Storage backend integration tests
//!
//! The same scenarios run against SQLite and the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use radshift::models::{
    BatchState, HospitalId, Person, ScheduleVersion, ScrapeBatch, ShiftType, Specialty,
    StudyType, UserId, VersionStatus,
};
use radshift::storage::{
    CoverageDataSource, ImportCommit, MemoryRepository, ScheduleRepository, SharedRepository,
    SqliteRepository, StorageError,
};
use chrono::Utc;
use radshift::coverage::{CoverageReport, CoverageSnapshot};
use radshift::validation::ValidationResult;
use tempfile::TempDir;

use crate::common::{assignment, date, shift, spec, store_version};

fn backends() -> Vec<(&'static str, SharedRepository, Option<TempDir>)> {
    let dir = TempDir::new().unwrap();
    let sqlite = SqliteRepository::new(dir.path().join("radshift.db")).unwrap();
    vec![
        ("memory", Arc::new(MemoryRepository::new()), None),
        ("sqlite", Arc::new(sqlite), Some(dir)),
    ]
}

async fn staff(repo: &SharedRepository) -> Person {
    let person = Person::new("Bob Both", Specialty::Both, UserId::new());
    repo.upsert_person(&person).await.unwrap();
    person
}

async fn pending_batch(repo: &SharedRepository, hospital: HospitalId) -> ScrapeBatch {
    let batch = ScrapeBatch::new(hospital, date(1), date(31), "checksum", UserId::new()).unwrap();
    repo.create_batch(&batch).await.unwrap();
    batch
}

// ============================================================================
// Import commit
// ============================================================================

#[tokio::test]
async fn test_commit_import_persists_everything() {
    for (name, repo, _dir) in backends() {
        let bob = staff(&repo).await;
        let hospital = HospitalId::new();
        let version = store_version(repo.as_ref(), hospital, |v| {
            let on1 = shift(v, spec(ShiftType::On1, 3, StudyType::General, 1));
            let a = vec![assignment(bob.id, &on1)];
            (vec![on1], a)
        })
        .await;

        let batch_id = version.scrape_batch_id.unwrap();
        let batch = repo.get_batch(batch_id).await.unwrap().unwrap();
        assert_eq!(batch.state, BatchState::Complete, "{name}");
        assert_eq!(batch.row_count, 2, "{name}");

        let stored = repo.version_for_batch(batch_id).await.unwrap().unwrap();
        assert_eq!(stored.id, version.id, "{name}");
        assert_eq!(
            repo.shifts_for_version(version.id, None).await.unwrap().len(),
            1,
            "{name}"
        );
        assert_eq!(
            repo.active_assignments_for_version(version.id, None)
                .await
                .unwrap()
                .len(),
            1,
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_commit_on_finalized_batch_writes_nothing() {
    for (name, repo, _dir) in backends() {
        let hospital = HospitalId::new();
        let first = store_version(repo.as_ref(), hospital, |_| (vec![], vec![])).await;
        let batch_id = first.scrape_batch_id.unwrap();
        let batch = repo.get_batch(batch_id).await.unwrap().unwrap();

        let second =
            ScheduleVersion::new(hospital, date(1), date(31), Some(batch_id), UserId::new())
                .unwrap();
        let on1 = shift(second.id, spec(ShiftType::On1, 4, StudyType::General, 1));
        let err = repo
            .commit_import(ImportCommit {
                batch,
                version: second.clone(),
                shifts: vec![on1],
                assignments: vec![],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Conflict(_)), "{name}: {err}");
        assert!(repo.get_version(second.id).await.unwrap().is_none(), "{name}");
        assert!(repo
            .shifts_for_version(second.id, None)
            .await
            .unwrap()
            .is_empty());
    }
}

#[tokio::test]
async fn test_second_commit_of_same_payload_is_duplicate() {
    for (name, repo, _dir) in backends() {
        let hospital = HospitalId::new();
        let mut first = pending_batch(&repo, hospital).await;
        let mut second = pending_batch(&repo, hospital).await;

        let commit = |batch: &ScrapeBatch| {
            let version =
                ScheduleVersion::new(hospital, date(1), date(31), Some(batch.id), UserId::new())
                    .unwrap();
            ImportCommit {
                batch: batch.clone(),
                version,
                shifts: vec![],
                assignments: vec![],
            }
        };
        first.mark_complete(0).unwrap();
        second.mark_complete(0).unwrap();
        repo.commit_import(commit(&first)).await.unwrap();

        let losing = commit(&second);
        let err = repo.commit_import(losing.clone()).await.unwrap_err();
        assert!(
            matches!(err, StorageError::DuplicateBatch { existing } if existing == first.id),
            "{name}: {err}"
        );
        assert!(repo.get_version(losing.version.id).await.unwrap().is_none(), "{name}");
        assert_eq!(
            repo.get_batch(second.id).await.unwrap().unwrap().state,
            BatchState::Pending,
            "{name}"
        );
        assert_eq!(repo.list_versions(hospital, None).await.unwrap().len(), 1, "{name}");
    }
}

#[tokio::test]
async fn test_coverage_snapshots_by_version_and_day() {
    for (name, repo, _dir) in backends() {
        let hospital = HospitalId::new();
        let version = store_version(repo.as_ref(), hospital, |_| (vec![], vec![])).await;
        let snapshot = |at: chrono::DateTime<Utc>| {
            let mut s = CoverageSnapshot::new(
                version.id,
                hospital,
                Some(version.effective_range()),
                CoverageReport::default(),
                ValidationResult::new(),
                UserId::new(),
            );
            s.calculated_at = at;
            s
        };

        assert!(repo.latest_coverage_snapshot(version.id).await.unwrap().is_none(), "{name}");
        let now = Utc::now();
        let yesterday = snapshot(now - chrono::Duration::days(1));
        let earlier = snapshot(now - chrono::Duration::seconds(1));
        let latest = snapshot(now);
        for s in [&earlier, &latest, &yesterday] {
            repo.save_coverage_snapshot(s).await.unwrap();
        }

        let found = repo.latest_coverage_snapshot(version.id).await.unwrap().unwrap();
        assert_eq!(found, latest, "{name}");

        let today: Vec<_> = repo
            .coverage_snapshots_on(hospital, latest.calculation_date())
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        if earlier.calculation_date() == latest.calculation_date() {
            assert_eq!(today, vec![latest.id, earlier.id], "{name}");
        }
        assert!(!today.contains(&yesterday.id), "{name}");
        assert!(repo
            .coverage_snapshots_on(HospitalId::new(), latest.calculation_date())
            .await
            .unwrap()
            .is_empty());

        let mut orphan = snapshot(now);
        orphan.schedule_version_id = radshift::models::ScheduleVersionId::new();
        let err = repo.save_coverage_snapshot(&orphan).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }), "{name}: {err}");
    }
}

#[tokio::test]
async fn test_sqlite_rolls_back_partial_import() {
    let repo: SharedRepository = Arc::new(SqliteRepository::in_memory().unwrap());
    let hospital = HospitalId::new();
    let mut batch = pending_batch(&repo, hospital).await;
    let version =
        ScheduleVersion::new(hospital, date(1), date(31), Some(batch.id), UserId::new()).unwrap();
    let on1 = shift(version.id, spec(ShiftType::On1, 5, StudyType::General, 1));
    // never stored, so the assignment insert fails after the version and shift
    let ghost = Person::new("Ghost", Specialty::Both, UserId::new());
    let a = assignment(ghost.id, &on1);
    batch.mark_complete(2).unwrap();

    let result = repo
        .commit_import(ImportCommit {
            batch: batch.clone(),
            version: version.clone(),
            shifts: vec![on1],
            assignments: vec![a],
        })
        .await;

    assert!(result.is_err());
    assert!(repo.get_version(version.id).await.unwrap().is_none());
    assert!(repo
        .shifts_for_version(version.id, None)
        .await
        .unwrap()
        .is_empty());
    let stored = repo.get_batch(batch.id).await.unwrap().unwrap();
    assert_eq!(stored.state, BatchState::Pending);
}

// ============================================================================
// Assignments
// ============================================================================

#[tokio::test]
async fn test_second_active_assignment_conflicts() {
    for (name, repo, _dir) in backends() {
        let bob = staff(&repo).await;
        let mut on1 = None;
        let version = store_version(repo.as_ref(), HospitalId::new(), |v| {
            let s = shift(v, spec(ShiftType::On1, 8, StudyType::General, 1));
            on1 = Some(s.clone());
            let a = vec![assignment(bob.id, &s)];
            (vec![s], a)
        })
        .await;
        let on1 = on1.unwrap();

        let err = repo
            .add_assignment(&assignment(bob.id, &on1))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)), "{name}: {err}");

        // soft-deleting the original frees the slot
        let existing = repo
            .active_assignments_for_version(version.id, None)
            .await
            .unwrap();
        repo.soft_delete_assignment(existing[0].id, UserId::new())
            .await
            .unwrap();
        repo.add_assignment(&assignment(bob.id, &on1)).await.unwrap();

        let active = repo
            .active_assignments_for_version(version.id, None)
            .await
            .unwrap();
        assert_eq!(active.len(), 1, "{name}");
        assert_ne!(active[0].id, existing[0].id, "{name}");
    }
}

#[tokio::test]
async fn test_add_assignment_requires_known_shift() {
    for (name, repo, _dir) in backends() {
        let bob = staff(&repo).await;
        let orphan_shift = shift(
            radshift::models::ScheduleVersionId::new(),
            spec(ShiftType::On2, 9, StudyType::General, 1),
        );
        let err = repo
            .add_assignment(&assignment(bob.id, &orphan_shift))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }), "{name}: {err}");
    }
}

// ============================================================================
// Batches and versions
// ============================================================================

#[tokio::test]
async fn test_find_complete_batch_matches_window_and_checksum() {
    for (name, repo, _dir) in backends() {
        let hospital = HospitalId::new();
        let pending = pending_batch(&repo, hospital).await;
        assert!(repo
            .find_complete_batch(hospital, date(1), date(31), "checksum")
            .await
            .unwrap()
            .is_none());

        let mut done = pending.clone();
        done.mark_complete(0).unwrap();
        repo.update_batch(&done).await.unwrap();

        let found = repo
            .find_complete_batch(hospital, date(1), date(31), "checksum")
            .await
            .unwrap();
        assert_eq!(found.map(|b| b.id), Some(pending.id), "{name}");
        assert!(repo
            .find_complete_batch(hospital, date(1), date(30), "checksum")
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .find_complete_batch(HospitalId::new(), date(1), date(31), "checksum")
            .await
            .unwrap()
            .is_none());
    }
}

#[tokio::test]
async fn test_list_versions_newest_first_and_hides_deleted() {
    for (name, repo, _dir) in backends() {
        let hospital = HospitalId::new();
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(store_version(repo.as_ref(), hospital, |_| (vec![], vec![])).await.id);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let listed: Vec<_> = repo
            .list_versions(hospital, None)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(listed, ids.iter().rev().copied().collect::<Vec<_>>(), "{name}");

        let deleted = repo
            .soft_delete_version(ids[1], UserId::new())
            .await
            .unwrap();
        assert!(deleted.is_deleted());
        let listed = repo.list_versions(hospital, None).await.unwrap();
        assert_eq!(listed.len(), 2, "{name}");
        assert!(listed.iter().all(|v| v.id != ids[1]));

        // audit record is kept
        let kept = repo.get_version(ids[1]).await.unwrap().unwrap();
        assert!(kept.lifecycle.deleted_at.is_some(), "{name}");
        assert_eq!(kept.status, VersionStatus::Staging);
    }
}

#[tokio::test]
async fn test_deleted_version_cannot_be_promoted() {
    for (name, repo, _dir) in backends() {
        let v = store_version(repo.as_ref(), HospitalId::new(), |_| (vec![], vec![])).await;
        repo.soft_delete_version(v.id, UserId::new()).await.unwrap();
        let err = repo
            .promote_exclusive(v.id, UserId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }), "{name}: {err}");
    }
}

#[tokio::test]
async fn test_promotion_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("radshift.db");
    let hospital = HospitalId::new();

    let (v0, v1) = {
        let repo: SharedRepository = Arc::new(SqliteRepository::new(&path).unwrap());
        let v0 = store_version(repo.as_ref(), hospital, |_| (vec![], vec![])).await;
        let v1 = store_version(repo.as_ref(), hospital, |_| (vec![], vec![])).await;
        repo.promote_exclusive(v0.id, UserId::new()).await.unwrap();
        repo.promote_exclusive(v1.id, UserId::new()).await.unwrap();
        (v0.id, v1.id)
    };

    let reopened = SqliteRepository::new(&path).unwrap();
    let production = reopened
        .list_versions(hospital, Some(VersionStatus::Production))
        .await
        .unwrap();
    assert_eq!(production.len(), 1);
    assert_eq!(production[0].id, v1);
    let archived = reopened.get_version(v0).await.unwrap().unwrap();
    assert_eq!(archived.status, VersionStatus::Archived);
    assert!(archived.archived_at.is_some());
}
