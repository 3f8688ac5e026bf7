//! Promotion integration tests
//!
//! Verifies the "at most one PRODUCTION version per hospital" invariant
//! under concurrent promotions and readers, for both backends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use radshift::models::{HospitalId, ScheduleVersion, UserId, VersionStatus};
use radshift::service::VersionService;
use radshift::storage::{MemoryRepository, SharedRepository, SqliteRepository};
use tempfile::TempDir;

use crate::common::store_version;

async fn staged_versions(
    repo: &SharedRepository,
    hospital: HospitalId,
    n: usize,
) -> Vec<ScheduleVersion> {
    let mut versions = Vec::with_capacity(n);
    for _ in 0..n {
        versions.push(store_version(repo.as_ref(), hospital, |_| (vec![], vec![])).await);
    }
    versions
}

async fn assert_single_production_under_contention(repo: SharedRepository) {
    let hospital = HospitalId::new();
    let versions = staged_versions(&repo, hospital, 8).await;
    let service = Arc::new(VersionService::new(repo.clone()));

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let repo = repo.clone();
        let done = done.clone();
        tokio::spawn(async move {
            let mut observations = 0usize;
            while !done.load(Ordering::SeqCst) {
                let production = repo
                    .list_versions(hospital, Some(VersionStatus::Production))
                    .await
                    .unwrap();
                assert!(production.len() <= 1, "saw {} PRODUCTION", production.len());
                observations += 1;
                tokio::task::yield_now().await;
            }
            observations
        })
    };

    let mut handles = Vec::new();
    for version in &versions {
        let service = service.clone();
        let id = version.id;
        handles.push(tokio::spawn(async move {
            service.promote(id, UserId::new()).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    assert!(reader.await.unwrap() > 0);

    let all = repo.list_versions(hospital, None).await.unwrap();
    let production: Vec<_> = all
        .iter()
        .filter(|v| v.status == VersionStatus::Production)
        .collect();
    let archived = all
        .iter()
        .filter(|v| v.status == VersionStatus::Archived)
        .count();
    assert_eq!(production.len(), 1);
    assert_eq!(archived, versions.len() - 1);
    assert!(production[0].promoted_at.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_promotions_memory() {
    assert_single_production_under_contention(Arc::new(MemoryRepository::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_promotions_sqlite() {
    let dir = TempDir::new().unwrap();
    let repo = SqliteRepository::new(dir.path().join("radshift.db")).unwrap();
    assert_single_production_under_contention(Arc::new(repo)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_backend_serializes_without_service_lock() {
    let repo: SharedRepository = Arc::new(MemoryRepository::new());
    let hospital = HospitalId::new();
    let versions = staged_versions(&repo, hospital, 6).await;

    let mut handles = Vec::new();
    for version in &versions {
        let repo = repo.clone();
        let id = version.id;
        handles.push(tokio::spawn(async move {
            repo.promote_exclusive(id, UserId::new()).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let production = repo
        .list_versions(hospital, Some(VersionStatus::Production))
        .await
        .unwrap();
    assert_eq!(production.len(), 1);
}

#[tokio::test]
async fn test_promote_v1_over_v0() {
    let repo: SharedRepository = Arc::new(MemoryRepository::new());
    let hospital = HospitalId::new();
    let other_hospital = HospitalId::new();
    let service = VersionService::new(repo.clone());

    let v0 = store_version(repo.as_ref(), hospital, |_| (vec![], vec![])).await;
    let v1 = store_version(repo.as_ref(), hospital, |_| (vec![], vec![])).await;
    let elsewhere = store_version(repo.as_ref(), other_hospital, |_| (vec![], vec![])).await;

    service.promote(v0.id, UserId::new()).await.unwrap();
    service.promote(elsewhere.id, UserId::new()).await.unwrap();
    let outcome = service.promote(v1.id, UserId::new()).await.unwrap();

    assert_eq!(outcome.promoted.status, VersionStatus::Production);
    assert_eq!(outcome.archived.len(), 1);
    assert_eq!(outcome.archived[0].id, v0.id);
    assert!(outcome.archived[0].archived_at.is_some());

    let v0 = service.get(v0.id).await.unwrap().unwrap();
    let v1 = service.get(v1.id).await.unwrap().unwrap();
    let elsewhere = service.get(elsewhere.id).await.unwrap().unwrap();
    assert_eq!(v0.status, VersionStatus::Archived);
    assert_eq!(v1.status, VersionStatus::Production);
    assert_eq!(elsewhere.status, VersionStatus::Production);
}

#[tokio::test]
async fn test_failed_transition_leaves_state_unchanged() {
    let repo: SharedRepository = Arc::new(MemoryRepository::new());
    let service = VersionService::new(repo.clone());
    let hospital = HospitalId::new();
    let v = store_version(repo.as_ref(), hospital, |_| (vec![], vec![])).await;

    assert!(service.archive(v.id, UserId::new()).await.is_err());
    assert_eq!(
        service.get(v.id).await.unwrap().unwrap().status,
        VersionStatus::Staging
    );

    service.promote(v.id, UserId::new()).await.unwrap();
    service.archive(v.id, UserId::new()).await.unwrap();
    assert!(service.promote(v.id, UserId::new()).await.is_err());
    assert_eq!(
        service.get(v.id).await.unwrap().unwrap().status,
        VersionStatus::Archived
    );
}
