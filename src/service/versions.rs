//! Schedule version lifecycle operations
//!
//! Promotion is serialized per hospital twice over: an in-process async lock
//! held here, and the backend's unit of work that promotes the target and
//! archives every other PRODUCTION version together.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::metrics;
use crate::models::{HospitalId, ScheduleVersion, ScheduleVersionId, UserId, VersionStatus};
use crate::storage::{PromotionOutcome, SharedRepository, StorageError};

/// Orchestrates version transitions against the repository
pub struct VersionService {
    repo: SharedRepository,
    hospital_locks: Mutex<HashMap<HospitalId, Arc<Mutex<()>>>>,
}

impl VersionService {
    pub fn new(repo: SharedRepository) -> Self {
        Self {
            repo,
            hospital_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn hospital_lock(&self, hospital_id: HospitalId) -> Arc<Mutex<()>> {
        let mut locks = self.hospital_locks.lock().await;
        Arc::clone(locks.entry(hospital_id).or_default())
    }

    async fn require(&self, version_id: ScheduleVersionId) -> Result<ScheduleVersion> {
        self.repo
            .get_version(version_id)
            .await?
            .filter(|v| !v.is_deleted())
            .ok_or_else(|| StorageError::not_found("version", version_id).into())
    }

    /// Promote a STAGING version and archive the hospital's current
    /// PRODUCTION version in one step
    ///
    /// Versions whose attached validation holds ERROR messages are refused;
    /// WARNING messages do not block.
    pub async fn promote(
        &self,
        version_id: ScheduleVersionId,
        actor: UserId,
    ) -> Result<PromotionOutcome> {
        let version = match self.require(version_id).await {
            Ok(v) => v,
            Err(e) => {
                metrics::record_promotion("error");
                return Err(e);
            }
        };

        let lock = self.hospital_lock(version.hospital_id).await;
        let _guard = lock.lock().await;

        if version.validation.has_errors() {
            metrics::record_promotion("blocked");
            tracing::warn!(
                version_id = %version_id,
                errors = version.validation.error_count(),
                "Promotion blocked by validation errors"
            );
            return Err(Error::PromotionBlocked {
                version_id,
                errors: version.validation.error_count(),
                summary: version.validation.summary(),
            });
        }

        match self.repo.promote_exclusive(version_id, actor).await {
            Ok(outcome) => {
                metrics::record_promotion("promoted");
                tracing::info!(
                    version_id = %version_id,
                    hospital_id = %version.hospital_id,
                    archived = outcome.archived.len(),
                    warnings = version.validation.warning_count(),
                    "Version promoted"
                );
                Ok(outcome)
            }
            Err(e) => {
                let err = Error::from(e);
                let outcome = if matches!(err, Error::Transition(_)) {
                    "rejected"
                } else {
                    "error"
                };
                metrics::record_promotion(outcome);
                tracing::warn!(version_id = %version_id, error = %err, "Promotion failed");
                Err(err)
            }
        }
    }

    /// PRODUCTION -> ARCHIVED
    pub async fn archive(
        &self,
        version_id: ScheduleVersionId,
        actor: UserId,
    ) -> Result<ScheduleVersion> {
        let version = self.require(version_id).await?;
        let lock = self.hospital_lock(version.hospital_id).await;
        let _guard = lock.lock().await;

        let archived = self.repo.archive_version(version_id, actor).await?;
        tracing::info!(version_id = %version_id, "Version archived");
        Ok(archived)
    }

    /// Hide a version from listings and promotion; allowed from any state
    pub async fn soft_delete(
        &self,
        version_id: ScheduleVersionId,
        actor: UserId,
    ) -> Result<ScheduleVersion> {
        let version = self.require(version_id).await?;
        let lock = self.hospital_lock(version.hospital_id).await;
        let _guard = lock.lock().await;

        let deleted = self.repo.soft_delete_version(version_id, actor).await?;
        tracing::info!(version_id = %version_id, status = %deleted.status, "Version deleted");
        Ok(deleted)
    }

    pub async fn get(&self, version_id: ScheduleVersionId) -> Result<Option<ScheduleVersion>> {
        Ok(self.repo.get_version(version_id).await?)
    }

    /// Non-deleted versions of a hospital, newest first
    pub async fn list(
        &self,
        hospital_id: HospitalId,
        status: Option<VersionStatus>,
    ) -> Result<Vec<ScheduleVersion>> {
        Ok(self.repo.list_versions(hospital_id, status).await?)
    }

    /// The PRODUCTION version whose effective range covers `date`
    pub async fn active_version(
        &self,
        hospital_id: HospitalId,
        date: NaiveDate,
    ) -> Result<Option<ScheduleVersion>> {
        let production = self
            .repo
            .list_versions(hospital_id, Some(VersionStatus::Production))
            .await?;
        Ok(production.into_iter().find(|v| v.covers(date)))
    }
}
