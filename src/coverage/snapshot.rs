//! Stored coverage calculations

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::narrative::CoverageNarrative;
use super::report::CoverageReport;
use crate::models::{CoverageSnapshotId, DateRange, HospitalId, ScheduleVersionId, UserId};
use crate::validation::ValidationResult;

/// A coverage report as calculated at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSnapshot {
    pub id: CoverageSnapshotId,
    pub schedule_version_id: ScheduleVersionId,
    pub hospital_id: HospitalId,
    /// Window the report covers; `None` when the request missed the version
    pub period: Option<DateRange>,
    pub report: CoverageReport,
    /// COVERAGE_GAP warnings at calculation time
    pub gaps: ValidationResult,
    pub calculated_at: DateTime<Utc>,
    pub calculated_by: UserId,
}

impl CoverageSnapshot {
    pub fn new(
        schedule_version_id: ScheduleVersionId,
        hospital_id: HospitalId,
        period: Option<DateRange>,
        report: CoverageReport,
        gaps: ValidationResult,
        actor: UserId,
    ) -> Self {
        Self {
            id: CoverageSnapshotId::new(),
            schedule_version_id,
            hospital_id,
            period,
            report,
            gaps,
            calculated_at: Utc::now(),
            calculated_by: actor,
        }
    }

    /// UTC calendar day of the calculation
    pub fn calculation_date(&self) -> NaiveDate {
        self.calculated_at.date_naive()
    }

    /// Data-source calls the calculation used
    pub fn fetch_count(&self) -> usize {
        self.report.fetch_count
    }

    pub fn narrative(&self) -> CoverageNarrative {
        CoverageNarrative::from_report(&self.report)
    }
}
