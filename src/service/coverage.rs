//! Coverage queries over stored schedule versions

use std::sync::Arc;

use crate::coverage::{resolve_coverage, CoverageReport, CoverageSnapshot, ReassignmentRules};
use crate::error::Result;
use crate::metrics;
use crate::models::{DateRange, HospitalId, ScheduleVersion, ScheduleVersionId, UserId};
use crate::storage::{BatchLoader, CoverageDataSource, ScheduleRepository};
use crate::validation::{codes, ValidationResult};

/// Ratio differences below this are treated as unchanged
const RATIO_EPSILON: f64 = 1e-9;

struct Calculation {
    version: ScheduleVersion,
    window: Option<DateRange>,
    report: CoverageReport,
}

/// Loads a version's data in a fixed number of calls and resolves coverage
pub struct CoverageService<S: CoverageDataSource + ?Sized = dyn ScheduleRepository> {
    source: Arc<S>,
    rules: ReassignmentRules,
}

impl<S: CoverageDataSource + ?Sized> CoverageService<S> {
    pub fn new(source: Arc<S>, rules: ReassignmentRules) -> Self {
        Self { source, rules }
    }

    pub fn rules(&self) -> &ReassignmentRules {
        &self.rules
    }

    /// Coverage report for a version, optionally limited to a date window
    ///
    /// The window is clipped to the version's effective range. An unknown or
    /// soft-deleted version is a NotFound storage error.
    pub async fn coverage(
        &self,
        version_id: ScheduleVersionId,
        range: Option<DateRange>,
    ) -> Result<CoverageReport> {
        let _timer = metrics::start_coverage_timer("coverage");
        Ok(self.calculate(version_id, range).await?.report)
    }

    async fn calculate(
        &self,
        version_id: ScheduleVersionId,
        range: Option<DateRange>,
    ) -> Result<Calculation> {
        let dataset = BatchLoader::new(&*self.source)
            .load(version_id, range)
            .await?;

        let mut report = resolve_coverage(
            &dataset.shifts,
            &dataset.assignments,
            &dataset.specialties(),
            &self.rules,
        );
        report.fetch_count = dataset.fetch_count;
        metrics::record_coverage_fetches(report.fetch_count);

        tracing::info!(
            version_id = %version_id,
            positions = report.lines.len(),
            under_staffed = report.under_staffed.len(),
            overall_ratio = report.overall_ratio,
            fetch_count = report.fetch_count,
            "Coverage resolved"
        );
        Ok(Calculation {
            version: dataset.version,
            window: dataset.window,
            report,
        })
    }

    /// One COVERAGE_GAP warning per under-staffed position
    pub fn coverage_gaps(&self, report: &CoverageReport) -> ValidationResult {
        let mut result = ValidationResult::new();
        for line in report.lines.iter().filter(|l| l.is_under_staffed()) {
            result.add_warning_with_context(
                codes::COVERAGE_GAP,
                format!(
                    "{} {} on {}: {} of {} assigned",
                    line.shift_type, line.dimension, line.date, line.assigned, line.required
                ),
                crate::context! {
                    "shift_type" => line.shift_type.as_str(),
                    "dimension" => line.dimension.as_str(),
                    "date" => line.date.to_string(),
                    "required" => line.required,
                    "assigned" => line.assigned,
                    "shortfall" => line.shortfall(),
                },
            );
        }
        result
    }

    /// Compare coverage of two versions over the same window
    ///
    /// Produces one overall COVERAGE_IMPROVED, COVERAGE_DEGRADED or
    /// COVERAGE_UNCHANGED message, plus a COVERAGE_DEGRADED warning for each
    /// position whose shortfall grew.
    pub async fn compare_versions(
        &self,
        old_version: ScheduleVersionId,
        new_version: ScheduleVersionId,
        range: Option<DateRange>,
    ) -> Result<ValidationResult> {
        let _timer = metrics::start_coverage_timer("compare");
        let (old, new) = futures::try_join!(
            self.calculate(old_version, range),
            self.calculate(new_version, range),
        )?;
        let (old, new) = (old.report, new.report);

        let mut result = ValidationResult::new();
        let context = crate::context! {
            "old_version" => old_version.to_string(),
            "new_version" => new_version.to_string(),
            "old_ratio" => old.overall_ratio,
            "new_ratio" => new.overall_ratio,
            "old_under_staffed" => old.under_staffed.len(),
            "new_under_staffed" => new.under_staffed.len(),
        };
        let delta = new.overall_ratio - old.overall_ratio;
        let pct = |r: f64| r * 100.0;

        if delta > RATIO_EPSILON {
            result.add_info_with_context(
                codes::COVERAGE_IMPROVED,
                format!(
                    "Coverage improved from {:.1}% to {:.1}%",
                    pct(old.overall_ratio),
                    pct(new.overall_ratio)
                ),
                context,
            );
        } else if delta < -RATIO_EPSILON {
            result.add_warning_with_context(
                codes::COVERAGE_DEGRADED,
                format!(
                    "Coverage degraded from {:.1}% to {:.1}%",
                    pct(old.overall_ratio),
                    pct(new.overall_ratio)
                ),
                context,
            );
        } else {
            result.add_info_with_context(
                codes::COVERAGE_UNCHANGED,
                format!("Coverage unchanged at {:.1}%", pct(new.overall_ratio)),
                context,
            );
        }

        for line in new.lines.iter().filter(|l| l.is_under_staffed()) {
            let before = old
                .line(line.shift_type, line.dimension, line.date)
                .map_or(0, |l| l.shortfall());
            if line.shortfall() > before {
                result.add_warning_with_context(
                    codes::COVERAGE_DEGRADED,
                    format!(
                        "{} {} on {}: shortfall grew from {} to {}",
                        line.shift_type,
                        line.dimension,
                        line.date,
                        before,
                        line.shortfall()
                    ),
                    crate::context! {
                        "shift_type" => line.shift_type.as_str(),
                        "dimension" => line.dimension.as_str(),
                        "date" => line.date.to_string(),
                        "old_shortfall" => before,
                        "new_shortfall" => line.shortfall(),
                    },
                );
            }
        }

        Ok(result)
    }
}

// ============================================================================
// Stored Calculations
// ============================================================================

impl<S: ScheduleRepository + ?Sized> CoverageService<S> {
    /// Calculate coverage and store the result as a snapshot
    pub async fn calculate_and_store(
        &self,
        version_id: ScheduleVersionId,
        range: Option<DateRange>,
        actor: UserId,
    ) -> Result<CoverageSnapshot> {
        let _timer = metrics::start_coverage_timer("snapshot");
        let calculation = self.calculate(version_id, range).await?;
        let gaps = self.coverage_gaps(&calculation.report);
        let snapshot = CoverageSnapshot::new(
            version_id,
            calculation.version.hospital_id,
            calculation.window,
            calculation.report,
            gaps,
            actor,
        );
        self.source.save_coverage_snapshot(&snapshot).await?;

        tracing::info!(
            snapshot_id = %snapshot.id,
            version_id = %version_id,
            readiness = %snapshot.narrative().readiness,
            "Coverage snapshot stored"
        );
        Ok(snapshot)
    }

    /// Most recent stored calculation of a version
    pub async fn latest_snapshot(
        &self,
        version_id: ScheduleVersionId,
    ) -> Result<Option<CoverageSnapshot>> {
        Ok(self.source.latest_coverage_snapshot(version_id).await?)
    }

    /// Calculations stored for a hospital on a UTC calendar day, newest first
    pub async fn snapshots_on(
        &self,
        hospital_id: HospitalId,
        date: chrono::NaiveDate,
    ) -> Result<Vec<CoverageSnapshot>> {
        Ok(self.source.coverage_snapshots_on(hospital_id, date).await?)
    }
}
