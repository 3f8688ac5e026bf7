//! Coverage report types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{ShiftType, StudyType};

/// Staffing status of one position on one date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoverageStatus {
    /// assigned >= required
    Full,
    /// 0 < assigned < required
    Partial,
    /// nobody assigned to a position that needs someone
    Uncovered,
}

impl CoverageStatus {
    pub fn classify(assigned: u64, required: u64) -> Self {
        if assigned >= required {
            Self::Full
        } else if assigned > 0 {
            Self::Partial
        } else {
            Self::Uncovered
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::Partial => "PARTIAL",
            Self::Uncovered => "UNCOVERED",
        }
    }
}

impl std::fmt::Display for CoverageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (shift type, dimension, date) position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionKey {
    pub date: NaiveDate,
    pub shift_type: ShiftType,
    /// Workload the position serves
    pub dimension: StudyType,
}

impl std::fmt::Display for PositionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.date, self.shift_type, self.dimension)
    }
}

/// Coverage of one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageLine {
    pub shift_type: ShiftType,
    pub dimension: StudyType,
    pub date: NaiveDate,
    pub required: u64,
    pub assigned: u64,
    /// assigned / required, or 1.0 when nothing is required
    pub coverage_ratio: f64,
    pub status: CoverageStatus,
}

impl CoverageLine {
    pub fn new(key: PositionKey, required: u64, assigned: u64) -> Self {
        Self {
            shift_type: key.shift_type,
            dimension: key.dimension,
            date: key.date,
            required,
            assigned,
            coverage_ratio: coverage_ratio(assigned, required),
            status: CoverageStatus::classify(assigned, required),
        }
    }

    pub fn key(&self) -> PositionKey {
        PositionKey {
            date: self.date,
            shift_type: self.shift_type,
            dimension: self.dimension,
        }
    }

    pub fn is_under_staffed(&self) -> bool {
        self.assigned < self.required
    }

    pub fn is_over_staffed(&self) -> bool {
        self.assigned > self.required
    }

    /// Staff missing to reach the requirement
    pub fn shortfall(&self) -> u64 {
        self.required.saturating_sub(self.assigned)
    }
}

/// `assigned / required`, with zero requirement treated as fully covered
pub fn coverage_ratio(assigned: u64, required: u64) -> f64 {
    if required == 0 {
        1.0
    } else {
        assigned as f64 / required as f64
    }
}

/// Result of a coverage calculation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Sorted by date, shift type, dimension
    pub lines: Vec<CoverageLine>,
    pub under_staffed: Vec<PositionKey>,
    pub over_staffed: Vec<PositionKey>,
    pub total_required: u64,
    pub total_assigned: u64,
    /// Share of required slots that are filled, capped per position
    pub overall_ratio: f64,
    /// Repeated active (person, shift, date) triples that were counted once
    pub duplicates_ignored: usize,
    /// Assignments whose shift is not part of the calculated set
    pub orphaned_assignments: usize,
    /// Assignments whose person had no specialty data
    pub unknown_people: usize,
    /// Data-source calls used to build the inputs; set by the query service
    pub fetch_count: usize,
}

impl CoverageReport {
    pub fn line(
        &self,
        shift_type: ShiftType,
        dimension: StudyType,
        date: NaiveDate,
    ) -> Option<&CoverageLine> {
        let key = PositionKey {
            date,
            shift_type,
            dimension,
        };
        self.lines
            .binary_search_by(|l| l.key().cmp(&key))
            .ok()
            .map(|i| &self.lines[i])
    }

    pub fn count_by_status(&self, status: CoverageStatus) -> usize {
        self.lines.iter().filter(|l| l.status == status).count()
    }

    pub fn is_fully_covered(&self) -> bool {
        self.under_staffed.is_empty()
    }

    /// One-line human-readable summary
    pub fn summary(&self) -> String {
        if self.lines.is_empty() {
            return "No shifts defined".to_string();
        }

        let overall = self.overall_ratio * 100.0;
        if self.under_staffed.is_empty() {
            return format!(
                "Full coverage: {} positions fully staffed ({overall:.1}% overall)",
                self.lines.len()
            );
        }

        format!(
            "Coverage: {} full, {} partial, {} uncovered ({overall:.1}% overall)",
            self.count_by_status(CoverageStatus::Full),
            self.count_by_status(CoverageStatus::Partial),
            self.count_by_status(CoverageStatus::Uncovered),
        )
    }
}
