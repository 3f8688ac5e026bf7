//! Raw candidate records produced by schedule importers
//!
//! Importers hand over plain text fields exactly as they appeared in the
//! source. Structural parsing turns each row into typed values or a
//! [`CandidateError`] naming the first problem found in that row.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    AssignmentSource, DateRange, HospitalId, ShiftSpec, ShiftType, Specialty, StudyType, UserId,
};
use crate::validation::codes;

/// One required shift as reported by the source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftCandidate {
    /// Row number in the source, used in messages
    pub row: usize,
    pub shift_type: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub start_time: String,
    pub end_time: String,
    #[serde(default = "default_study_type")]
    pub study_type: String,
    #[serde(default = "default_specialty")]
    pub specialty_constraint: String,
    #[serde(default = "default_desired")]
    pub desired_coverage: i64,
    #[serde(default)]
    pub is_mandatory: bool,
}

/// One staffing fact as reported by the source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentCandidate {
    pub row: usize,
    pub person_name: String,
    /// Shift type text, kept verbatim on the assignment
    pub shift_type: String,
    pub date: String,
    /// Narrows matching when several shifts share type and date
    #[serde(default)]
    pub study_type: Option<String>,
}

fn default_study_type() -> String {
    StudyType::General.as_str().to_string()
}

fn default_specialty() -> String {
    Specialty::Both.as_str().to_string()
}

fn default_desired() -> i64 {
    1
}

/// Input of one ingestion attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    pub hospital_id: HospitalId,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub shifts: Vec<ShiftCandidate>,
    pub assignments: Vec<AssignmentCandidate>,
    pub source: AssignmentSource,
    pub actor: UserId,
}

impl ImportRequest {
    pub fn row_count(&self) -> usize {
        self.shifts.len() + self.assignments.len()
    }
}

/// Structural problem in a single candidate row
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CandidateError {
    #[error("unknown shift type '{0}'")]
    UnknownShiftType(String),

    #[error("unknown study type '{0}'")]
    UnknownStudyType(String),

    #[error("unknown specialty '{0}'")]
    UnknownSpecialty(String),

    #[error("invalid {field} '{value}'")]
    InvalidField { field: &'static str, value: String },

    #[error("desired coverage must not be negative, got {0}")]
    NegativeCoverage(i64),

    #[error("desired coverage {value} exceeds the limit of {max}")]
    CoverageTooLarge { value: i64, max: u32 },

    #[error("person name is empty")]
    EmptyName,

    #[error("date {date} is outside the import window {window}")]
    OutsideWindow { date: NaiveDate, window: DateRange },
}

impl CandidateError {
    /// Validation code reported for a shift row with this problem
    pub fn shift_code(&self) -> &'static str {
        match self {
            Self::UnknownShiftType(_) => codes::UNKNOWN_SHIFT_TYPE,
            Self::OutsideWindow { .. } => codes::INVALID_DATE_RANGE,
            _ => codes::INVALID_SHIFT_ROW,
        }
    }

    /// Validation code reported for an assignment row with this problem
    pub fn assignment_code(&self) -> &'static str {
        match self {
            Self::UnknownShiftType(_) => codes::UNKNOWN_SHIFT_TYPE,
            Self::OutsideWindow { .. } => codes::INVALID_DATE_RANGE,
            _ => codes::INVALID_ASSIGNMENT_ROW,
        }
    }
}

/// Assignment row after structural parsing
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAssignment {
    pub row: usize,
    pub person_name: String,
    pub shift_type: ShiftType,
    pub original_shift_type: String,
    pub date: NaiveDate,
    pub study_type: Option<StudyType>,
}

fn parse_date(
    field: &'static str,
    value: &str,
    window: DateRange,
) -> Result<NaiveDate, CandidateError> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        CandidateError::InvalidField {
            field,
            value: value.to_string(),
        }
    })?;
    if !window.contains(date) {
        return Err(CandidateError::OutsideWindow { date, window });
    }
    Ok(date)
}

fn parse_time(field: &'static str, value: &str) -> Result<NaiveTime, CandidateError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| CandidateError::InvalidField {
            field,
            value: value.to_string(),
        })
}

fn parse_shift_type(value: &str) -> Result<ShiftType, CandidateError> {
    ShiftType::parse(value).ok_or_else(|| CandidateError::UnknownShiftType(value.to_string()))
}

fn parse_study_type(value: &str) -> Result<StudyType, CandidateError> {
    StudyType::parse(value).ok_or_else(|| CandidateError::UnknownStudyType(value.to_string()))
}

impl ShiftCandidate {
    /// Parse the row; `max_desired` bounds the desired coverage
    pub fn parse(&self, window: DateRange, max_desired: u32) -> Result<ShiftSpec, CandidateError> {
        let shift_type = parse_shift_type(&self.shift_type)?;
        let schedule_date = parse_date("date", &self.date, window)?;
        let start_time = parse_time("start time", &self.start_time)?;
        let end_time = parse_time("end time", &self.end_time)?;
        let study_type = parse_study_type(&self.study_type)?;
        let specialty_constraint = Specialty::parse(&self.specialty_constraint)
            .ok_or_else(|| CandidateError::UnknownSpecialty(self.specialty_constraint.clone()))?;
        if self.desired_coverage < 0 {
            return Err(CandidateError::NegativeCoverage(self.desired_coverage));
        }
        let desired_coverage = u32::try_from(self.desired_coverage)
            .ok()
            .filter(|n| *n <= max_desired)
            .ok_or(CandidateError::CoverageTooLarge {
                value: self.desired_coverage,
                max: max_desired,
            })?;

        Ok(ShiftSpec {
            shift_type,
            schedule_date,
            start_time,
            end_time,
            study_type,
            specialty_constraint,
            desired_coverage,
            is_mandatory: self.is_mandatory,
        })
    }
}

impl AssignmentCandidate {
    pub fn parse(&self, window: DateRange) -> Result<ParsedAssignment, CandidateError> {
        let person_name = self.person_name.trim();
        if person_name.is_empty() {
            return Err(CandidateError::EmptyName);
        }
        let shift_type = parse_shift_type(&self.shift_type)?;
        let date = parse_date("date", &self.date, window)?;
        let study_type = self
            .study_type
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(parse_study_type)
            .transpose()?;

        Ok(ParsedAssignment {
            row: self.row,
            person_name: person_name.to_string(),
            shift_type,
            original_shift_type: self.shift_type.clone(),
            date,
            study_type,
        })
    }
}
