//! Shift vocabulary and the staffing requirement entity

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::ids::{HospitalId, ScheduleVersionId, ShiftInstanceId, UserId};
use super::lifecycle::Lifecycle;

/// Radiologist specialty, also used as a shift's specialty constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Specialty {
    BodyOnly,
    NeuroOnly,
    Both,
}

impl Specialty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BodyOnly => "BODY_ONLY",
            Self::NeuroOnly => "NEURO_ONLY",
            Self::Both => "BOTH",
        }
    }

    /// Parse the canonical name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BODY_ONLY" => Some(Self::BodyOnly),
            "NEURO_ONLY" => Some(Self::NeuroOnly),
            "BOTH" => Some(Self::Both),
            _ => None,
        }
    }

    /// Whether a person with this specialty may fill a shift constrained to `constraint`
    pub fn satisfies(&self, constraint: Specialty) -> bool {
        match constraint {
            Specialty::Both => true,
            other => *self == other || *self == Specialty::Both,
        }
    }

    pub fn all() -> [Self; 3] {
        [Self::BodyOnly, Self::NeuroOnly, Self::Both]
    }
}

impl std::fmt::Display for Specialty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shift naming convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShiftType {
    /// Overnight 1
    #[serde(rename = "ON1")]
    On1,
    /// Overnight 2
    #[serde(rename = "ON2")]
    On2,
    /// Mid-day first call
    #[serde(rename = "MidC")]
    MidC,
    /// Mid-day last call
    #[serde(rename = "MidL")]
    MidL,
    #[serde(rename = "DAY")]
    Day,
}

impl ShiftType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On1 => "ON1",
            Self::On2 => "ON2",
            Self::MidC => "MidC",
            Self::MidL => "MidL",
            Self::Day => "DAY",
        }
    }

    /// Parse a shift code as written by the external sources (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ON1" => Some(Self::On1),
            "ON2" => Some(Self::On2),
            "MIDC" => Some(Self::MidC),
            "MIDL" => Some(Self::MidL),
            "DAY" => Some(Self::Day),
            _ => None,
        }
    }

    pub fn is_overnight(&self) -> bool {
        matches!(self, Self::On1 | Self::On2)
    }

    pub fn all() -> [Self; 5] {
        [Self::On1, Self::On2, Self::MidC, Self::MidL, Self::Day]
    }
}

impl std::fmt::Display for ShiftType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of radiological study a shift reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudyType {
    General,
    Body,
    Neuro,
}

impl StudyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "GENERAL",
            Self::Body => "BODY",
            Self::Neuro => "NEURO",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GENERAL" => Some(Self::General),
            "BODY" => Some(Self::Body),
            "NEURO" => Some(Self::Neuro),
            _ => None,
        }
    }
}

impl std::fmt::Display for StudyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A required shift inside a schedule version
///
/// Immutable once created as part of a version; versions are snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftInstance {
    pub id: ShiftInstanceId,
    pub schedule_version_id: ScheduleVersionId,
    pub shift_type: ShiftType,
    pub schedule_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub hospital_id: HospitalId,
    pub study_type: StudyType,
    pub specialty_constraint: Specialty,
    pub desired_coverage: u32,
    pub is_mandatory: bool,
    pub lifecycle: Lifecycle,
}

/// Field values for a new [`ShiftInstance`]
#[derive(Debug, Clone)]
pub struct ShiftSpec {
    pub shift_type: ShiftType,
    pub schedule_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub study_type: StudyType,
    pub specialty_constraint: Specialty,
    pub desired_coverage: u32,
    pub is_mandatory: bool,
}

impl ShiftInstance {
    /// Create a shift belonging to `version_id`
    pub fn new(
        version_id: ScheduleVersionId,
        hospital_id: HospitalId,
        spec: ShiftSpec,
        actor: UserId,
    ) -> Self {
        Self {
            id: ShiftInstanceId::new(),
            schedule_version_id: version_id,
            shift_type: spec.shift_type,
            schedule_date: spec.schedule_date,
            start_time: spec.start_time,
            end_time: spec.end_time,
            hospital_id,
            study_type: spec.study_type,
            specialty_constraint: spec.specialty_constraint,
            desired_coverage: spec.desired_coverage,
            is_mandatory: spec.is_mandatory,
            lifecycle: Lifecycle::new(actor),
        }
    }

    /// Overnight shifts end on the following calendar day
    pub fn crosses_midnight(&self) -> bool {
        self.end_time <= self.start_time
    }

    pub fn is_deleted(&self) -> bool {
        self.lifecycle.is_deleted()
    }
}
