use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ids::{AssignmentId, PersonId, ShiftInstanceId, UserId};
use super::lifecycle::Lifecycle;

/// Where an assignment came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentSource {
    /// Scraped web schedule
    Amion,
    /// Spreadsheet upload
    Manual,
    /// Operator override
    Override,
}

impl AssignmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amion => "AMION",
            Self::Manual => "MANUAL",
            Self::Override => "OVERRIDE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AMION" => Some(Self::Amion),
            "MANUAL" => Some(Self::Manual),
            "OVERRIDE" => Some(Self::Override),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssignmentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A person placed on a shift instance for a date
///
/// At most one active assignment exists per (person, shift, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub person_id: PersonId,
    pub shift_instance_id: ShiftInstanceId,
    pub schedule_date: NaiveDate,
    /// Shift label as it appeared in the source, kept verbatim
    pub original_shift_type: String,
    pub source: AssignmentSource,
    pub lifecycle: Lifecycle,
}

impl Assignment {
    pub fn new(
        person_id: PersonId,
        shift_instance_id: ShiftInstanceId,
        schedule_date: NaiveDate,
        original_shift_type: impl Into<String>,
        source: AssignmentSource,
        actor: UserId,
    ) -> Self {
        Self {
            id: AssignmentId::new(),
            person_id,
            shift_instance_id,
            schedule_date,
            original_shift_type: original_shift_type.into(),
            source,
            lifecycle: Lifecycle::new(actor),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.lifecycle.is_deleted()
    }

    /// Identity used by the uniqueness rule
    pub fn key(&self) -> (PersonId, ShiftInstanceId, NaiveDate) {
        (self.person_id, self.shift_instance_id, self.schedule_date)
    }
}
