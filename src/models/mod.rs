//! Domain entities and their lifecycle rules
//!
//! Entities validate their own state transitions and return
//! [`TransitionError`] for anything the state machine forbids.

pub mod assignment;
pub mod date_range;
pub mod error;
pub mod ids;
pub mod lifecycle;
pub mod person;
pub mod schedule_version;
pub mod scrape_batch;
pub mod shift;

pub use assignment::{Assignment, AssignmentSource};
pub use date_range::DateRange;
pub use error::{TransitionError, TransitionResult};
pub use ids::{
    AssignmentId, CoverageSnapshotId, HospitalId, PersonId, ScheduleVersionId, ScrapeBatchId,
    ShiftInstanceId, UserId,
};
pub use lifecycle::Lifecycle;
pub use person::Person;
pub use schedule_version::{ScheduleVersion, VersionStatus};
pub use scrape_batch::{BatchState, ScrapeBatch};
pub use shift::{ShiftInstance, ShiftSpec, ShiftType, Specialty, StudyType};
