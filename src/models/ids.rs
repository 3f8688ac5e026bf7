//! Strongly typed identifiers
//!
//! Every entity is keyed by a UUID, wrapped in its own newtype so a
//! `PersonId` can never be passed where a `ShiftInstanceId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Hospital facility
    HospitalId
);
id_type!(
    /// Staff member
    PersonId
);
id_type!(
    /// Schedule snapshot
    ScheduleVersionId
);
id_type!(
    /// Staffing requirement inside a version
    ShiftInstanceId
);
id_type!(
    /// Person-to-shift staffing fact
    AssignmentId
);
id_type!(
    /// One ingestion attempt
    ScrapeBatchId
);
id_type!(
    /// Operator performing an action
    UserId
);
id_type!(
    /// Stored coverage calculation
    CoverageSnapshotId
);
