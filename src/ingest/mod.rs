//! Schedule ingestion
//!
//! Turns raw candidate records from external importers into a COMPLETE
//! batch with a STAGING version, or a FAILED batch with nothing persisted.
//!
//! # Architecture
//!
//! - [`candidate`] - Candidate record shapes and structural parsing
//! - [`checksum`] - Payload fingerprint for duplicate detection
//! - [`service`] - [`IngestService`], the all-or-nothing import routine

pub mod candidate;
pub mod checksum;
pub mod service;

pub use candidate::{
    AssignmentCandidate, CandidateError, ImportRequest, ParsedAssignment, ShiftCandidate,
};
pub use checksum::payload_checksum;
pub use service::{IngestOutcome, IngestService};
