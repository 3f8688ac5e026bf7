//! Coverage resolution engine
//!
//! Computes, per shift type, workload dimension and date, whether staffing
//! requirements are met.
//!
//! # Architecture
//!
//! - [`reassignment`] - Configurable groups of shift types that a body-only
//!   radiologist splits into BODY and NEURO positions
//! - [`algorithm`] - The pure [`resolve_coverage`] function
//! - [`report`] - Report lines, statuses and summary
//! - [`narrative`] - Readiness verdict, insights and recommendations
//! - [`snapshot`] - Stored calculations

pub mod algorithm;
pub mod narrative;
pub mod reassignment;
pub mod report;
pub mod snapshot;

pub use algorithm::resolve_coverage;
pub use reassignment::{split_requirement, ReassignmentGroup, ReassignmentRules};
pub use narrative::{CoverageNarrative, Readiness};
pub use report::{coverage_ratio, CoverageLine, CoverageReport, CoverageStatus, PositionKey};
pub use snapshot::CoverageSnapshot;
