//! Orchestrating services
//!
//! - [`versions`] - Promotion, archival and lookup of schedule versions
//! - [`coverage`] - Coverage queries, gap reports and version comparison

pub mod coverage;
pub mod versions;

pub use coverage::CoverageService;
pub use versions::VersionService;
