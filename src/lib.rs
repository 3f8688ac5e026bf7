//! radshift - Radiology schedule versioning and coverage resolution
//!
//! Manages hospital radiology staffing schedules imported from external
//! sources and answers whether every required shift is adequately staffed.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`validation`] - Error-collecting validation results
//! - [`models`] - Entities, identifiers and lifecycle rules
//! - [`storage`] - Repository contracts, SQLite and in-memory backends
//! - [`coverage`] - Specialty-aware coverage resolution
//! - [`ingest`] - All-or-nothing batch ingestion
//! - [`service`] - Version promotion and coverage queries
//! - [`metrics`] - Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use radshift::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let repo: SharedRepository = Arc::new(SqliteRepository::new(&config.database.sqlite_path)?);
//!     let versions = VersionService::new(repo.clone());
//!     let coverage = CoverageService::new(repo, config.reassignment_rules());
//!     // versions.promote(version_id, actor).await?;
//!     // coverage.coverage(version_id, None).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coverage;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod service;
pub mod storage;
pub mod validation;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::coverage::{
        CoverageNarrative, CoverageReport, CoverageSnapshot, CoverageStatus, ReassignmentRules,
    };
    pub use crate::error::{Error, ErrorCategory, RadshiftErrorTrait, Result};
    pub use crate::ingest::{
        AssignmentCandidate, ImportRequest, IngestOutcome, IngestService, ShiftCandidate,
    };
    pub use crate::models::{
        BatchState, DateRange, HospitalId, Person, ScheduleVersion, ScheduleVersionId,
        ScrapeBatch, ShiftType, Specialty, StudyType, UserId, VersionStatus,
    };
    pub use crate::service::{CoverageService, VersionService};
    pub use crate::storage::{
        MemoryRepository, ScheduleRepository, SharedRepository, SqliteRepository,
    };
    pub use crate::validation::{codes, Severity, ValidationResult};
}

// Direct re-exports for convenience
pub use coverage::{resolve_coverage, CoverageReport};
pub use validation::ValidationResult;
