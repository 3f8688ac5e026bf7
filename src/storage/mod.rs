//! Persistence for schedules, batches and assignments
//!
//! Two backends implement [`ScheduleRepository`]: [`SqliteRepository`] for
//! real deployments and [`MemoryRepository`] for tests and embedding.

pub mod error;
pub mod loader;
pub mod memory;
pub mod repository;
pub mod sqlite;

pub use error::{StorageError, StorageResult};
pub use loader::{BatchLoader, CountingSource, CoverageDataset, COVERAGE_FETCHES};
pub use memory::MemoryRepository;
pub use repository::{
    plan_promotion, CoverageDataSource, ImportCommit, PromotionOutcome, ScheduleRepository,
    SharedRepository,
};
pub use sqlite::SqliteRepository;
