//! Snapshot construction and storage for reference data.
//!
//! This crate provides:
//! - Data models for universe snapshots, price snapshots and rebalance jobs
//! - Pure snapshot builders that validate, weight and hash provider input
//! - Repository traits with Postgres and in-memory implementations
//! - The SQL schema as embedded migrations

pub mod database;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod snapshot;

pub use database::Database;

// Re-export models
pub use models::{
    CorporateActionRecord, FactorRecord, FactorSeriesPoint, JobSource, JobStatus, PriceRecord,
    PriceSeriesPoint, PriceSnapshotAggregate, PriceSnapshotRecord, PriceVendor,
    RebalanceJobRecord, SnapshotStatus, UniverseConstituentRecord, UniverseSnapshotAggregate,
    UniverseSnapshotRecord, UniverseSource,
};

// Re-export repositories
pub use repositories::{
    CorporateActionQuery, FactorSeriesQuery, HistoryQuery, JobRepository, JobTransaction,
    PageLimit, PriceRepository, Repositories, SeriesQuery, SnapshotPage, UniverseRepository,
};

pub use memory::{MemoryJobRepository, MemoryPriceRepository, MemoryUniverseRepository};
pub use snapshot::{
    build_price_snapshot, build_universe_snapshot, PriceSnapshotInput, UniverseSnapshotBuilder,
    UniverseSnapshotInput,
};
