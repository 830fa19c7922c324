//! Tenant-scoped persistence for snapshots and rebalance jobs.
//!
//! Each store is a trait so the services can run against Postgres in
//! production and the in-memory stand-ins in tests. Every read and write
//! takes the caller's tenant id; nothing crosses tenants.

pub mod job_repo;
pub mod preflight;
pub mod price_repo;
pub mod query;
pub mod universe_repo;

pub use job_repo::{PgJobRepository, PgJobTransaction};
pub use price_repo::PgPriceRepository;
pub use query::{
    CorporateActionQuery, CursorKey, FactorSeriesQuery, HistoryQuery, PageLimit, SeriesQuery,
    SnapshotPage, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
};
pub use universe_repo::PgUniverseRepository;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use refdata_core::{RefDataError, Result};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::error;
use uuid::Uuid;

use crate::memory::{MemoryJobRepository, MemoryPriceRepository, MemoryUniverseRepository};
use crate::models::{
    CorporateActionRecord, FactorSeriesPoint, PriceSeriesPoint, PriceSnapshotAggregate,
    PriceVendor, RebalanceJobRecord, UniverseSnapshotAggregate,
};

#[async_trait]
pub trait UniverseRepository: Send + Sync {
    /// Persists a snapshot and all of its constituents atomically.
    async fn save(&self, aggregate: &UniverseSnapshotAggregate) -> Result<()>;

    /// Most recent snapshot with `as_of_date <= as_of`, or the most recent
    /// overall when `as_of` is `None`. `Ok(None)` when the tenant has none.
    async fn get_latest(
        &self,
        tenant_id: Uuid,
        as_of: Option<NaiveDate>,
    ) -> Result<Option<UniverseSnapshotAggregate>>;

    /// Newest-first page of snapshots. An unknown cursor is ignored.
    async fn list(
        &self,
        tenant_id: Uuid,
        query: &HistoryQuery,
    ) -> Result<SnapshotPage<UniverseSnapshotAggregate>>;

    /// Flips an active snapshot to `superseded`. Returns false if no active
    /// snapshot with that id exists for the tenant.
    async fn mark_superseded(&self, tenant_id: Uuid, snapshot_id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait PriceRepository: Send + Sync {
    async fn save(&self, aggregate: &PriceSnapshotAggregate) -> Result<()>;

    async fn get_latest(
        &self,
        tenant_id: Uuid,
        vendor: PriceVendor,
        as_of: Option<NaiveDate>,
    ) -> Result<Option<PriceSnapshotAggregate>>;

    async fn price_series(
        &self,
        tenant_id: Uuid,
        vendor: PriceVendor,
        query: &SeriesQuery,
    ) -> Result<Vec<PriceSeriesPoint>>;

    async fn factor_series(
        &self,
        tenant_id: Uuid,
        vendor: PriceVendor,
        query: &FactorSeriesQuery,
    ) -> Result<Vec<FactorSeriesPoint>>;

    async fn corporate_actions(
        &self,
        tenant_id: Uuid,
        query: &CorporateActionQuery,
    ) -> Result<Vec<CorporateActionRecord>>;
}

/// Source of job transactions plus plain reads.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Opens a transaction for one enqueue attempt.
    async fn begin(&self) -> Result<Box<dyn JobTransaction>>;

    async fn find(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Option<RebalanceJobRecord>>;
}

/// One open enqueue transaction.
///
/// `find_active` serializes callers that share a dedup key until this
/// transaction ends, so a check followed by `insert` cannot interleave with
/// another caller's check.
#[async_trait]
pub trait JobTransaction: Send {
    async fn find_active(
        &mut self,
        tenant_id: Uuid,
        effective_date: Option<NaiveDate>,
    ) -> Result<Option<RebalanceJobRecord>>;

    async fn insert(&mut self, job: &RebalanceJobRecord) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// All stores behind trait objects.
#[derive(Clone)]
pub struct Repositories {
    pub universe: Arc<dyn UniverseRepository>,
    pub prices: Arc<dyn PriceRepository>,
    pub jobs: Arc<dyn JobRepository>,
}

impl Repositories {
    /// Creates the Postgres-backed set from one pool.
    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            universe: Arc::new(PgUniverseRepository::new(pool.clone())),
            prices: Arc::new(PgPriceRepository::new(pool.clone())),
            jobs: Arc::new(PgJobRepository::new(pool)),
        }
    }

    /// Creates an empty in-memory set.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            universe: Arc::new(MemoryUniverseRepository::new()),
            prices: Arc::new(MemoryPriceRepository::new()),
            jobs: Arc::new(MemoryJobRepository::new()),
        }
    }
}

/// Rolls back after `err` and hands `err` back. A failed rollback is logged,
/// never swallowed into the returned error.
pub(crate) async fn abort(tx: Transaction<'static, Postgres>, err: RefDataError) -> RefDataError {
    if let Err(rollback_err) = tx.rollback().await {
        error!(error = %rollback_err, cause = %err, "transaction rollback failed");
    }
    err
}
