//! Application services over the reference data repositories.
//!
//! - `queue`: the send-only message sink and its memory/HTTP backends
//! - `jobs`: transactional, dedup-guarded rebalance job enqueue
//! - `ingestion`: build, persist and announce snapshots
//! - `query`: read shaping into API response documents

pub mod dto;
pub mod ingestion;
pub mod jobs;
pub mod query;
pub mod queue;

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub use dto::{
    ConstituentView, CorporateActionItem, FactorSeriesItem, IngestResult, ItemsView, JobView,
    LatestPricesView, PriceSeriesItem, UniverseHistoryView, UniverseSnapshotView,
};
pub use ingestion::IngestionService;
pub use jobs::{EnqueueRequest, EnqueueResult, JobService};
pub use query::QueryService;
pub use queue::{
    build_producer, HttpQueueProducer, MarketDataIngested, MemoryQueue, QueueMessage,
    QueueProducer, RebalanceRequested, UniverseIngested,
};

/// Source of "now" for request and emission timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Wall clock.
#[must_use]
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}
