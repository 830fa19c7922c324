//! Build, persist, then announce provider snapshots.
//!
//! The save is its own transaction. The announcement is sent after commit;
//! a failed send is reported but leaves the stored snapshot in place, and
//! re-ingesting the same content produces the same hash.

use std::sync::Arc;

use refdata_core::Result;
use refdata_data::{
    build_price_snapshot, PriceRepository, PriceSnapshotInput, UniverseRepository,
    UniverseSnapshotBuilder, UniverseSnapshotInput,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::dto::IngestResult;
use crate::queue::{MarketDataIngested, QueueMessage, QueueProducer, UniverseIngested};
use crate::{system_clock, Clock};

#[derive(Clone)]
pub struct IngestionService {
    universe: Arc<dyn UniverseRepository>,
    prices: Arc<dyn PriceRepository>,
    queue: Arc<dyn QueueProducer>,
    builder: UniverseSnapshotBuilder,
    clock: Clock,
}

impl IngestionService {
    #[must_use]
    pub fn new(
        universe: Arc<dyn UniverseRepository>,
        prices: Arc<dyn PriceRepository>,
        queue: Arc<dyn QueueProducer>,
    ) -> Self {
        Self {
            universe,
            prices,
            queue,
            builder: UniverseSnapshotBuilder::default(),
            clock: system_clock(),
        }
    }

    /// Overrides the required constituent count.
    #[must_use]
    pub fn with_builder(mut self, builder: UniverseSnapshotBuilder) -> Self {
        self.builder = builder;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// # Errors
    /// Builder errors before any I/O, then storage errors from the save, then
    /// [`refdata_core::RefDataError::Queue`] if the announcement fails.
    pub async fn ingest_universe(
        &self,
        tenant_id: Uuid,
        input: &UniverseSnapshotInput,
    ) -> Result<IngestResult> {
        let aggregate = self.builder.build(tenant_id, input)?;
        self.universe.save(&aggregate).await?;

        let s = &aggregate.snapshot;
        let message = QueueMessage::UniverseIngested(UniverseIngested {
            tenant_id,
            snapshot_id: s.snapshot_id,
            as_of_date: s.as_of_date,
            source: s.source,
            published_at: s.published_at,
            hash: s.hash.clone(),
            emitted_at: (self.clock)(),
        });
        self.announce(&message, s.snapshot_id).await?;

        info!(
            tenant_id = %tenant_id,
            snapshot_id = %s.snapshot_id,
            as_of_date = %s.as_of_date,
            hash = %s.hash,
            "Universe snapshot ingested"
        );
        Ok(IngestResult {
            snapshot_id: s.snapshot_id,
            hash: s.hash.clone(),
        })
    }

    /// # Errors
    /// Same ordering as [`Self::ingest_universe`].
    pub async fn ingest_prices(
        &self,
        tenant_id: Uuid,
        input: &PriceSnapshotInput,
    ) -> Result<IngestResult> {
        let aggregate = build_price_snapshot(tenant_id, input)?;
        self.prices.save(&aggregate).await?;

        let s = &aggregate.snapshot;
        let message = QueueMessage::MarketDataIngested(MarketDataIngested {
            tenant_id,
            snapshot_id: s.snapshot_id,
            as_of_date: s.as_of_date,
            vendor: s.vendor,
            published_at: s.published_at,
            hash: s.hash.clone(),
            emitted_at: (self.clock)(),
        });
        self.announce(&message, s.snapshot_id).await?;

        info!(
            tenant_id = %tenant_id,
            snapshot_id = %s.snapshot_id,
            vendor = %s.vendor,
            prices = aggregate.prices.len(),
            factors = aggregate.factors.len(),
            "Price snapshot ingested"
        );
        Ok(IngestResult {
            snapshot_id: s.snapshot_id,
            hash: s.hash.clone(),
        })
    }

    async fn announce(&self, message: &QueueMessage, snapshot_id: Uuid) -> Result<()> {
        self.queue.send(message).await.map_err(|e| {
            error!(
                kind = message.kind(),
                snapshot_id = %snapshot_id,
                error = %e,
                "Snapshot stored but announcement failed"
            );
            e
        })
    }
}
