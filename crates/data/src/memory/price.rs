use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use refdata_core::Result;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::models::{
    CorporateActionRecord, FactorSeriesPoint, PriceSeriesPoint, PriceSnapshotAggregate,
    PriceVendor,
};
use crate::repositories::query::{in_range, matches_any};
use crate::repositories::{
    preflight, CorporateActionQuery, FactorSeriesQuery, PriceRepository, SeriesQuery,
};

/// Price snapshots and corporate actions held in process memory.
#[derive(Debug, Default)]
pub struct MemoryPriceRepository {
    snapshots: RwLock<Vec<PriceSnapshotAggregate>>,
    actions: RwLock<Vec<CorporateActionRecord>>,
}

impl MemoryPriceRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a corporate action for `tenant_id` and returns it.
    pub async fn seed_corporate_action(
        &self,
        tenant_id: Uuid,
        ticker: &str,
        event_type: &str,
        effective_date: NaiveDate,
        details: JsonValue,
    ) -> CorporateActionRecord {
        let record = CorporateActionRecord {
            event_id: Uuid::new_v4(),
            tenant_id,
            ticker: ticker.to_string(),
            event_type: event_type.to_string(),
            effective_date,
            recorded_at: Utc::now(),
            details,
        };
        self.actions.write().await.push(record.clone());
        record
    }

    /// Tenant snapshots from one vendor, oldest first.
    async fn vendor_snapshots(
        &self,
        tenant_id: Uuid,
        vendor: PriceVendor,
    ) -> Vec<PriceSnapshotAggregate> {
        let mut rows: Vec<PriceSnapshotAggregate> = self
            .snapshots
            .read()
            .await
            .iter()
            .filter(|a| a.snapshot.tenant_id == tenant_id && a.snapshot.vendor == vendor)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.snapshot.as_of_date, a.snapshot.published_at, a.snapshot.snapshot_id).cmp(&(
                b.snapshot.as_of_date,
                b.snapshot.published_at,
                b.snapshot.snapshot_id,
            ))
        });
        rows
    }
}

#[async_trait]
impl PriceRepository for MemoryPriceRepository {
    async fn save(&self, aggregate: &PriceSnapshotAggregate) -> Result<()> {
        preflight::check_prices(aggregate)?;

        let mut stored = aggregate.clone();
        stored.prices.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        stored
            .factors
            .sort_by(|a, b| (&a.ticker, &a.factor_name).cmp(&(&b.ticker, &b.factor_name)));
        self.snapshots.write().await.push(stored);

        info!(
            tenant_id = %aggregate.snapshot.tenant_id,
            snapshot_id = %aggregate.snapshot.snapshot_id,
            "Saved price snapshot in memory"
        );
        Ok(())
    }

    async fn get_latest(
        &self,
        tenant_id: Uuid,
        vendor: PriceVendor,
        as_of: Option<NaiveDate>,
    ) -> Result<Option<PriceSnapshotAggregate>> {
        Ok(self
            .vendor_snapshots(tenant_id, vendor)
            .await
            .into_iter()
            .rev()
            .find(|a| as_of.map_or(true, |cutoff| a.snapshot.as_of_date <= cutoff)))
    }

    async fn price_series(
        &self,
        tenant_id: Uuid,
        vendor: PriceVendor,
        query: &SeriesQuery,
    ) -> Result<Vec<PriceSeriesPoint>> {
        let mut points: Vec<PriceSeriesPoint> = self
            .vendor_snapshots(tenant_id, vendor)
            .await
            .into_iter()
            .filter(|a| in_range(query.start_date, query.end_date, a.snapshot.as_of_date))
            .flat_map(|a| {
                let as_of_date = a.snapshot.as_of_date;
                a.prices.into_iter().map(move |p| PriceSeriesPoint {
                    as_of_date,
                    vendor,
                    ticker: p.ticker,
                    mic: p.mic,
                    close: p.close,
                    volume: p.volume,
                    currency: p.currency,
                })
            })
            .filter(|p| matches_any(&query.tickers, &p.ticker))
            .collect();
        points.sort_by(|a, b| (a.as_of_date, &a.ticker).cmp(&(b.as_of_date, &b.ticker)));
        Ok(points)
    }

    async fn factor_series(
        &self,
        tenant_id: Uuid,
        vendor: PriceVendor,
        query: &FactorSeriesQuery,
    ) -> Result<Vec<FactorSeriesPoint>> {
        let mut points: Vec<FactorSeriesPoint> = self
            .vendor_snapshots(tenant_id, vendor)
            .await
            .into_iter()
            .filter(|a| in_range(query.start_date, query.end_date, a.snapshot.as_of_date))
            .flat_map(|a| {
                let as_of_date = a.snapshot.as_of_date;
                a.factors.into_iter().map(move |f| FactorSeriesPoint {
                    as_of_date,
                    vendor,
                    ticker: f.ticker,
                    factor_name: f.factor_name,
                    value: f.value,
                })
            })
            .filter(|f| {
                matches_any(&query.tickers, &f.ticker)
                    && matches_any(&query.factor_names, &f.factor_name)
            })
            .collect();
        points.sort_by(|a, b| {
            (a.as_of_date, &a.ticker, &a.factor_name).cmp(&(b.as_of_date, &b.ticker, &b.factor_name))
        });
        Ok(points)
    }

    async fn corporate_actions(
        &self,
        tenant_id: Uuid,
        query: &CorporateActionQuery,
    ) -> Result<Vec<CorporateActionRecord>> {
        let mut rows: Vec<CorporateActionRecord> = self
            .actions
            .read()
            .await
            .iter()
            .filter(|a| {
                a.tenant_id == tenant_id
                    && in_range(query.start_date, query.end_date, a.effective_date)
                    && matches_any(&query.tickers, &a.ticker)
                    && matches_any(&query.event_types, &a.event_type)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.effective_date
                .cmp(&a.effective_date)
                .then_with(|| a.ticker.cmp(&b.ticker))
        });
        Ok(rows)
    }
}
