use std::sync::Arc;

use chrono::NaiveDate;
use refdata_core::{RefDataError, Result};
use refdata_data::{
    CorporateActionQuery, FactorSeriesQuery, HistoryQuery, PriceRepository, PriceVendor,
    SeriesQuery, UniverseRepository,
};
use uuid::Uuid;

use crate::dto::{
    CorporateActionItem, FactorSeriesItem, ItemsView, LatestPricesView, PriceSeriesItem,
    UniverseHistoryView, UniverseSnapshotView,
};

/// Read-only views over the snapshot repositories.
#[derive(Clone)]
pub struct QueryService {
    universe: Arc<dyn UniverseRepository>,
    prices: Arc<dyn PriceRepository>,
}

impl QueryService {
    #[must_use]
    pub fn new(universe: Arc<dyn UniverseRepository>, prices: Arc<dyn PriceRepository>) -> Self {
        Self { universe, prices }
    }

    /// # Errors
    /// Returns [`RefDataError::SnapshotNotFound`] when nothing is on or before `as_of`.
    pub async fn current_universe(
        &self,
        tenant_id: Uuid,
        as_of: Option<NaiveDate>,
        include_meta: bool,
    ) -> Result<UniverseSnapshotView> {
        let aggregate = self
            .universe
            .get_latest(tenant_id, as_of)
            .await?
            .ok_or(RefDataError::SnapshotNotFound)?;
        Ok(UniverseSnapshotView::from_aggregate(&aggregate, include_meta))
    }

    /// # Errors
    /// Storage errors only; an empty history is an empty page.
    pub async fn universe_history(
        &self,
        tenant_id: Uuid,
        query: &HistoryQuery,
        include_meta: bool,
    ) -> Result<UniverseHistoryView> {
        let page = self.universe.list(tenant_id, query).await?;
        Ok(UniverseHistoryView::from_page(&page, include_meta))
    }

    /// # Errors
    /// Returns [`RefDataError::SnapshotNotFound`] when the vendor has no snapshot.
    pub async fn latest_prices(
        &self,
        tenant_id: Uuid,
        vendor: PriceVendor,
        as_of: Option<NaiveDate>,
    ) -> Result<LatestPricesView> {
        let aggregate = self
            .prices
            .get_latest(tenant_id, vendor, as_of)
            .await?
            .ok_or(RefDataError::SnapshotNotFound)?;
        Ok(LatestPricesView::from(&aggregate))
    }

    pub async fn price_series(
        &self,
        tenant_id: Uuid,
        vendor: PriceVendor,
        query: &SeriesQuery,
    ) -> Result<ItemsView<PriceSeriesItem>> {
        let rows = self.prices.price_series(tenant_id, vendor, query).await?;
        Ok(ItemsView::new(rows.iter().map(PriceSeriesItem::from).collect()))
    }

    pub async fn factor_series(
        &self,
        tenant_id: Uuid,
        vendor: PriceVendor,
        query: &FactorSeriesQuery,
    ) -> Result<ItemsView<FactorSeriesItem>> {
        let rows = self.prices.factor_series(tenant_id, vendor, query).await?;
        Ok(ItemsView::new(rows.iter().map(FactorSeriesItem::from).collect()))
    }

    pub async fn corporate_actions(
        &self,
        tenant_id: Uuid,
        query: &CorporateActionQuery,
    ) -> Result<ItemsView<CorporateActionItem>> {
        let rows = self.prices.corporate_actions(tenant_id, query).await?;
        Ok(ItemsView::new(rows.iter().map(CorporateActionItem::from).collect()))
    }
}
