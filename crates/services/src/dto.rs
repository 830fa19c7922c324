//! Response documents returned by the services and rendered by the HTTP layer.
//!
//! Decimals are coerced to JSON numbers here. Dates render as `YYYY-MM-DD`
//! and timestamps as RFC 3339 in UTC.

use chrono::{DateTime, NaiveDate, Utc};
use refdata_data::{
    CorporateActionRecord, FactorSeriesPoint, JobSource, JobStatus, PriceSeriesPoint,
    PriceSnapshotAggregate, PriceVendor, RebalanceJobRecord, SnapshotPage, SnapshotStatus,
    UniverseConstituentRecord, UniverseSnapshotAggregate, UniverseSource,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::warn;
use uuid::Uuid;

fn number(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_else(|| {
        warn!(%value, "Decimal not representable as f64; rendering 0");
        0.0
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniverseSnapshotView {
    pub snapshot_id: Uuid,
    pub tenant_id: Uuid,
    pub as_of_date: NaiveDate,
    pub effective_at: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
    pub source: UniverseSource,
    pub hash: String,
    pub status: SnapshotStatus,
    pub constituents: Vec<ConstituentView>,
}

impl UniverseSnapshotView {
    /// `include_meta` adds `cusip` and `isin` to every constituent.
    #[must_use]
    pub fn from_aggregate(aggregate: &UniverseSnapshotAggregate, include_meta: bool) -> Self {
        let s = &aggregate.snapshot;
        Self {
            snapshot_id: s.snapshot_id,
            tenant_id: s.tenant_id,
            as_of_date: s.as_of_date,
            effective_at: s.effective_at,
            published_at: s.published_at,
            source: s.source,
            hash: s.hash.clone(),
            status: s.status,
            constituents: aggregate
                .constituents
                .iter()
                .map(|c| ConstituentView::from_record(c, include_meta))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstituentView {
    pub position: i32,
    pub ticker: String,
    pub weight: f64,
    pub free_float_market_cap: f64,
    pub sector: Option<String>,
    pub currency: String,
    #[serde(flatten)]
    pub meta: Option<ConstituentMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstituentMeta {
    pub cusip: Option<String>,
    pub isin: Option<String>,
}

impl ConstituentView {
    fn from_record(row: &UniverseConstituentRecord, include_meta: bool) -> Self {
        Self {
            position: row.position,
            ticker: row.ticker.clone(),
            weight: number(row.weight),
            free_float_market_cap: number(row.free_float_market_cap),
            sector: row.sector.clone(),
            currency: row.currency.clone(),
            meta: include_meta.then(|| ConstituentMeta {
                cusip: row.cusip.clone(),
                isin: row.isin.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniverseHistoryView {
    pub items: Vec<UniverseSnapshotView>,
    pub next_cursor: Option<Uuid>,
    pub total_count: i64,
}

impl UniverseHistoryView {
    #[must_use]
    pub fn from_page(page: &SnapshotPage<UniverseSnapshotAggregate>, include_meta: bool) -> Self {
        Self {
            items: page
                .items
                .iter()
                .map(|a| UniverseSnapshotView::from_aggregate(a, include_meta))
                .collect(),
            next_cursor: page.next_cursor,
            total_count: page.total_count,
        }
    }
}

/// Latest price snapshot. Field names stay snake_case for existing consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestPricesView {
    pub snapshot: PriceSnapshotHeader,
    pub prices: Vec<LatestPrice>,
    pub factors: Vec<LatestFactor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceSnapshotHeader {
    pub snapshot_id: Uuid,
    pub tenant_id: Uuid,
    pub as_of_date: NaiveDate,
    pub vendor: PriceVendor,
    pub published_at: DateTime<Utc>,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestPrice {
    pub ticker: String,
    pub mic: String,
    pub close: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestFactor {
    pub ticker: String,
    pub factor_name: String,
    pub value: f64,
}

impl From<&PriceSnapshotAggregate> for LatestPricesView {
    fn from(aggregate: &PriceSnapshotAggregate) -> Self {
        let s = &aggregate.snapshot;
        Self {
            snapshot: PriceSnapshotHeader {
                snapshot_id: s.snapshot_id,
                tenant_id: s.tenant_id,
                as_of_date: s.as_of_date,
                vendor: s.vendor,
                published_at: s.published_at,
                hash: s.hash.clone(),
            },
            prices: aggregate
                .prices
                .iter()
                .map(|p| LatestPrice {
                    ticker: p.ticker.clone(),
                    mic: p.mic.clone(),
                    close: number(p.close),
                    currency: p.currency.clone(),
                })
                .collect(),
            factors: aggregate
                .factors
                .iter()
                .map(|f| LatestFactor {
                    ticker: f.ticker.clone(),
                    factor_name: f.factor_name.clone(),
                    value: number(f.value),
                })
                .collect(),
        }
    }
}

/// `{ "items": [...] }` wrapper for series and corporate action reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemsView<T> {
    pub items: Vec<T>,
}

impl<T> ItemsView<T> {
    #[must_use]
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSeriesItem {
    pub as_of_date: NaiveDate,
    pub ticker: String,
    pub mic: String,
    pub close: f64,
    pub volume: Option<f64>,
    pub currency: String,
    pub vendor: PriceVendor,
}

impl From<&PriceSeriesPoint> for PriceSeriesItem {
    fn from(p: &PriceSeriesPoint) -> Self {
        Self {
            as_of_date: p.as_of_date,
            ticker: p.ticker.clone(),
            mic: p.mic.clone(),
            close: number(p.close),
            volume: p.volume.map(number),
            currency: p.currency.clone(),
            vendor: p.vendor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorSeriesItem {
    pub as_of_date: NaiveDate,
    pub ticker: String,
    pub factor_name: String,
    pub value: f64,
    pub vendor: PriceVendor,
}

impl From<&FactorSeriesPoint> for FactorSeriesItem {
    fn from(p: &FactorSeriesPoint) -> Self {
        Self {
            as_of_date: p.as_of_date,
            ticker: p.ticker.clone(),
            factor_name: p.factor_name.clone(),
            value: number(p.value),
            vendor: p.vendor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorporateActionItem {
    pub event_id: Uuid,
    pub ticker: String,
    pub event_type: String,
    pub effective_date: NaiveDate,
    pub recorded_at: DateTime<Utc>,
    pub details: JsonValue,
}

impl From<&CorporateActionRecord> for CorporateActionItem {
    fn from(r: &CorporateActionRecord) -> Self {
        Self {
            event_id: r.event_id,
            ticker: r.ticker.clone(),
            event_type: r.event_type.clone(),
            effective_date: r.effective_date,
            recorded_at: r.recorded_at,
            details: r.details.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub source: JobSource,
    pub triggered_by: String,
    pub requested_at: DateTime<Utc>,
    pub effective_date: Option<NaiveDate>,
    pub queue_event_id: Uuid,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl From<&RebalanceJobRecord> for JobView {
    fn from(job: &RebalanceJobRecord) -> Self {
        Self {
            job_id: job.job_id,
            status: job.status,
            source: job.source,
            triggered_by: job.triggered_by.clone(),
            requested_at: job.requested_at,
            effective_date: job.effective_date,
            queue_event_id: job.queue_event_id,
            error_code: job.error_code.clone(),
            error_message: job.error_message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResult {
    pub snapshot_id: Uuid,
    pub hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use refdata_data::{UniverseSnapshotRecord, UniverseSource};
    use rust_decimal_macros::dec;

    fn aggregate() -> UniverseSnapshotAggregate {
        let tenant = Uuid::new_v4();
        let snapshot_id = Uuid::new_v4();
        let at = DateTime::parse_from_rfc3339("2024-03-29T21:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        UniverseSnapshotAggregate {
            snapshot: UniverseSnapshotRecord {
                snapshot_id,
                tenant_id: tenant,
                as_of_date: NaiveDate::from_ymd_opt(2024, 3, 29).unwrap(),
                effective_at: at,
                published_at: at,
                source: UniverseSource::Spdj,
                hash: "ab".repeat(32),
                status: SnapshotStatus::Active,
            },
            constituents: vec![UniverseConstituentRecord {
                constituent_id: Uuid::new_v4(),
                snapshot_id,
                tenant_id: tenant,
                position: 1,
                ticker: "AAPL".to_string(),
                cusip: Some("037833100".to_string()),
                isin: None,
                free_float_market_cap: dec!(1000),
                weight: dec!(0.25),
                sector: None,
                currency: "USD".to_string(),
            }],
        }
    }

    #[test]
    fn constituent_meta_is_opt_in() {
        let plain = serde_json::to_value(UniverseSnapshotView::from_aggregate(&aggregate(), false))
            .unwrap();
        let row = &plain["constituents"][0];
        assert_eq!(row["weight"], 0.25);
        assert_eq!(row["freeFloatMarketCap"], 1000.0);
        assert!(row.get("cusip").is_none());
        assert!(row.get("isin").is_none());

        let meta = serde_json::to_value(UniverseSnapshotView::from_aggregate(&aggregate(), true))
            .unwrap();
        let row = &meta["constituents"][0];
        assert_eq!(row["cusip"], "037833100");
        assert!(row["isin"].is_null());
    }

    #[test]
    fn dates_and_timestamps_render_canonically() {
        let json = serde_json::to_value(UniverseSnapshotView::from_aggregate(&aggregate(), false))
            .unwrap();
        assert_eq!(json["asOfDate"], "2024-03-29");
        assert_eq!(json["effectiveAt"], "2024-03-29T21:00:00Z");
        assert_eq!(json["source"], "spdj");
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn numbers_cover_the_full_decimal_range() {
        assert!((number(dec!(185.64)) - 185.64).abs() < 1e-9);
        assert!((number(dec!(-0.0001)) + 0.0001).abs() < 1e-12);
        let max = number(Decimal::MAX);
        assert!(max.is_finite() && max > 7.9e28);
        assert!(number(Decimal::MIN) < -7.9e28);
    }
}
