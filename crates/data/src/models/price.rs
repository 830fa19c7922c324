//! Price snapshot data model.
//!
//! A price snapshot bundles one vendor's closing prices and factor exposures
//! for a tenant and as-of date.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::SnapshotStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshotRecord {
    pub snapshot_id: Uuid,
    pub tenant_id: Uuid,
    pub as_of_date: NaiveDate,
    pub vendor: PriceVendor,
    pub published_at: DateTime<Utc>,
    /// Lowercase hex SHA-256 over `(ticker, close, mic)` of every price.
    pub hash: String,
    pub status: SnapshotStatus,
}

/// One ticker's prices within a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub price_id: Uuid,
    pub snapshot_id: Uuid,
    pub tenant_id: Uuid,
    pub ticker: String,
    /// Market identifier code of the listing venue.
    pub mic: String,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Decimal,
    pub volume: Option<Decimal>,
    pub currency: String,
}

/// One factor exposure for one ticker within a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorRecord {
    pub factor_id: Uuid,
    pub snapshot_id: Uuid,
    pub tenant_id: Uuid,
    pub ticker: String,
    pub factor_name: String,
    pub value: Decimal,
    pub as_of_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshotAggregate {
    pub snapshot: PriceSnapshotRecord,
    pub prices: Vec<PriceRecord>,
    pub factors: Vec<FactorRecord>,
}

/// A close price joined with its snapshot date, for time series reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSeriesPoint {
    pub as_of_date: NaiveDate,
    pub vendor: PriceVendor,
    pub ticker: String,
    pub mic: String,
    pub close: Decimal,
    pub volume: Option<Decimal>,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorSeriesPoint {
    pub as_of_date: NaiveDate,
    pub vendor: PriceVendor,
    pub ticker: String,
    pub factor_name: String,
    pub value: Decimal,
}

/// A corporate action (split, dividend, ticker change...) recorded for a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorporateActionRecord {
    pub event_id: Uuid,
    pub tenant_id: Uuid,
    pub ticker: String,
    pub event_type: String,
    pub effective_date: NaiveDate,
    pub recorded_at: DateTime<Utc>,
    pub details: JsonValue,
}

/// Market data vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceVendor {
    Spdj,
    Polygon,
    Iex,
}

impl PriceVendor {
    pub const ALL: [Self; 3] = [Self::Spdj, Self::Polygon, Self::Iex];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Spdj => "spdj",
            Self::Polygon => "polygon",
            Self::Iex => "iex",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

impl std::fmt::Display for PriceVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PriceVendor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown vendor: {s}"))
    }
}
