//! Data models for reference data snapshots and rebalance jobs.
//!
//! Financial quantities use `rust_decimal::Decimal`; dates are `NaiveDate`
//! and timestamps `DateTime<Utc>` regardless of how the store encodes them.

pub mod job;
pub mod price;
pub mod universe;

pub use job::{JobSource, JobStatus, RebalanceJobRecord};
pub use price::{
    CorporateActionRecord, FactorRecord, FactorSeriesPoint, PriceRecord, PriceSeriesPoint,
    PriceSnapshotAggregate, PriceSnapshotRecord, PriceVendor,
};
pub use universe::{
    UniverseConstituentRecord, UniverseSnapshotAggregate, UniverseSnapshotRecord,
    UniverseSource,
};

use serde::{Deserialize, Serialize};

/// Lifecycle of a stored snapshot. Snapshots are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Active,
    Superseded,
}

impl SnapshotStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Superseded => "superseded",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "superseded" => Some(Self::Superseded),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_status_round_trips() {
        for status in [SnapshotStatus::Active, SnapshotStatus::Superseded] {
            assert_eq!(SnapshotStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SnapshotStatus::parse("deleted"), None);
    }

    #[test]
    fn vendor_parses_known_values() {
        assert_eq!(PriceVendor::parse("polygon"), Some(PriceVendor::Polygon));
        assert!("bloomberg".parse::<PriceVendor>().is_err());
    }
}
