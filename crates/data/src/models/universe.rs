//! Universe snapshot data model.
//!
//! A universe snapshot is the constituent list of an index for one tenant and
//! one as-of date. Snapshots are immutable once written; constituents are
//! owned by their snapshot.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SnapshotStatus;

/// Snapshot header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseSnapshotRecord {
    pub snapshot_id: Uuid,
    pub tenant_id: Uuid,
    /// Date the composition represents.
    pub as_of_date: NaiveDate,
    /// When the composition became valid.
    pub effective_at: DateTime<Utc>,
    /// When the provider produced it.
    pub published_at: DateTime<Utc>,
    pub source: UniverseSource,
    /// Lowercase hex SHA-256 over the normalized constituents.
    pub hash: String,
    pub status: SnapshotStatus,
}

/// One index member within a universe snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseConstituentRecord {
    pub constituent_id: Uuid,
    pub snapshot_id: Uuid,
    pub tenant_id: Uuid,
    /// 1-based rank by descending free float market cap.
    pub position: i32,
    pub ticker: String,
    pub cusip: Option<String>,
    pub isin: Option<String>,
    pub free_float_market_cap: Decimal,
    /// Fraction of the aggregate free float market cap, in (0, 1].
    pub weight: Decimal,
    pub sector: Option<String>,
    pub currency: String,
}

/// Snapshot header plus its constituents ordered by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseSnapshotAggregate {
    pub snapshot: UniverseSnapshotRecord,
    pub constituents: Vec<UniverseConstituentRecord>,
}

impl UniverseSnapshotAggregate {
    /// Sum of all constituent weights.
    #[must_use]
    pub fn total_weight(&self) -> Decimal {
        self.constituents.iter().map(|c| c.weight).sum()
    }
}

/// Origin of a universe snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniverseSource {
    /// Index provider feed.
    Spdj,
    /// Operator-supplied composition.
    ManualOverride,
}

impl UniverseSource {
    pub const ALL: [Self; 2] = [Self::Spdj, Self::ManualOverride];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Spdj => "spdj",
            Self::ManualOverride => "manual_override",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

impl std::fmt::Display for UniverseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universe_source_round_trips_through_str() {
        for source in UniverseSource::ALL {
            assert_eq!(UniverseSource::parse(source.as_str()), Some(source));
        }
        assert_eq!(UniverseSource::parse("SPDJ"), None);
    }

    #[test]
    fn universe_source_serializes_snake_case() {
        let json = serde_json::to_string(&UniverseSource::ManualOverride).unwrap();
        assert_eq!(json, "\"manual_override\"");
    }
}
