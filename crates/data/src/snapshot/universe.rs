//! Universe snapshot builder.
//!
//! Turns a provider composition into a ranked, weighted and hashed aggregate.
//! Weights are free float market cap over the aggregate cap; rank 1 is the
//! largest cap, with ties broken by ticker.

use std::cmp::Ordering;

use refdata_core::{RefDataError, Result, ValidationErrors};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{hash, validation};
use crate::models::{
    SnapshotStatus, UniverseConstituentRecord, UniverseSnapshotAggregate, UniverseSnapshotRecord,
    UniverseSource,
};

/// Constituent count of the tracked index.
pub const DEFAULT_CONSTITUENT_COUNT: usize = 10;

/// Raw universe composition as received from a provider or an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniverseSnapshotInput {
    /// `YYYY-MM-DD`.
    pub as_of_date: String,
    /// RFC 3339.
    pub effective_at: String,
    /// RFC 3339.
    pub published_at: String,
    /// `spdj` or `manual_override`.
    pub source: String,
    pub constituents: Vec<ConstituentInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstituentInput {
    pub ticker: String,
    pub free_float_market_cap: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cusip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

struct ValidatedHeader {
    as_of_date: chrono::NaiveDate,
    effective_at: chrono::DateTime<chrono::Utc>,
    published_at: chrono::DateTime<chrono::Utc>,
    source: UniverseSource,
    currencies: Vec<String>,
}

/// Builds universe snapshots for an index of fixed cardinality.
#[derive(Debug, Clone, Copy)]
pub struct UniverseSnapshotBuilder {
    constituent_count: usize,
}

impl Default for UniverseSnapshotBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_CONSTITUENT_COUNT)
    }
}

impl UniverseSnapshotBuilder {
    #[must_use]
    pub const fn new(constituent_count: usize) -> Self {
        Self { constituent_count }
    }

    #[must_use]
    pub const fn constituent_count(&self) -> usize {
        self.constituent_count
    }

    /// Validates `input` and produces an unsaved aggregate for `tenant_id`.
    ///
    /// Fresh ids are generated for the snapshot and every constituent. No I/O
    /// is performed.
    ///
    /// # Errors
    /// - [`RefDataError::Validation`] listing every malformed field
    /// - [`RefDataError::Cardinality`] when the constituent count is wrong
    /// - [`RefDataError::InvalidWeightInput`] for a non-positive market cap
    /// - [`RefDataError::DegenerateAggregate`] when the cap total is not a
    ///   positive representable number
    pub fn build(
        &self,
        tenant_id: Uuid,
        input: &UniverseSnapshotInput,
    ) -> Result<UniverseSnapshotAggregate> {
        let header = validate(input)?;

        if input.constituents.len() != self.constituent_count {
            return Err(RefDataError::Cardinality {
                expected: self.constituent_count,
                actual: input.constituents.len(),
            });
        }

        if let Some(bad) = input
            .constituents
            .iter()
            .find(|c| c.free_float_market_cap <= Decimal::ZERO)
        {
            return Err(RefDataError::InvalidWeightInput {
                ticker: bad.ticker.clone(),
            });
        }

        let total = input
            .constituents
            .iter()
            .try_fold(Decimal::ZERO, |acc, c| acc.checked_add(c.free_float_market_cap))
            .ok_or(RefDataError::DegenerateAggregate)?;
        if total <= Decimal::ZERO {
            return Err(RefDataError::DegenerateAggregate);
        }

        let mut order: Vec<usize> = (0..input.constituents.len()).collect();
        order.sort_by(|&a, &b| rank(&input.constituents[a], &input.constituents[b]));

        let snapshot_id = Uuid::new_v4();
        let mut constituents = Vec::with_capacity(order.len());
        for (rank_idx, &idx) in order.iter().enumerate() {
            let item = &input.constituents[idx];
            let weight = item
                .free_float_market_cap
                .checked_div(total)
                .ok_or(RefDataError::DegenerateAggregate)?;
            // A cap too small relative to the total rounds to zero weight.
            if weight <= Decimal::ZERO {
                return Err(RefDataError::InvalidWeightInput {
                    ticker: item.ticker.clone(),
                });
            }
            let position =
                i32::try_from(rank_idx + 1).map_err(|_| RefDataError::DegenerateAggregate)?;

            constituents.push(UniverseConstituentRecord {
                constituent_id: Uuid::new_v4(),
                snapshot_id,
                tenant_id,
                position,
                ticker: item.ticker.clone(),
                cusip: item.cusip.clone(),
                isin: item.isin.clone(),
                free_float_market_cap: item.free_float_market_cap,
                weight,
                sector: item.sector.clone(),
                currency: header.currencies[idx].clone(),
            });
        }

        let hash = hash::universe_hash(constituents.iter().map(|c| (c.ticker.as_str(), c.weight)));

        Ok(UniverseSnapshotAggregate {
            snapshot: UniverseSnapshotRecord {
                snapshot_id,
                tenant_id,
                as_of_date: header.as_of_date,
                effective_at: header.effective_at,
                published_at: header.published_at,
                source: header.source,
                hash,
                status: SnapshotStatus::Active,
            },
            constituents,
        })
    }
}

/// Builds with the default constituent count.
///
/// # Errors
/// See [`UniverseSnapshotBuilder::build`].
pub fn build_universe_snapshot(
    tenant_id: Uuid,
    input: &UniverseSnapshotInput,
) -> Result<UniverseSnapshotAggregate> {
    UniverseSnapshotBuilder::default().build(tenant_id, input)
}

fn rank(a: &ConstituentInput, b: &ConstituentInput) -> Ordering {
    b.free_float_market_cap
        .cmp(&a.free_float_market_cap)
        .then_with(|| a.ticker.cmp(&b.ticker))
}

fn validate(input: &UniverseSnapshotInput) -> Result<ValidatedHeader> {
    let mut errors = ValidationErrors::new();

    let as_of_date = validation::date(&mut errors, "asOfDate", &input.as_of_date);
    let effective_at = validation::timestamp(&mut errors, "effectiveAt", &input.effective_at);
    let published_at = validation::timestamp(&mut errors, "publishedAt", &input.published_at);
    let source = UniverseSource::parse(&input.source);
    if source.is_none() {
        errors.push("source", "must be one of spdj, manual_override");
    }

    let mut currencies = Vec::with_capacity(input.constituents.len());
    for (i, c) in input.constituents.iter().enumerate() {
        let prefix = format!("constituents[{i}]");
        validation::universe_ticker(&mut errors, &format!("{prefix}.ticker"), &c.ticker);
        validation::exact_len(&mut errors, &format!("{prefix}.cusip"), c.cusip.as_deref(), 9);
        validation::exact_len(&mut errors, &format!("{prefix}.isin"), c.isin.as_deref(), 12);
        validation::optional_non_empty(&mut errors, &format!("{prefix}.sector"), c.sector.as_deref());
        currencies.push(validation::currency(
            &mut errors,
            &format!("{prefix}.currency"),
            c.currency.as_deref(),
        ));
    }

    errors.into_result()?;

    match (as_of_date, effective_at, published_at, source) {
        (Some(as_of_date), Some(effective_at), Some(published_at), Some(source)) => {
            Ok(ValidatedHeader {
                as_of_date,
                effective_at,
                published_at,
                source,
                currencies,
            })
        }
        // Every None above pushed a violation.
        _ => Err(RefDataError::Validation(ValidationErrors::new())),
    }
}
