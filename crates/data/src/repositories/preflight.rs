//! In-memory uniqueness checks run before a snapshot transaction is opened.

use std::collections::HashSet;

use refdata_core::{RefDataError, Result};

use crate::models::{PriceSnapshotAggregate, UniverseSnapshotAggregate};

/// Rejects repeated `constituent_id`, `position` or `ticker` values.
///
/// # Errors
/// Returns [`RefDataError::DuplicateConstituent`] naming the first repeat.
pub fn check_universe(aggregate: &UniverseSnapshotAggregate) -> Result<()> {
    let n = aggregate.constituents.len();
    let mut ids = HashSet::with_capacity(n);
    let mut positions = HashSet::with_capacity(n);
    let mut tickers = HashSet::with_capacity(n);

    for row in &aggregate.constituents {
        if !ids.insert(row.constituent_id) {
            return Err(RefDataError::DuplicateConstituent {
                field: "constituent_id",
                value: row.constituent_id.to_string(),
            });
        }
        if !positions.insert(row.position) {
            return Err(RefDataError::DuplicateConstituent {
                field: "position",
                value: row.position.to_string(),
            });
        }
        if !tickers.insert(row.ticker.as_str()) {
            return Err(RefDataError::DuplicateConstituent {
                field: "ticker",
                value: row.ticker.clone(),
            });
        }
    }
    Ok(())
}

/// Rejects repeated tickers among prices and repeated `(ticker, factor_name)`
/// among factors.
///
/// # Errors
/// Returns [`RefDataError::DuplicatePriceRow`] naming the first repeat.
pub fn check_prices(aggregate: &PriceSnapshotAggregate) -> Result<()> {
    let mut tickers = HashSet::with_capacity(aggregate.prices.len());
    for row in &aggregate.prices {
        if !tickers.insert(row.ticker.as_str()) {
            return Err(RefDataError::DuplicatePriceRow {
                table: "prices",
                key: row.ticker.clone(),
            });
        }
    }

    let mut factors = HashSet::with_capacity(aggregate.factors.len());
    for row in &aggregate.factors {
        if !factors.insert((row.ticker.as_str(), row.factor_name.as_str())) {
            return Err(RefDataError::DuplicatePriceRow {
                table: "factors",
                key: format!("{}/{}", row.ticker, row.factor_name),
            });
        }
    }
    Ok(())
}
