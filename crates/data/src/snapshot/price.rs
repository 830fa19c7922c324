//! Price snapshot builder.

use refdata_core::{Result, RefDataError, ValidationErrors};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{hash, validation};
use crate::models::{
    FactorRecord, PriceRecord, PriceSnapshotAggregate, PriceSnapshotRecord, PriceVendor,
    SnapshotStatus,
};

/// One vendor's end-of-day file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSnapshotInput {
    pub as_of_date: String,
    pub vendor: String,
    pub published_at: String,
    pub prices: Vec<PriceInput>,
    #[serde(default)]
    pub factors: Vec<FactorInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceInput {
    pub ticker: String,
    pub mic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,
    pub close: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorInput {
    pub ticker: String,
    pub factor_name: String,
    pub value: Decimal,
}

/// Validates `input` and produces an unsaved price snapshot for `tenant_id`.
///
/// # Errors
/// Returns [`RefDataError::Validation`] listing every malformed field.
pub fn build_price_snapshot(
    tenant_id: Uuid,
    input: &PriceSnapshotInput,
) -> Result<PriceSnapshotAggregate> {
    let mut errors = ValidationErrors::new();

    let as_of_date = validation::date(&mut errors, "asOfDate", &input.as_of_date);
    let published_at = validation::timestamp(&mut errors, "publishedAt", &input.published_at);
    let vendor = PriceVendor::parse(&input.vendor);
    if vendor.is_none() {
        errors.push("vendor", "must be one of spdj, polygon, iex");
    }
    if input.prices.is_empty() {
        errors.push("prices", "must contain at least one price");
    }

    let mut currencies = Vec::with_capacity(input.prices.len());
    for (i, p) in input.prices.iter().enumerate() {
        let prefix = format!("prices[{i}]");
        validation::price_ticker(&mut errors, &format!("{prefix}.ticker"), &p.ticker);
        validation::non_empty(&mut errors, &format!("{prefix}.mic"), &p.mic);
        validation::positive(&mut errors, &format!("{prefix}.close"), p.close);
        validation::non_negative(&mut errors, &format!("{prefix}.open"), p.open);
        validation::non_negative(&mut errors, &format!("{prefix}.high"), p.high);
        validation::non_negative(&mut errors, &format!("{prefix}.low"), p.low);
        validation::non_negative(&mut errors, &format!("{prefix}.volume"), p.volume);
        currencies.push(validation::currency(
            &mut errors,
            &format!("{prefix}.currency"),
            p.currency.as_deref(),
        ));
    }

    for (i, f) in input.factors.iter().enumerate() {
        let prefix = format!("factors[{i}]");
        validation::price_ticker(&mut errors, &format!("{prefix}.ticker"), &f.ticker);
        validation::non_empty(&mut errors, &format!("{prefix}.factorName"), &f.factor_name);
    }

    errors.into_result()?;
    let (Some(as_of_date), Some(published_at), Some(vendor)) = (as_of_date, published_at, vendor)
    else {
        return Err(RefDataError::Validation(ValidationErrors::new()));
    };

    let snapshot_id = Uuid::new_v4();

    let prices: Vec<PriceRecord> = input
        .prices
        .iter()
        .zip(currencies)
        .map(|(p, currency)| PriceRecord {
            price_id: Uuid::new_v4(),
            snapshot_id,
            tenant_id,
            ticker: p.ticker.clone(),
            mic: p.mic.clone(),
            open: p.open,
            high: p.high,
            low: p.low,
            close: p.close,
            volume: p.volume,
            currency,
        })
        .collect();

    let factors = input
        .factors
        .iter()
        .map(|f| FactorRecord {
            factor_id: Uuid::new_v4(),
            snapshot_id,
            tenant_id,
            ticker: f.ticker.clone(),
            factor_name: f.factor_name.clone(),
            value: f.value,
            as_of_date,
        })
        .collect();

    let hash = hash::price_hash(
        prices
            .iter()
            .map(|p| (p.ticker.as_str(), p.close, p.mic.as_str())),
    );

    Ok(PriceSnapshotAggregate {
        snapshot: PriceSnapshotRecord {
            snapshot_id,
            tenant_id,
            as_of_date,
            vendor,
            published_at,
            hash,
            status: SnapshotStatus::Active,
        },
        prices,
        factors,
    })
}
