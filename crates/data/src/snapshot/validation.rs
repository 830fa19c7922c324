//! Field-level checks shared by the universe and price builders.
//!
//! Every check appends to a [`ValidationErrors`] instead of returning early so
//! callers see all violations of one input at once.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use refdata_core::ValidationErrors;
use rust_decimal::Decimal;

static UNIVERSE_TICKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z.]{1,10}$").expect("Invalid universe ticker regex"));

static PRICE_TICKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z.]{1,12}$").expect("Invalid price ticker regex"));

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("Invalid date regex"));

static CURRENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{3}$").expect("Invalid currency regex"));

pub(crate) const DEFAULT_CURRENCY: &str = "USD";

pub(crate) fn universe_ticker(errors: &mut ValidationErrors, field: &str, value: &str) {
    if !UNIVERSE_TICKER.is_match(value) {
        errors.push(field, "must match ^[A-Z.]{1,10}$");
    }
}

pub(crate) fn price_ticker(errors: &mut ValidationErrors, field: &str, value: &str) {
    if !PRICE_TICKER.is_match(value) {
        errors.push(field, "must match ^[A-Z.]{1,12}$");
    }
}

/// Parses a `YYYY-MM-DD` calendar date.
pub(crate) fn date(errors: &mut ValidationErrors, field: &str, value: &str) -> Option<NaiveDate> {
    if !ISO_DATE.is_match(value) {
        errors.push(field, "must be a YYYY-MM-DD date");
        return None;
    }
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            errors.push(field, "is not a valid calendar date");
            None
        }
    }
}

/// Parses an RFC 3339 timestamp and normalizes it to UTC.
pub(crate) fn timestamp(
    errors: &mut ValidationErrors,
    field: &str,
    value: &str,
) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(_) => {
            errors.push(field, "must be an RFC 3339 timestamp");
            None
        }
    }
}

/// Resolves an optional currency code, defaulting to USD.
pub(crate) fn currency(errors: &mut ValidationErrors, field: &str, value: Option<&str>) -> String {
    match value {
        None => DEFAULT_CURRENCY.to_string(),
        Some(code) => {
            if !CURRENCY.is_match(code) {
                errors.push(field, "must be a 3-letter currency code");
            }
            code.to_string()
        }
    }
}

pub(crate) fn exact_len(errors: &mut ValidationErrors, field: &str, value: Option<&str>, len: usize) {
    if let Some(v) = value {
        if v.chars().count() != len {
            errors.push(field, format!("must be exactly {len} characters"));
        }
    }
}

pub(crate) fn non_empty(errors: &mut ValidationErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(field, "must not be empty");
    }
}

pub(crate) fn optional_non_empty(errors: &mut ValidationErrors, field: &str, value: Option<&str>) {
    if let Some(v) = value {
        non_empty(errors, field, v);
    }
}

pub(crate) fn positive(errors: &mut ValidationErrors, field: &str, value: Decimal) {
    if value <= Decimal::ZERO {
        errors.push(field, "must be > 0");
    }
}

pub(crate) fn non_negative(errors: &mut ValidationErrors, field: &str, value: Option<Decimal>) {
    if let Some(v) = value {
        if v.is_sign_negative() && !v.is_zero() {
            errors.push(field, "must be >= 0");
        }
    }
}
