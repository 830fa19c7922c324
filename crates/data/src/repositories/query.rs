//! Read filters, pagination and the SQL assembled from them.
//!
//! Optional filters are appended with `QueryBuilder::push_bind`, so each
//! placeholder number follows from the order of the pushes alone.

use chrono::{DateTime, NaiveDate, Utc};
use refdata_core::{RefDataError, Result, ValidationErrors};
use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::PriceVendor;

pub const DEFAULT_PAGE_LIMIT: u32 = 25;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// History page size, always within `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimit(u32);

impl PageLimit {
    /// # Errors
    /// Returns [`RefDataError::Validation`] on `limit` outside `1..=100`.
    pub fn new(value: i64) -> Result<Self> {
        match u32::try_from(value) {
            Ok(v) if (1..=MAX_PAGE_LIMIT).contains(&v) => Ok(Self(v)),
            _ => {
                let mut errors = ValidationErrors::new();
                errors.push("limit", format!("must be between 1 and {MAX_PAGE_LIMIT}"));
                Err(RefDataError::Validation(errors))
            }
        }
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Default for PageLimit {
    fn default() -> Self {
        Self(DEFAULT_PAGE_LIMIT)
    }
}

/// Filters for walking universe history newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Inclusive lower bound on `as_of_date`.
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper bound on `as_of_date`.
    pub end_date: Option<NaiveDate>,
    /// Last snapshot id of the previous page.
    pub cursor: Option<Uuid>,
    pub limit: PageLimit,
}

impl HistoryQuery {
    /// True when `date` falls inside the date range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        in_range(self.start_date, self.end_date, date)
    }
}

/// One page of snapshots plus the total number matching the filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotPage<T> {
    pub items: Vec<T>,
    /// Set only when the page is full.
    pub next_cursor: Option<Uuid>,
    pub total_count: i64,
}

impl<T> SnapshotPage<T> {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            total_count: 0,
        }
    }
}

/// Sort key of a universe snapshot: `(as_of_date, effective_at, snapshot_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CursorKey {
    pub as_of_date: NaiveDate,
    pub effective_at: DateTime<Utc>,
    pub snapshot_id: Uuid,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesQuery {
    /// Empty means every ticker.
    pub tickers: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactorSeriesQuery {
    pub tickers: Vec<String>,
    pub factor_names: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorporateActionQuery {
    pub tickers: Vec<String>,
    pub event_types: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Empty filter lists match everything.
pub(crate) fn matches_any(values: &[String], candidate: &str) -> bool {
    values.is_empty() || values.iter().any(|v| v == candidate)
}

pub(crate) fn in_range(start: Option<NaiveDate>, end: Option<NaiveDate>, date: NaiveDate) -> bool {
    start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e)
}

pub(crate) const UNIVERSE_SNAPSHOT_COLUMNS: &str =
    "snapshot_id, tenant_id, as_of_date, effective_at, published_at, source, hash, status";

fn push_date_range(
    qb: &mut QueryBuilder<'static, Postgres>,
    column: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) {
    if let Some(start) = start {
        qb.push(" AND ").push(column).push(" >= ").push_bind(start);
    }
    if let Some(end) = end {
        qb.push(" AND ").push(column).push(" <= ").push_bind(end);
    }
}

fn push_any(qb: &mut QueryBuilder<'static, Postgres>, column: &str, values: &[String]) {
    if !values.is_empty() {
        qb.push(" AND ")
            .push(column)
            .push(" = ANY(")
            .push_bind(values.to_vec())
            .push(")");
    }
}

/// Page query for universe history. `cursor` is the resolved sort key of the
/// cursor row; an unresolved cursor is simply not pushed.
pub(crate) fn universe_history_query(
    tenant_id: Uuid,
    query: &HistoryQuery,
    cursor: Option<CursorKey>,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {UNIVERSE_SNAPSHOT_COLUMNS} FROM universe_snapshots WHERE tenant_id = "
    ));
    qb.push_bind(tenant_id);
    push_date_range(&mut qb, "as_of_date", query.start_date, query.end_date);
    if let Some(key) = cursor {
        qb.push(" AND (as_of_date, effective_at, snapshot_id) < (")
            .push_bind(key.as_of_date)
            .push(", ")
            .push_bind(key.effective_at)
            .push(", ")
            .push_bind(key.snapshot_id)
            .push(")");
    }
    qb.push(" ORDER BY as_of_date DESC, effective_at DESC, snapshot_id DESC LIMIT ")
        .push_bind(i64::from(query.limit.get()));
    qb
}

/// Count of rows matching the history date range, ignoring cursor and limit.
pub(crate) fn universe_history_count(
    tenant_id: Uuid,
    query: &HistoryQuery,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM universe_snapshots WHERE tenant_id = ");
    qb.push_bind(tenant_id);
    push_date_range(&mut qb, "as_of_date", query.start_date, query.end_date);
    qb
}

pub(crate) fn price_series_query(
    tenant_id: Uuid,
    vendor: PriceVendor,
    query: &SeriesQuery,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT s.as_of_date, s.vendor, p.ticker, p.mic, p.close, p.volume, p.currency \
         FROM price_snapshots s JOIN prices p ON p.snapshot_id = s.snapshot_id \
         WHERE s.tenant_id = ",
    );
    qb.push_bind(tenant_id)
        .push(" AND s.vendor = ")
        .push_bind(vendor.as_str());
    push_date_range(&mut qb, "s.as_of_date", query.start_date, query.end_date);
    push_any(&mut qb, "p.ticker", &query.tickers);
    qb.push(" ORDER BY s.as_of_date ASC, p.ticker ASC");
    qb
}

pub(crate) fn factor_series_query(
    tenant_id: Uuid,
    vendor: PriceVendor,
    query: &FactorSeriesQuery,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT s.as_of_date, s.vendor, f.ticker, f.factor_name, f.value \
         FROM price_snapshots s JOIN factors f ON f.snapshot_id = s.snapshot_id \
         WHERE s.tenant_id = ",
    );
    qb.push_bind(tenant_id)
        .push(" AND s.vendor = ")
        .push_bind(vendor.as_str());
    push_date_range(&mut qb, "s.as_of_date", query.start_date, query.end_date);
    push_any(&mut qb, "f.ticker", &query.tickers);
    push_any(&mut qb, "f.factor_name", &query.factor_names);
    qb.push(" ORDER BY s.as_of_date ASC, f.ticker ASC, f.factor_name ASC");
    qb
}

pub(crate) fn corporate_actions_query(
    tenant_id: Uuid,
    query: &CorporateActionQuery,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT event_id, tenant_id, ticker, event_type, effective_date, recorded_at, details \
         FROM corporate_actions WHERE tenant_id = ",
    );
    qb.push_bind(tenant_id);
    push_date_range(&mut qb, "effective_date", query.start_date, query.end_date);
    push_any(&mut qb, "ticker", &query.tickers);
    push_any(&mut qb, "event_type", &query.event_types);
    qb.push(" ORDER BY effective_date DESC, ticker ASC");
    qb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn cursor_key() -> CursorKey {
        CursorKey {
            as_of_date: date("2024-03-01"),
            effective_at: "2024-03-01T21:00:00Z".parse().unwrap(),
            snapshot_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn page_limit_bounds() {
        assert_eq!(PageLimit::default().get(), 25);
        assert_eq!(PageLimit::new(1).unwrap().get(), 1);
        assert_eq!(PageLimit::new(100).unwrap().get(), 100);
        assert!(PageLimit::new(0).is_err());
        assert!(PageLimit::new(101).is_err());
        assert!(PageLimit::new(-3).is_err());
    }

    #[test]
    fn history_without_filters_binds_tenant_and_limit() {
        let qb = universe_history_query(Uuid::new_v4(), &HistoryQuery::default(), None);
        let sql = qb.sql();
        assert!(sql.contains("WHERE tenant_id = $1 ORDER BY"));
        assert!(sql.ends_with("LIMIT $2"));
    }

    #[test]
    fn history_with_every_filter_numbers_placeholders_in_order() {
        let query = HistoryQuery {
            start_date: Some(date("2024-01-01")),
            end_date: Some(date("2024-03-31")),
            cursor: Some(Uuid::new_v4()),
            limit: PageLimit::new(10).unwrap(),
        };
        let qb = universe_history_query(Uuid::new_v4(), &query, Some(cursor_key()));
        let sql = qb.sql();

        assert!(sql.contains("tenant_id = $1"));
        assert!(sql.contains("as_of_date >= $2"));
        assert!(sql.contains("as_of_date <= $3"));
        assert!(sql.contains("(as_of_date, effective_at, snapshot_id) < ($4, $5, $6)"));
        assert!(sql.ends_with("LIMIT $7"));
        assert!(!sql.contains("$8"));
    }

    #[test]
    fn history_with_end_date_and_cursor_only() {
        let query = HistoryQuery {
            end_date: Some(date("2024-03-31")),
            ..HistoryQuery::default()
        };
        let qb = universe_history_query(Uuid::new_v4(), &query, Some(cursor_key()));
        let sql = qb.sql();
        assert!(sql.contains("as_of_date <= $2"));
        assert!(!sql.contains(">="));
        assert!(sql.contains("< ($3, $4, $5)"));
        assert!(sql.ends_with("LIMIT $6"));
    }

    #[test]
    fn count_ignores_cursor_and_limit() {
        let query = HistoryQuery {
            start_date: Some(date("2024-01-01")),
            end_date: Some(date("2024-03-31")),
            cursor: Some(Uuid::new_v4()),
            limit: PageLimit::new(5).unwrap(),
        };
        let qb = universe_history_count(Uuid::new_v4(), &query);
        let sql = qb.sql();
        assert!(sql.starts_with("SELECT COUNT(*)"));
        assert!(sql.contains("as_of_date <= $3"));
        assert!(!sql.contains("LIMIT"));
        assert!(!sql.contains("$4"));
    }

    #[test]
    fn factor_series_filters_follow_push_order() {
        let query = FactorSeriesQuery {
            tickers: vec!["AAPL".into()],
            factor_names: vec!["value".into(), "momentum".into()],
            start_date: Some(date("2024-01-01")),
            end_date: None,
        };
        let qb = factor_series_query(Uuid::new_v4(), PriceVendor::Iex, &query);
        let sql = qb.sql();
        assert!(sql.contains("s.tenant_id = $1 AND s.vendor = $2"));
        assert!(sql.contains("s.as_of_date >= $3"));
        assert!(sql.contains("f.ticker = ANY($4)"));
        assert!(sql.contains("f.factor_name = ANY($5)"));
    }

    #[test]
    fn empty_lists_add_no_filter() {
        let qb = corporate_actions_query(Uuid::new_v4(), &CorporateActionQuery::default());
        let sql = qb.sql();
        assert!(!sql.contains("ANY"));
        assert!(sql.ends_with("ORDER BY effective_date DESC, ticker ASC"));
    }

    #[test]
    fn price_series_orders_by_date_then_ticker() {
        let query = SeriesQuery {
            tickers: vec!["MSFT".into()],
            start_date: None,
            end_date: Some(date("2024-02-01")),
        };
        let qb = price_series_query(Uuid::new_v4(), PriceVendor::Polygon, &query);
        let sql = qb.sql();
        assert!(sql.contains("s.as_of_date <= $3"));
        assert!(sql.contains("p.ticker = ANY($4)"));
        assert!(sql.ends_with("ORDER BY s.as_of_date ASC, p.ticker ASC"));
    }

    #[test]
    fn history_range_is_inclusive() {
        let query = HistoryQuery {
            start_date: Some(date("2024-01-01")),
            end_date: Some(date("2024-01-31")),
            ..HistoryQuery::default()
        };
        assert!(query.contains(date("2024-01-01")));
        assert!(query.contains(date("2024-01-31")));
        assert!(!query.contains(date("2024-02-01")));
    }

    #[test]
    fn cursor_keys_order_like_the_index() {
        let a = cursor_key();
        let mut b = a;
        b.as_of_date = date("2024-03-02");
        assert!(a < b);
        let mut c = a;
        c.effective_at = "2024-03-01T22:00:00Z".parse().unwrap();
        assert!(a < c && c < b);
    }
}
