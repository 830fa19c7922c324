//! Postgres price snapshot repository.
//!
//! Covers price snapshots with their prices and factors, the derived close
//! and factor time series, and the corporate action log.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use refdata_core::{RefDataError, Result};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use super::query::{self, CorporateActionQuery, FactorSeriesQuery, SeriesQuery};
use super::{abort, preflight, PriceRepository};
use crate::models::{
    CorporateActionRecord, FactorRecord, FactorSeriesPoint, PriceRecord, PriceSeriesPoint,
    PriceSnapshotAggregate, PriceSnapshotRecord, PriceVendor, SnapshotStatus,
};

fn vendor_from_row(table: &'static str, raw: &str) -> Result<PriceVendor> {
    PriceVendor::parse(raw).ok_or_else(|| RefDataError::CorruptRow {
        table,
        message: format!("unknown vendor {raw}"),
    })
}

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    snapshot_id: Uuid,
    tenant_id: Uuid,
    as_of_date: NaiveDate,
    vendor: String,
    published_at: DateTime<Utc>,
    hash: String,
    status: String,
}

impl TryFrom<SnapshotRow> for PriceSnapshotRecord {
    type Error = RefDataError;

    fn try_from(row: SnapshotRow) -> Result<Self> {
        let status = SnapshotStatus::parse(&row.status).ok_or_else(|| RefDataError::CorruptRow {
            table: "price_snapshots",
            message: format!("unknown status {}", row.status),
        })?;
        Ok(Self {
            snapshot_id: row.snapshot_id,
            tenant_id: row.tenant_id,
            as_of_date: row.as_of_date,
            vendor: vendor_from_row("price_snapshots", &row.vendor)?,
            published_at: row.published_at,
            hash: row.hash,
            status,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PriceRow {
    price_id: Uuid,
    snapshot_id: Uuid,
    tenant_id: Uuid,
    ticker: String,
    mic: String,
    open: Option<Decimal>,
    high: Option<Decimal>,
    low: Option<Decimal>,
    close: Decimal,
    volume: Option<Decimal>,
    currency: String,
}

impl From<PriceRow> for PriceRecord {
    fn from(row: PriceRow) -> Self {
        Self {
            price_id: row.price_id,
            snapshot_id: row.snapshot_id,
            tenant_id: row.tenant_id,
            ticker: row.ticker,
            mic: row.mic,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            currency: row.currency,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FactorRow {
    factor_id: Uuid,
    snapshot_id: Uuid,
    tenant_id: Uuid,
    ticker: String,
    factor_name: String,
    value: Decimal,
    as_of_date: NaiveDate,
}

impl From<FactorRow> for FactorRecord {
    fn from(row: FactorRow) -> Self {
        Self {
            factor_id: row.factor_id,
            snapshot_id: row.snapshot_id,
            tenant_id: row.tenant_id,
            ticker: row.ticker,
            factor_name: row.factor_name,
            value: row.value,
            as_of_date: row.as_of_date,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PriceSeriesRow {
    as_of_date: NaiveDate,
    vendor: String,
    ticker: String,
    mic: String,
    close: Decimal,
    volume: Option<Decimal>,
    currency: String,
}

#[derive(Debug, sqlx::FromRow)]
struct FactorSeriesRow {
    as_of_date: NaiveDate,
    vendor: String,
    ticker: String,
    factor_name: String,
    value: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct CorporateActionRow {
    event_id: Uuid,
    tenant_id: Uuid,
    ticker: String,
    event_type: String,
    effective_date: NaiveDate,
    recorded_at: DateTime<Utc>,
    details: JsonValue,
}

/// Repository for price snapshots, series reads and corporate actions.
#[derive(Debug, Clone)]
pub struct PgPriceRepository {
    pool: PgPool,
}

impl PgPriceRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_rows(
        tx: &mut Transaction<'static, Postgres>,
        aggregate: &PriceSnapshotAggregate,
    ) -> Result<()> {
        let s = &aggregate.snapshot;
        sqlx::query(
            r#"
            INSERT INTO price_snapshots
                (snapshot_id, tenant_id, as_of_date, vendor, published_at, status, hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(s.snapshot_id)
        .bind(s.tenant_id)
        .bind(s.as_of_date)
        .bind(s.vendor.as_str())
        .bind(s.published_at)
        .bind(s.status.as_str())
        .bind(&s.hash)
        .execute(&mut **tx)
        .await?;

        for p in &aggregate.prices {
            sqlx::query(
                r#"
                INSERT INTO prices
                    (price_id, snapshot_id, tenant_id, ticker, mic,
                     open, high, low, close, volume, currency)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(p.price_id)
            .bind(s.snapshot_id)
            .bind(s.tenant_id)
            .bind(&p.ticker)
            .bind(&p.mic)
            .bind(p.open)
            .bind(p.high)
            .bind(p.low)
            .bind(p.close)
            .bind(p.volume)
            .bind(&p.currency)
            .execute(&mut **tx)
            .await?;
        }

        for f in &aggregate.factors {
            sqlx::query(
                r#"
                INSERT INTO factors
                    (factor_id, snapshot_id, tenant_id, ticker, factor_name, value, as_of_date)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(f.factor_id)
            .bind(s.snapshot_id)
            .bind(s.tenant_id)
            .bind(&f.ticker)
            .bind(&f.factor_name)
            .bind(f.value)
            .bind(f.as_of_date)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl PriceRepository for PgPriceRepository {
    async fn save(&self, aggregate: &PriceSnapshotAggregate) -> Result<()> {
        preflight::check_prices(aggregate)?;

        let mut tx = self.pool.begin().await?;
        if let Err(err) = Self::insert_rows(&mut tx, aggregate).await {
            return Err(abort(tx, err).await);
        }
        tx.commit().await?;

        info!(
            tenant_id = %aggregate.snapshot.tenant_id,
            snapshot_id = %aggregate.snapshot.snapshot_id,
            vendor = %aggregate.snapshot.vendor,
            prices = aggregate.prices.len(),
            factors = aggregate.factors.len(),
            "Saved price snapshot"
        );
        Ok(())
    }

    async fn get_latest(
        &self,
        tenant_id: Uuid,
        vendor: PriceVendor,
        as_of: Option<NaiveDate>,
    ) -> Result<Option<PriceSnapshotAggregate>> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT snapshot_id, tenant_id, as_of_date, vendor, published_at, hash, status
            FROM price_snapshots
            WHERE tenant_id = $1 AND vendor = $2
              AND ($3::date IS NULL OR as_of_date <= $3::date)
            ORDER BY as_of_date DESC, published_at DESC, snapshot_id DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(vendor.as_str())
        .bind(as_of)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let prices = sqlx::query_as::<_, PriceRow>(
            r#"
            SELECT price_id, snapshot_id, tenant_id, ticker, mic,
                   open, high, low, close, volume, currency
            FROM prices
            WHERE tenant_id = $1 AND snapshot_id = $2
            ORDER BY ticker ASC
            "#,
        )
        .bind(tenant_id)
        .bind(row.snapshot_id)
        .fetch_all(&mut *conn)
        .await?;

        let factors = sqlx::query_as::<_, FactorRow>(
            r#"
            SELECT factor_id, snapshot_id, tenant_id, ticker, factor_name, value, as_of_date
            FROM factors
            WHERE tenant_id = $1 AND snapshot_id = $2
            ORDER BY ticker ASC, factor_name ASC
            "#,
        )
        .bind(tenant_id)
        .bind(row.snapshot_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(Some(PriceSnapshotAggregate {
            snapshot: row.try_into()?,
            prices: prices.into_iter().map(Into::into).collect(),
            factors: factors.into_iter().map(Into::into).collect(),
        }))
    }

    async fn price_series(
        &self,
        tenant_id: Uuid,
        vendor: PriceVendor,
        query: &SeriesQuery,
    ) -> Result<Vec<PriceSeriesPoint>> {
        let rows: Vec<PriceSeriesRow> = query::price_series_query(tenant_id, vendor, query)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(PriceSeriesPoint {
                    as_of_date: row.as_of_date,
                    vendor: vendor_from_row("price_snapshots", &row.vendor)?,
                    ticker: row.ticker,
                    mic: row.mic,
                    close: row.close,
                    volume: row.volume,
                    currency: row.currency,
                })
            })
            .collect()
    }

    async fn factor_series(
        &self,
        tenant_id: Uuid,
        vendor: PriceVendor,
        query: &FactorSeriesQuery,
    ) -> Result<Vec<FactorSeriesPoint>> {
        let rows: Vec<FactorSeriesRow> = query::factor_series_query(tenant_id, vendor, query)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(FactorSeriesPoint {
                    as_of_date: row.as_of_date,
                    vendor: vendor_from_row("price_snapshots", &row.vendor)?,
                    ticker: row.ticker,
                    factor_name: row.factor_name,
                    value: row.value,
                })
            })
            .collect()
    }

    async fn corporate_actions(
        &self,
        tenant_id: Uuid,
        query: &CorporateActionQuery,
    ) -> Result<Vec<CorporateActionRecord>> {
        let rows: Vec<CorporateActionRow> = query::corporate_actions_query(tenant_id, query)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| CorporateActionRecord {
                event_id: row.event_id,
                tenant_id: row.tenant_id,
                ticker: row.ticker,
                event_type: row.event_type,
                effective_date: row.effective_date,
                recorded_at: row.recorded_at,
                details: row.details,
            })
            .collect())
    }
}
