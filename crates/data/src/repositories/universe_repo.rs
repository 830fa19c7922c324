//! Postgres universe snapshot repository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use refdata_core::{RefDataError, Result};
use rust_decimal::Decimal;
use sqlx::{postgres::PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::query::{self, CursorKey, HistoryQuery, SnapshotPage};
use super::{abort, preflight, UniverseRepository};
use crate::models::{
    SnapshotStatus, UniverseConstituentRecord, UniverseSnapshotAggregate, UniverseSnapshotRecord,
    UniverseSource,
};

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    snapshot_id: Uuid,
    tenant_id: Uuid,
    as_of_date: NaiveDate,
    effective_at: DateTime<Utc>,
    published_at: DateTime<Utc>,
    source: String,
    hash: String,
    status: String,
}

impl TryFrom<SnapshotRow> for UniverseSnapshotRecord {
    type Error = RefDataError;

    fn try_from(row: SnapshotRow) -> Result<Self> {
        let source = UniverseSource::parse(&row.source).ok_or_else(|| RefDataError::CorruptRow {
            table: "universe_snapshots",
            message: format!("unknown source {}", row.source),
        })?;
        let status = SnapshotStatus::parse(&row.status).ok_or_else(|| RefDataError::CorruptRow {
            table: "universe_snapshots",
            message: format!("unknown status {}", row.status),
        })?;
        Ok(Self {
            snapshot_id: row.snapshot_id,
            tenant_id: row.tenant_id,
            as_of_date: row.as_of_date,
            effective_at: row.effective_at,
            published_at: row.published_at,
            source,
            hash: row.hash,
            status,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ConstituentRow {
    constituent_id: Uuid,
    snapshot_id: Uuid,
    tenant_id: Uuid,
    position: i32,
    ticker: String,
    cusip: Option<String>,
    isin: Option<String>,
    free_float_market_cap: Decimal,
    weight: Decimal,
    sector: Option<String>,
    currency: String,
}

impl From<ConstituentRow> for UniverseConstituentRecord {
    fn from(row: ConstituentRow) -> Self {
        Self {
            constituent_id: row.constituent_id,
            snapshot_id: row.snapshot_id,
            tenant_id: row.tenant_id,
            position: row.position,
            ticker: row.ticker,
            cusip: row.cusip,
            isin: row.isin,
            free_float_market_cap: row.free_float_market_cap,
            weight: row.weight,
            sector: row.sector,
            currency: row.currency,
        }
    }
}

/// Repository for universe snapshots and their constituents.
#[derive(Debug, Clone)]
pub struct PgUniverseRepository {
    pool: PgPool,
}

impl PgUniverseRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_rows(
        tx: &mut Transaction<'static, Postgres>,
        aggregate: &UniverseSnapshotAggregate,
    ) -> Result<()> {
        let s = &aggregate.snapshot;
        sqlx::query(
            r#"
            INSERT INTO universe_snapshots
                (snapshot_id, tenant_id, as_of_date, effective_at, published_at,
                 source, hash, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(s.snapshot_id)
        .bind(s.tenant_id)
        .bind(s.as_of_date)
        .bind(s.effective_at)
        .bind(s.published_at)
        .bind(s.source.as_str())
        .bind(&s.hash)
        .bind(s.status.as_str())
        .execute(&mut **tx)
        .await?;

        for c in &aggregate.constituents {
            sqlx::query(
                r#"
                INSERT INTO universe_constituents
                    (constituent_id, snapshot_id, tenant_id, position, ticker, cusip, isin,
                     free_float_market_cap, weight, sector, currency)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(c.constituent_id)
            .bind(s.snapshot_id)
            .bind(s.tenant_id)
            .bind(c.position)
            .bind(&c.ticker)
            .bind(&c.cusip)
            .bind(&c.isin)
            .bind(c.free_float_market_cap)
            .bind(c.weight)
            .bind(&c.sector)
            .bind(&c.currency)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Loads constituents for `snapshot_ids`, grouped by snapshot and ordered
    /// by position.
    async fn constituents_for(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        snapshot_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<UniverseConstituentRecord>>> {
        if snapshot_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, ConstituentRow>(
            r#"
            SELECT constituent_id, snapshot_id, tenant_id, position, ticker, cusip, isin,
                   free_float_market_cap, weight, sector, currency
            FROM universe_constituents
            WHERE tenant_id = $1 AND snapshot_id = ANY($2)
            ORDER BY snapshot_id, position ASC
            "#,
        )
        .bind(tenant_id)
        .bind(snapshot_ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<UniverseConstituentRecord>> = HashMap::new();
        for row in rows {
            grouped.entry(row.snapshot_id).or_default().push(row.into());
        }
        Ok(grouped)
    }

    async fn assemble(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        rows: Vec<SnapshotRow>,
    ) -> Result<Vec<UniverseSnapshotAggregate>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.snapshot_id).collect();
        let mut constituents = Self::constituents_for(conn, tenant_id, &ids).await?;

        rows.into_iter()
            .map(|row| {
                let members = constituents.remove(&row.snapshot_id).unwrap_or_default();
                Ok(UniverseSnapshotAggregate {
                    snapshot: row.try_into()?,
                    constituents: members,
                })
            })
            .collect()
    }
}

#[async_trait]
impl UniverseRepository for PgUniverseRepository {
    async fn save(&self, aggregate: &UniverseSnapshotAggregate) -> Result<()> {
        preflight::check_universe(aggregate)?;

        let mut tx = self.pool.begin().await?;
        if let Err(err) = Self::insert_rows(&mut tx, aggregate).await {
            return Err(abort(tx, err).await);
        }
        tx.commit().await?;

        info!(
            tenant_id = %aggregate.snapshot.tenant_id,
            snapshot_id = %aggregate.snapshot.snapshot_id,
            as_of_date = %aggregate.snapshot.as_of_date,
            constituents = aggregate.constituents.len(),
            "Saved universe snapshot"
        );
        Ok(())
    }

    async fn get_latest(
        &self,
        tenant_id: Uuid,
        as_of: Option<NaiveDate>,
    ) -> Result<Option<UniverseSnapshotAggregate>> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT snapshot_id, tenant_id, as_of_date, effective_at, published_at,
                   source, hash, status
            FROM universe_snapshots
            WHERE tenant_id = $1
              AND ($2::date IS NULL OR as_of_date <= $2::date)
            ORDER BY as_of_date DESC, effective_at DESC, snapshot_id DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(as_of)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Self::assemble(&mut *conn, tenant_id, vec![row]).await?.pop())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        query: &HistoryQuery,
    ) -> Result<SnapshotPage<UniverseSnapshotAggregate>> {
        let mut conn = self.pool.acquire().await?;

        let cursor = match query.cursor {
            Some(cursor_id) => {
                let key: Option<(NaiveDate, DateTime<Utc>)> = sqlx::query_as(
                    r#"
                    SELECT as_of_date, effective_at
                    FROM universe_snapshots
                    WHERE tenant_id = $1 AND snapshot_id = $2
                    "#,
                )
                .bind(tenant_id)
                .bind(cursor_id)
                .fetch_optional(&mut *conn)
                .await?;

                if key.is_none() {
                    warn!(%tenant_id, cursor = %cursor_id, "Ignoring unknown history cursor");
                }
                key.map(|(as_of_date, effective_at)| CursorKey {
                    as_of_date,
                    effective_at,
                    snapshot_id: cursor_id,
                })
            }
            None => None,
        };

        let rows: Vec<SnapshotRow> = query::universe_history_query(tenant_id, query, cursor)
            .build_query_as()
            .fetch_all(&mut *conn)
            .await?;

        let total_count: i64 = query::universe_history_count(tenant_id, query)
            .build_query_scalar()
            .fetch_one(&mut *conn)
            .await?;

        let next_cursor = if rows.len() == query.limit.as_usize() {
            rows.last().map(|r| r.snapshot_id)
        } else {
            None
        };

        let items = Self::assemble(&mut *conn, tenant_id, rows).await?;
        debug!(%tenant_id, returned = items.len(), total_count, "Listed universe history");

        Ok(SnapshotPage {
            items,
            next_cursor,
            total_count,
        })
    }

    async fn mark_superseded(&self, tenant_id: Uuid, snapshot_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE universe_snapshots
            SET status = 'superseded'
            WHERE tenant_id = $1 AND snapshot_id = $2 AND status = 'active'
            "#,
        )
        .bind(tenant_id)
        .bind(snapshot_id)
        .execute(&self.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            info!(%tenant_id, %snapshot_id, "Marked universe snapshot superseded");
        }
        Ok(updated)
    }
}
